//! Device addressing and connection parameters.

use std::fmt;
use std::str::FromStr;

use crate::core::TransportError;
use crate::core::constants::{ATT_DEFAULT_LE_MTU, ATT_PSM_FIXED};

/// Bluetooth device address (48-bit).
///
/// Stored in display order, i.e. `AA:BB:CC:DD:EE:FF` is `[0xAA, .., 0xFF]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// The all-zero address, meaning "any adapter" when used as a source.
    pub const ANY: Self = Self([0; 6]);

    /// Create an address from bytes in display order.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Get the address bytes in display order.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// LE address type of the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum AddressType {
    /// Public device address.
    #[default]
    Public,
    /// Random (static or private) device address.
    Random,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Random => f.write_str("random"),
        }
    }
}

/// Link security requested when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SecurityLevel {
    /// No encryption, no authentication.
    #[default]
    Low,
    /// Encryption without MITM protection.
    Medium,
    /// Encryption with MITM protection.
    High,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Everything a [`crate::core::Transport`] needs to open a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Local adapter address, or `None` for the default adapter.
    pub source: Option<DeviceAddress>,
    /// Remote device address.
    pub destination: DeviceAddress,
    /// Remote address type.
    pub address_type: AddressType,
    /// Requested link security.
    pub security_level: SecurityLevel,
    /// L2CAP PSM; [`ATT_PSM_FIXED`] selects the fixed ATT channel.
    pub psm: u16,
    /// Requested receive MTU; 0 leaves the transport default.
    pub mtu: u16,
}

impl ConnectRequest {
    /// Request for the fixed ATT channel with default parameters.
    pub fn new(destination: DeviceAddress) -> Self {
        Self {
            source: None,
            destination,
            address_type: AddressType::default(),
            security_level: SecurityLevel::default(),
            psm: ATT_PSM_FIXED,
            mtu: 0,
        }
    }

    /// Receive MTU the link should be prepared for.
    pub fn effective_mtu(&self) -> u16 {
        if self.mtu == 0 {
            ATT_DEFAULT_LE_MTU
        } else {
            self.mtu
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_display() {
        let addr: DeviceAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");

        let lower: DeviceAddress = "0a:1b:2c:3d:4e:5f".parse().unwrap();
        assert_eq!(lower.to_string(), "0A:1B:2C:3D:4E:5F");
    }

    #[test]
    fn test_address_parse_invalid() {
        for bad in [
            "",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AA:BB:CC:DD:EE:GG",
            "AAA:BB:CC:DD:EE:F",
            "AA-BB-CC-DD-EE-FF",
        ] {
            assert!(bad.parse::<DeviceAddress>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_connect_request_defaults() {
        let request = ConnectRequest::new(DeviceAddress::ANY);
        assert_eq!(request.address_type, AddressType::Public);
        assert_eq!(request.security_level, SecurityLevel::Low);
        assert_eq!(request.psm, ATT_PSM_FIXED);
        assert_eq!(request.effective_mtu(), ATT_DEFAULT_LE_MTU);
    }
}
