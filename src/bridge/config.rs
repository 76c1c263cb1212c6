//! Bridge configuration.

use crate::core::ConfigError;
use crate::core::constants::{ATT_DEFAULT_LE_MTU, ATT_MAX_MTU, ATT_PSM_FIXED, INVALID_HANDLE};
use crate::transport::{AddressType, ConnectRequest, DeviceAddress, SecurityLevel};

/// How local input is written to the characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write Request; the remote acknowledges each write and later writes
    /// wait for the acknowledgement.
    Request,
    /// Write Command; no acknowledgement, sent as soon as it is read.
    #[default]
    Command,
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Remote device address.
    pub device: DeviceAddress,
    /// Remote address type.
    pub address_type: AddressType,
    /// Requested link security.
    pub security_level: SecurityLevel,
    /// Local adapter address (default adapter when `None`).
    pub source: Option<DeviceAddress>,
    /// Characteristic value handle local input is written to.
    pub handle: u16,
    /// L2CAP PSM, 0 for the fixed ATT channel.
    pub psm: u16,
    /// MTU to request after connecting; 0 skips the exchange.
    pub mtu: u16,
    /// Write flavour used by the input pump.
    pub write_mode: WriteMode,
}

impl BridgeConfig {
    /// Start building a configuration.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Connect request for the configured device.
    pub fn connect_request(&self) -> ConnectRequest {
        ConnectRequest {
            source: self.source,
            destination: self.device,
            address_type: self.address_type,
            security_level: self.security_level,
            psm: self.psm,
            mtu: self.mtu,
        }
    }
}

/// Parse a characteristic handle written in base 16.
///
/// Accepts an optional `0x`/`0X` prefix. The reserved handle `0x0000` and
/// values above `0xffff` are rejected.
pub fn parse_handle(s: &str) -> Result<u16, ConfigError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidHandle(s.to_string()));
    }
    let value = u64::from_str_radix(digits, 16)
        .map_err(|_| ConfigError::HandleOutOfRange(s.to_string()))?;
    let handle =
        u16::try_from(value).map_err(|_| ConfigError::HandleOutOfRange(s.to_string()))?;
    if handle == INVALID_HANDLE {
        return Err(ConfigError::ReservedHandle);
    }
    Ok(handle)
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    device: Option<DeviceAddress>,
    address_type: AddressType,
    security_level: SecurityLevel,
    source: Option<DeviceAddress>,
    handle: Option<u16>,
    psm: u16,
    mtu: u16,
    write_mode: WriteMode,
}

impl BridgeConfigBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            psm: ATT_PSM_FIXED,
            ..Self::default()
        }
    }

    /// Set the remote device address.
    pub fn device(mut self, device: DeviceAddress) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the remote address type.
    pub fn address_type(mut self, address_type: AddressType) -> Self {
        self.address_type = address_type;
        self
    }

    /// Set the link security level.
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Set the local adapter address.
    pub fn source(mut self, source: DeviceAddress) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the characteristic handle.
    pub fn handle(mut self, handle: u16) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Set the L2CAP PSM.
    pub fn psm(mut self, psm: u16) -> Self {
        self.psm = psm;
        self
    }

    /// Set the MTU to request after connecting.
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the write flavour.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        let device = self.device.ok_or(ConfigError::MissingDevice)?;
        let handle = self.handle.ok_or(ConfigError::MissingHandle)?;
        if handle == INVALID_HANDLE {
            return Err(ConfigError::ReservedHandle);
        }
        if self.mtu != 0 && !(ATT_DEFAULT_LE_MTU..=ATT_MAX_MTU).contains(&self.mtu) {
            return Err(ConfigError::InvalidMtu(self.mtu));
        }

        Ok(BridgeConfig {
            device,
            address_type: self.address_type,
            security_level: self.security_level,
            source: self.source,
            handle,
            psm: self.psm,
            mtu: self.mtu,
            write_mode: self.write_mode,
        })
    }
}
