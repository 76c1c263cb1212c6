//! PDU encoding and decoding.
//!
//! Wire formats (all multi-byte fields little endian):
//!
//! ```text
//! Handle value (0x1B / 0x1D)   | op | handle:2 | value...         |
//! Write Request/Command        | op | handle:2 | value...         |
//! Confirmation (0x1E)          | op |
//! Exchange MTU (0x02 / 0x03)   | op | mtu:2 |
//! Error Response (0x01)        | op | req op | handle:2 | code |
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::opcode::Opcode;
use crate::core::constants::*;
use crate::core::{DecodeError, EncodeError};

/// Discriminant of a decoded inbound PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Handle Value Notification.
    Notification,
    /// Handle Value Indication; must be confirmed.
    Indication,
    /// Anything else, with the raw opcode byte.
    Other(u8),
}

/// A decoded inbound PDU.
///
/// For [`EventKind::Other`] the handle is [`INVALID_HANDLE`] and the payload
/// is everything after the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// What kind of PDU this is.
    pub kind: EventKind,
    /// Attribute handle the value belongs to.
    pub handle: u16,
    /// Attribute value.
    pub payload: Bytes,
}

impl InboundEvent {
    /// Whether the event needs a confirmation sent back.
    pub fn needs_confirmation(&self) -> bool {
        self.kind == EventKind::Indication
    }
}

/// Decode an inbound PDU.
///
/// Notifications and indications shorter than opcode + handle are rejected
/// with [`DecodeError::Truncated`].
pub fn decode_inbound(pdu: Bytes) -> Result<InboundEvent, DecodeError> {
    let opcode = *pdu.first().ok_or(DecodeError::Empty)?;

    let kind = match opcode {
        ATT_OP_HANDLE_NOTIFY => EventKind::Notification,
        ATT_OP_HANDLE_IND => EventKind::Indication,
        other => {
            return Ok(InboundEvent {
                kind: EventKind::Other(other),
                handle: INVALID_HANDLE,
                payload: pdu.slice(OPCODE_SIZE..),
            });
        }
    };

    if pdu.len() < HANDLE_VALUE_HEADER_SIZE {
        return Err(DecodeError::Truncated {
            opcode,
            expected: HANDLE_VALUE_HEADER_SIZE,
            actual: pdu.len(),
        });
    }

    let handle = u16::from_le_bytes([pdu[1], pdu[2]]);
    Ok(InboundEvent {
        kind,
        handle,
        payload: pdu.slice(HANDLE_VALUE_HEADER_SIZE..),
    })
}

/// Largest value a handle/value PDU can carry at `mtu`.
pub fn max_value_len(mtu: u16) -> usize {
    (mtu as usize).saturating_sub(HANDLE_VALUE_HEADER_SIZE)
}

fn encode_handle_value(
    opcode: Opcode,
    handle: u16,
    value: &[u8],
    mtu: u16,
) -> Result<Bytes, EncodeError> {
    if handle == INVALID_HANDLE {
        return Err(EncodeError::InvalidHandle);
    }
    let max = max_value_len(mtu);
    if value.len() > max {
        return Err(EncodeError::ValueTooLong {
            len: value.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(HANDLE_VALUE_HEADER_SIZE + value.len());
    buf.put_u8(opcode.as_byte());
    buf.put_u16_le(handle);
    buf.put_slice(value);
    Ok(buf.freeze())
}

/// Encode a Write Request for `handle`.
pub fn encode_write_request(handle: u16, value: &[u8], mtu: u16) -> Result<Bytes, EncodeError> {
    encode_handle_value(Opcode::WriteReq, handle, value, mtu)
}

/// Encode a Write Command for `handle`.
pub fn encode_write_command(handle: u16, value: &[u8], mtu: u16) -> Result<Bytes, EncodeError> {
    encode_handle_value(Opcode::WriteCmd, handle, value, mtu)
}

/// Encode a Handle Value Confirmation into a buffer of `capacity` bytes.
///
/// Returns an empty buffer when the confirmation does not fit; callers treat
/// that as nothing to send.
pub fn encode_confirmation(capacity: usize) -> Bytes {
    if capacity < OPCODE_SIZE {
        return Bytes::new();
    }
    Bytes::from_static(&[ATT_OP_HANDLE_CNF])
}

/// Encode an Exchange MTU Request.
pub fn encode_mtu_request(mtu: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(MTU_PDU_SIZE);
    buf.put_u8(ATT_OP_MTU_REQ);
    buf.put_u16_le(mtu);
    buf.freeze()
}

/// Decode an Exchange MTU Response, returning the server's receive MTU.
pub fn decode_mtu_response(pdu: &[u8]) -> Result<u16, DecodeError> {
    let opcode = *pdu.first().ok_or(DecodeError::Empty)?;
    if opcode != ATT_OP_MTU_RESP {
        return Err(DecodeError::UnexpectedOpcode {
            expected: ATT_OP_MTU_RESP,
            actual: opcode,
        });
    }
    if pdu.len() < MTU_PDU_SIZE {
        return Err(DecodeError::Truncated {
            opcode,
            expected: MTU_PDU_SIZE,
            actual: pdu.len(),
        });
    }
    Ok(u16::from_le_bytes([pdu[1], pdu[2]]))
}

/// MTU both sides agree on after an exchange.
pub fn negotiated_mtu(client_rx_mtu: u16, server_rx_mtu: u16) -> u16 {
    client_rx_mtu.min(server_rx_mtu).max(ATT_DEFAULT_LE_MTU)
}

/// ATT error code carried in an Error Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u8);

impl ErrorCode {
    /// Human readable name from the Core Spec error table.
    pub fn name(self) -> &'static str {
        match self.0 {
            0x01 => "Invalid Handle",
            0x02 => "Read Not Permitted",
            0x03 => "Write Not Permitted",
            0x04 => "Invalid PDU",
            0x05 => "Insufficient Authentication",
            0x06 => "Request Not Supported",
            0x07 => "Invalid Offset",
            0x08 => "Insufficient Authorization",
            0x09 => "Prepare Queue Full",
            0x0A => "Attribute Not Found",
            0x0B => "Attribute Not Long",
            0x0C => "Insufficient Encryption Key Size",
            0x0D => "Invalid Attribute Value Length",
            0x0E => "Unlikely Error",
            0x0F => "Insufficient Encryption",
            0x10 => "Unsupported Group Type",
            0x11 => "Insufficient Resources",
            0x80..=0x9F => "Application Error",
            0xE0..=0xFF => "Common Profile Error",
            _ => "Reserved",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.0)
    }
}

/// Decoded Error Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Opcode of the request that failed.
    pub request_opcode: u8,
    /// Handle the request addressed.
    pub handle: u16,
    /// Reason for the failure.
    pub code: ErrorCode,
}

impl ErrorResponse {
    /// Parse an Error Response PDU.
    pub fn decode(pdu: &[u8]) -> Result<Self, DecodeError> {
        let opcode = *pdu.first().ok_or(DecodeError::Empty)?;
        if opcode != ATT_OP_ERROR {
            return Err(DecodeError::UnexpectedOpcode {
                expected: ATT_OP_ERROR,
                actual: opcode,
            });
        }
        if pdu.len() < ERROR_RESPONSE_SIZE {
            return Err(DecodeError::Truncated {
                opcode,
                expected: ERROR_RESPONSE_SIZE,
                actual: pdu.len(),
            });
        }
        Ok(Self {
            request_opcode: pdu[1],
            handle: u16::from_le_bytes([pdu[2], pdu[3]]),
            code: ErrorCode(pdu[4]),
        })
    }
}
