//! Error types for the attribute bridge.

use std::io;

use thiserror::Error;

/// Errors that can occur when decoding an inbound PDU.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The PDU carried no bytes at all.
    #[error("empty pdu")]
    Empty,

    /// The PDU is shorter than its opcode requires.
    #[error("pdu for opcode {opcode:#04x} too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Opcode of the offending PDU.
        opcode: u8,
        /// Minimum length for this opcode.
        expected: usize,
        /// Actual PDU length.
        actual: usize,
    },

    /// The PDU opcode does not match what the decoder expected.
    #[error("unexpected opcode {actual:#04x}, expected {expected:#04x}")]
    UnexpectedOpcode {
        /// Opcode the decoder handles.
        expected: u8,
        /// Opcode found in the PDU.
        actual: u8,
    },
}

/// Errors that can occur when encoding an outbound PDU.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The value does not fit in a single PDU at the current MTU.
    #[error("value of {len} bytes exceeds {max} bytes allowed by MTU")]
    ValueTooLong {
        /// Value length.
        len: usize,
        /// Largest value that fits.
        max: usize,
    },

    /// Attempted to address the reserved handle 0x0000.
    #[error("attribute handle 0x0000 is reserved")]
    InvalidHandle,
}

/// Errors in the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection establishment failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The peer refused or the link went away.
    #[error("link closed")]
    LinkClosed,

    /// Address could not be parsed.
    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    /// No transport is compiled into this build.
    #[error("no transport available on this platform")]
    Unsupported,

    /// I/O error on the underlying socket.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Startup configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Handle is not a base-16 numeral.
    #[error("invalid handle {0:?}: expected a hexadecimal number")]
    InvalidHandle(String),

    /// Handle does not fit in 16 bits.
    #[error("handle {0:?} out of range (0x0001..=0xffff)")]
    HandleOutOfRange(String),

    /// Handle 0x0000 is reserved by the attribute protocol.
    #[error("handle 0x0000 is reserved")]
    ReservedHandle,

    /// Handle is missing.
    #[error("characteristic handle is required")]
    MissingHandle,

    /// Device address is missing.
    #[error("device address is required")]
    MissingDevice,

    /// Device address could not be parsed.
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    /// MTU outside the range the attribute protocol allows.
    #[error("mtu {0} out of range (23..=517)")]
    InvalidMtu(u16),
}

/// Top-level bridge errors.
///
/// Only connect failures and startup errors reach the user as messages;
/// everything in this enum that escapes [`crate::bridge::Bridge::run`] stops
/// the relay.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An inbound frame broke an attribute protocol invariant.
    ///
    /// Continuing would relay corrupted data, so the bridge fails fast.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] DecodeError),

    /// Outbound PDU could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local stream I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    /// Whether this error is the fail-fast protocol invariant path.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}
