//! Attribute protocol constants (Bluetooth Core Spec, Vol 3, Part F).
//!
//! These values are fixed by the protocol and MUST NOT be changed.

// =============================================================================
// OPCODES (Vol 3, Part F, 3.4.8)
// =============================================================================

/// Error Response.
pub const ATT_OP_ERROR: u8 = 0x01;

/// Exchange MTU Request.
pub const ATT_OP_MTU_REQ: u8 = 0x02;

/// Exchange MTU Response.
pub const ATT_OP_MTU_RESP: u8 = 0x03;

/// Find Information Request.
pub const ATT_OP_FIND_INFO_REQ: u8 = 0x04;

/// Find Information Response.
pub const ATT_OP_FIND_INFO_RESP: u8 = 0x05;

/// Find By Type Value Request.
pub const ATT_OP_FIND_BY_TYPE_REQ: u8 = 0x06;

/// Find By Type Value Response.
pub const ATT_OP_FIND_BY_TYPE_RESP: u8 = 0x07;

/// Read By Type Request.
pub const ATT_OP_READ_BY_TYPE_REQ: u8 = 0x08;

/// Read By Type Response.
pub const ATT_OP_READ_BY_TYPE_RESP: u8 = 0x09;

/// Read Request.
pub const ATT_OP_READ_REQ: u8 = 0x0A;

/// Read Response.
pub const ATT_OP_READ_RESP: u8 = 0x0B;

/// Read Blob Request.
pub const ATT_OP_READ_BLOB_REQ: u8 = 0x0C;

/// Read Blob Response.
pub const ATT_OP_READ_BLOB_RESP: u8 = 0x0D;

/// Read Multiple Request.
pub const ATT_OP_READ_MULTI_REQ: u8 = 0x0E;

/// Read Multiple Response.
pub const ATT_OP_READ_MULTI_RESP: u8 = 0x0F;

/// Read By Group Type Request.
pub const ATT_OP_READ_BY_GROUP_REQ: u8 = 0x10;

/// Read By Group Type Response.
pub const ATT_OP_READ_BY_GROUP_RESP: u8 = 0x11;

/// Write Request.
pub const ATT_OP_WRITE_REQ: u8 = 0x12;

/// Write Response.
pub const ATT_OP_WRITE_RESP: u8 = 0x13;

/// Prepare Write Request.
pub const ATT_OP_PREP_WRITE_REQ: u8 = 0x16;

/// Prepare Write Response.
pub const ATT_OP_PREP_WRITE_RESP: u8 = 0x17;

/// Execute Write Request.
pub const ATT_OP_EXEC_WRITE_REQ: u8 = 0x18;

/// Execute Write Response.
pub const ATT_OP_EXEC_WRITE_RESP: u8 = 0x19;

/// Handle Value Notification.
pub const ATT_OP_HANDLE_NOTIFY: u8 = 0x1B;

/// Handle Value Indication.
pub const ATT_OP_HANDLE_IND: u8 = 0x1D;

/// Handle Value Confirmation.
pub const ATT_OP_HANDLE_CNF: u8 = 0x1E;

/// Write Command (no response).
pub const ATT_OP_WRITE_CMD: u8 = 0x52;

/// Signed Write Command.
pub const ATT_OP_SIGNED_WRITE_CMD: u8 = 0xD2;

// =============================================================================
// PDU SIZES
// =============================================================================

/// Opcode field size.
pub const OPCODE_SIZE: usize = 1;

/// Attribute handle field size (LE16).
pub const HANDLE_SIZE: usize = 2;

/// Opcode + handle, the fixed prefix of every handle/value PDU.
pub const HANDLE_VALUE_HEADER_SIZE: usize = OPCODE_SIZE + HANDLE_SIZE;

/// Error Response size (opcode + request opcode + handle + code).
pub const ERROR_RESPONSE_SIZE: usize = 5;

/// Exchange MTU Request/Response size (opcode + LE16 MTU).
pub const MTU_PDU_SIZE: usize = 3;

// =============================================================================
// MTU
// =============================================================================

/// Default (and minimum) ATT MTU on an LE link.
pub const ATT_DEFAULT_LE_MTU: u16 = 23;

/// Maximum attribute value length.
pub const ATT_MAX_VALUE_LEN: usize = 512;

/// Largest MTU worth negotiating (max value + handle/value header + 2).
pub const ATT_MAX_MTU: u16 = 517;

// =============================================================================
// L2CAP
// =============================================================================

/// Fixed L2CAP channel identifier of the attribute protocol on LE links.
pub const ATT_CID: u16 = 0x0004;

/// PSM value meaning "use the fixed ATT channel".
pub const ATT_PSM_FIXED: u16 = 0;

// =============================================================================
// ATTRIBUTE HANDLES
// =============================================================================

/// Reserved handle value; never addresses an attribute.
pub const INVALID_HANDLE: u16 = 0x0000;
