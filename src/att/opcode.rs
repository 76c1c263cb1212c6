//! ATT opcode table and classification.

use crate::core::constants::*;

/// Every opcode the bridge understands, with BlueZ/Core Spec numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Error Response.
    Error = ATT_OP_ERROR,
    /// Exchange MTU Request.
    MtuReq = ATT_OP_MTU_REQ,
    /// Exchange MTU Response.
    MtuResp = ATT_OP_MTU_RESP,
    /// Find Information Request.
    FindInfoReq = ATT_OP_FIND_INFO_REQ,
    /// Find Information Response.
    FindInfoResp = ATT_OP_FIND_INFO_RESP,
    /// Find By Type Value Request.
    FindByTypeReq = ATT_OP_FIND_BY_TYPE_REQ,
    /// Find By Type Value Response.
    FindByTypeResp = ATT_OP_FIND_BY_TYPE_RESP,
    /// Read By Type Request.
    ReadByTypeReq = ATT_OP_READ_BY_TYPE_REQ,
    /// Read By Type Response.
    ReadByTypeResp = ATT_OP_READ_BY_TYPE_RESP,
    /// Read Request.
    ReadReq = ATT_OP_READ_REQ,
    /// Read Response.
    ReadResp = ATT_OP_READ_RESP,
    /// Read Blob Request.
    ReadBlobReq = ATT_OP_READ_BLOB_REQ,
    /// Read Blob Response.
    ReadBlobResp = ATT_OP_READ_BLOB_RESP,
    /// Read Multiple Request.
    ReadMultiReq = ATT_OP_READ_MULTI_REQ,
    /// Read Multiple Response.
    ReadMultiResp = ATT_OP_READ_MULTI_RESP,
    /// Read By Group Type Request.
    ReadByGroupReq = ATT_OP_READ_BY_GROUP_REQ,
    /// Read By Group Type Response.
    ReadByGroupResp = ATT_OP_READ_BY_GROUP_RESP,
    /// Write Request.
    WriteReq = ATT_OP_WRITE_REQ,
    /// Write Response.
    WriteResp = ATT_OP_WRITE_RESP,
    /// Prepare Write Request.
    PrepWriteReq = ATT_OP_PREP_WRITE_REQ,
    /// Prepare Write Response.
    PrepWriteResp = ATT_OP_PREP_WRITE_RESP,
    /// Execute Write Request.
    ExecWriteReq = ATT_OP_EXEC_WRITE_REQ,
    /// Execute Write Response.
    ExecWriteResp = ATT_OP_EXEC_WRITE_RESP,
    /// Handle Value Notification.
    Notification = ATT_OP_HANDLE_NOTIFY,
    /// Handle Value Indication.
    Indication = ATT_OP_HANDLE_IND,
    /// Handle Value Confirmation.
    Confirmation = ATT_OP_HANDLE_CNF,
    /// Write Command.
    WriteCmd = ATT_OP_WRITE_CMD,
    /// Signed Write Command.
    SignedWriteCmd = ATT_OP_SIGNED_WRITE_CMD,
}

/// How an opcode participates in the protocol's flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// Client request; at most one may be outstanding.
    Request,
    /// Server response to the outstanding request.
    Response,
    /// Client command; never answered.
    Command,
    /// Unconfirmed server push.
    Notification,
    /// Server push that must be confirmed.
    Indication,
    /// Client confirmation of an indication.
    Confirmation,
}

impl Opcode {
    /// Parse an opcode from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            ATT_OP_ERROR => Self::Error,
            ATT_OP_MTU_REQ => Self::MtuReq,
            ATT_OP_MTU_RESP => Self::MtuResp,
            ATT_OP_FIND_INFO_REQ => Self::FindInfoReq,
            ATT_OP_FIND_INFO_RESP => Self::FindInfoResp,
            ATT_OP_FIND_BY_TYPE_REQ => Self::FindByTypeReq,
            ATT_OP_FIND_BY_TYPE_RESP => Self::FindByTypeResp,
            ATT_OP_READ_BY_TYPE_REQ => Self::ReadByTypeReq,
            ATT_OP_READ_BY_TYPE_RESP => Self::ReadByTypeResp,
            ATT_OP_READ_REQ => Self::ReadReq,
            ATT_OP_READ_RESP => Self::ReadResp,
            ATT_OP_READ_BLOB_REQ => Self::ReadBlobReq,
            ATT_OP_READ_BLOB_RESP => Self::ReadBlobResp,
            ATT_OP_READ_MULTI_REQ => Self::ReadMultiReq,
            ATT_OP_READ_MULTI_RESP => Self::ReadMultiResp,
            ATT_OP_READ_BY_GROUP_REQ => Self::ReadByGroupReq,
            ATT_OP_READ_BY_GROUP_RESP => Self::ReadByGroupResp,
            ATT_OP_WRITE_REQ => Self::WriteReq,
            ATT_OP_WRITE_RESP => Self::WriteResp,
            ATT_OP_PREP_WRITE_REQ => Self::PrepWriteReq,
            ATT_OP_PREP_WRITE_RESP => Self::PrepWriteResp,
            ATT_OP_EXEC_WRITE_REQ => Self::ExecWriteReq,
            ATT_OP_EXEC_WRITE_RESP => Self::ExecWriteResp,
            ATT_OP_HANDLE_NOTIFY => Self::Notification,
            ATT_OP_HANDLE_IND => Self::Indication,
            ATT_OP_HANDLE_CNF => Self::Confirmation,
            ATT_OP_WRITE_CMD => Self::WriteCmd,
            ATT_OP_SIGNED_WRITE_CMD => Self::SignedWriteCmd,
            _ => return None,
        };
        Some(op)
    }

    /// Convert the opcode to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Flow-control class of this opcode.
    pub fn class(self) -> OpcodeClass {
        match self {
            Self::MtuReq
            | Self::FindInfoReq
            | Self::FindByTypeReq
            | Self::ReadByTypeReq
            | Self::ReadReq
            | Self::ReadBlobReq
            | Self::ReadMultiReq
            | Self::ReadByGroupReq
            | Self::WriteReq
            | Self::PrepWriteReq
            | Self::ExecWriteReq => OpcodeClass::Request,
            Self::Error
            | Self::MtuResp
            | Self::FindInfoResp
            | Self::FindByTypeResp
            | Self::ReadByTypeResp
            | Self::ReadResp
            | Self::ReadBlobResp
            | Self::ReadMultiResp
            | Self::ReadByGroupResp
            | Self::WriteResp
            | Self::PrepWriteResp
            | Self::ExecWriteResp => OpcodeClass::Response,
            Self::WriteCmd | Self::SignedWriteCmd => OpcodeClass::Command,
            Self::Notification => OpcodeClass::Notification,
            Self::Indication => OpcodeClass::Indication,
            Self::Confirmation => OpcodeClass::Confirmation,
        }
    }

    /// Classify a raw opcode byte, if known.
    pub fn classify(byte: u8) -> Option<OpcodeClass> {
        Self::from_byte(byte).map(Self::class)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:#04x})", self, self.as_byte())
    }
}
