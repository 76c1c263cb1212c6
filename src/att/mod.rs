//! Attribute protocol codec.
//!
//! Only the slice of ATT a transparent pipe needs is encoded here: handle
//! value notifications and indications on the way in, writes and
//! confirmations on the way out, plus MTU exchange and error responses so the
//! link driver can keep request flow control straight.

mod opcode;
mod pdu;

pub use opcode::{Opcode, OpcodeClass};
pub use pdu::*;
