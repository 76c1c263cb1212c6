//! Event relay: remote notifications and indications to local output.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, trace, warn};

use super::connection::Connection;
use crate::att::{self, EventKind};
use crate::core::{BridgeError, DecodeError};

/// What the relay did with one inbound PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Notification value written to the output.
    Notified,
    /// Indication value written to the output.
    Indicated {
        /// Whether a confirmation was handed to the link.
        confirmed: bool,
    },
    /// Nothing relayed.
    Ignored,
}

/// Writes characteristic values pushed by the remote to the local output.
///
/// Values from every handle are relayed, not only the configured one.
#[derive(Debug, Default)]
pub struct EventRelay {
    last_handle: Option<u16>,
    relayed: u64,
}

impl EventRelay {
    /// Create a new relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the most recently relayed value.
    pub fn last_handle(&self) -> Option<u16> {
        self.last_handle
    }

    /// Number of values relayed so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    /// Relay one inbound PDU.
    ///
    /// The value reaches `output` before an indication is confirmed. A
    /// notification or indication too short to carry a handle is a protocol
    /// violation and is returned as an error; the caller stops the bridge.
    pub async fn relay<W>(
        &mut self,
        pdu: Bytes,
        output: &mut W,
        connection: &Connection,
    ) -> Result<RelayOutcome, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let event = match att::decode_inbound(pdu) {
            Ok(event) => event,
            Err(DecodeError::Empty) => {
                warn!("empty pdu ignored");
                return Ok(RelayOutcome::Ignored);
            }
            Err(e) => {
                error!(error = %e, "malformed handle value pdu");
                return Err(e.into());
            }
        };

        if let EventKind::Other(opcode) = event.kind {
            warn!(opcode, "unexpected pdu ignored");
            return Ok(RelayOutcome::Ignored);
        }

        trace!(handle = event.handle, len = event.payload.len(), kind = ?event.kind, "relaying");
        self.last_handle = Some(event.handle);
        output.write_all(&event.payload).await?;
        output.flush().await?;
        self.relayed += 1;

        if !event.needs_confirmation() {
            return Ok(RelayOutcome::Notified);
        }

        let confirmation = att::encode_confirmation(connection.mtu() as usize);
        let confirmed = !confirmation.is_empty() && connection.send(confirmation);
        if !confirmed {
            debug!(handle = event.handle, "indication left unconfirmed");
        }
        Ok(RelayOutcome::Indicated { confirmed })
    }
}
