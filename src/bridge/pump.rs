//! Input pump: local bytes to characteristic writes.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::config::WriteMode;
use super::connection::Connection;
use crate::att;
use crate::core::BridgeError;

/// What the pump did with one chunk of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// No bytes were read.
    Idle,
    /// Written to the characteristic, in this many PDUs.
    Written(usize),
    /// Dropped because the connection was not up.
    Discarded,
}

/// Forwards local input to the configured characteristic.
#[derive(Debug, Clone)]
pub struct InputPump {
    handle: u16,
    write_mode: WriteMode,
    discarded: usize,
}

impl InputPump {
    /// Create a pump writing to `handle`.
    pub fn new(handle: u16, write_mode: WriteMode) -> Self {
        Self {
            handle,
            write_mode,
            discarded: 0,
        }
    }

    /// Target handle.
    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// Bytes dropped while not connected.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Largest value one write can carry on `connection`.
    pub fn chunk_len(connection: &Connection) -> usize {
        att::max_value_len(connection.mtu()).max(1)
    }

    /// Handle bytes read from the input.
    ///
    /// While connected, `bytes` is split into MTU-sized values and each is
    /// written in order; otherwise the bytes are dropped. The output is
    /// flushed either way.
    pub async fn pump<W>(
        &mut self,
        bytes: &[u8],
        connection: &Connection,
        output: &mut W,
    ) -> Result<PumpOutcome, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let outcome = if bytes.is_empty() {
            PumpOutcome::Idle
        } else if connection.is_connected() {
            let mtu = connection.mtu();
            let mut written = 0;
            for chunk in bytes.chunks(Self::chunk_len(connection)) {
                let pdu = match self.write_mode {
                    WriteMode::Request => att::encode_write_request(self.handle, chunk, mtu)?,
                    WriteMode::Command => att::encode_write_command(self.handle, chunk, mtu)?,
                };
                trace!(handle = self.handle, len = chunk.len(), "write");
                if !connection.send(pdu) {
                    debug!("link gone, remaining input dropped");
                    break;
                }
                written += 1;
            }
            PumpOutcome::Written(written)
        } else {
            debug!(len = bytes.len(), state = %connection.state(), "input discarded");
            self.discarded += bytes.len();
            PumpOutcome::Discarded
        };

        output.flush().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discard_while_disconnected() {
        let mut pump = InputPump::new(0x25, WriteMode::Request);
        let conn = Connection::new();
        let mut out: Vec<u8> = Vec::new();

        let outcome = pump.pump(b"lost", &conn, &mut out).await.unwrap();
        assert_eq!(outcome, PumpOutcome::Discarded);
        assert_eq!(pump.discarded(), 4);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_idle() {
        let mut pump = InputPump::new(0x25, WriteMode::Request);
        let conn = Connection::new();
        let mut out: Vec<u8> = Vec::new();

        assert_eq!(pump.pump(b"", &conn, &mut out).await.unwrap(), PumpOutcome::Idle);
        assert_eq!(pump.discarded(), 0);
    }

    #[test]
    fn test_chunk_len_default_mtu() {
        assert_eq!(InputPump::chunk_len(&Connection::new()), 20);
    }
}
