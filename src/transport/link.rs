//! Attribute channel: one driver task per connected session.
//!
//! The driver owns the [`AttLink`] for the lifetime of a session. The event
//! loop talks to it through an [`AttChannel`] (outbound PDUs, fire and
//! forget) and hears back through [`LinkEvent`]s.
//!
//! ```text
//!   Bridge ──AttChannel──▶ LinkDriver ──send──▶ AttLink ──▶ remote
//!     ▲                        │
//!     └──────LinkEvent─────────┘◀──recv── AttLink ◀── remote
//! ```
//!
//! The attribute protocol allows a single outstanding request. The driver
//! holds later requests in a FIFO until the response (or Error Response) to
//! the current one arrives. Responses are consumed here; everything else the
//! remote sends is forwarded to the event loop.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::address::ConnectRequest;
use crate::att::{self, ErrorResponse, Opcode, OpcodeClass};
use crate::core::constants::ATT_OP_MTU_REQ;
use crate::core::{AttLink, Transport, TransportError};

/// Event delivered from the transport side into the event loop.
///
/// Every event carries the session generation it belongs to; the event loop
/// drops events whose session is no longer current.
#[derive(Debug)]
pub enum LinkEvent {
    /// Connect completed; the channel is ready.
    Connected {
        /// Session generation.
        session: u64,
        /// Handle to the link driver.
        channel: AttChannel,
    },
    /// Connect failed.
    ConnectFailed {
        /// Session generation.
        session: u64,
        /// What went wrong.
        error: TransportError,
    },
    /// A PDU that is not a response to one of our requests.
    Frame {
        /// Session generation.
        session: u64,
        /// Raw PDU.
        pdu: Bytes,
    },
    /// MTU exchange finished.
    MtuExchanged {
        /// Session generation.
        session: u64,
        /// MTU both sides agreed on.
        mtu: u16,
    },
    /// The remote hung up or the link failed.
    Closed {
        /// Session generation.
        session: u64,
    },
}

impl LinkEvent {
    /// Session generation this event belongs to.
    pub fn session(&self) -> u64 {
        match self {
            Self::Connected { session, .. }
            | Self::ConnectFailed { session, .. }
            | Self::Frame { session, .. }
            | Self::MtuExchanged { session, .. }
            | Self::Closed { session } => *session,
        }
    }
}

/// Sending half of the event loop's event queue.
pub type EventSender = mpsc::UnboundedSender<LinkEvent>;

/// Receiving half of the event loop's event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Handle to a running link driver.
///
/// Dropping the handle asks the driver to shut the link down. PDUs already
/// handed over are still written first.
#[derive(Debug)]
pub struct AttChannel {
    outbound: mpsc::UnboundedSender<Bytes>,
    session: u64,
}

impl AttChannel {
    /// Queue a PDU for the remote device.
    ///
    /// Never blocks. Returns `false` if the driver has already gone away, in
    /// which case a `Closed` event is on its way.
    pub fn send(&self, pdu: Bytes) -> bool {
        self.outbound.send(pdu).is_ok()
    }

    /// Session generation this channel belongs to.
    pub fn session(&self) -> u64 {
        self.session
    }
}

/// Start connecting on a background task.
///
/// The task reports `Connected` or `ConnectFailed` and, on success, keeps
/// running as the session's link driver. Aborting the returned handle while
/// still connecting cancels the attempt.
pub fn spawn_connect<T: Transport>(
    transport: &T,
    request: ConnectRequest,
    session: u64,
    events: EventSender,
) -> JoinHandle<()> {
    let destination = request.destination;
    let connecting = transport.connect(request);

    tokio::spawn(async move {
        let link = match connecting.await {
            Ok(link) => link,
            Err(error) => {
                debug!(session, %destination, %error, "connect failed");
                let _ = events.send(LinkEvent::ConnectFailed { session, error });
                return;
            }
        };

        info!(session, %destination, "link established");
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = AttChannel {
            outbound: tx,
            session,
        };
        if events.send(LinkEvent::Connected { session, channel }).is_err() {
            return;
        }
        LinkDriver::new(link, rx, events, session).run().await;
    })
}

/// Owns one link and multiplexes it against the outbound queue.
struct LinkDriver<L> {
    link: L,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    events: EventSender,
    session: u64,
    /// Request PDU awaiting its response.
    outstanding: Option<Bytes>,
    /// Requests waiting for `outstanding` to clear.
    queued: VecDeque<Bytes>,
}

impl<L: AttLink> LinkDriver<L> {
    fn new(
        link: L,
        outbound: mpsc::UnboundedReceiver<Bytes>,
        events: EventSender,
        session: u64,
    ) -> Self {
        Self {
            link,
            outbound,
            events,
            session,
            outstanding: None,
            queued: VecDeque::new(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                pdu = self.outbound.recv() => match pdu {
                    Some(pdu) => {
                        if let Err(e) = self.submit(pdu).await {
                            warn!(session = self.session, error = %e, "send failed");
                            self.close().await;
                            return;
                        }
                    }
                    None => {
                        debug!(session = self.session, "channel released, shutting link down");
                        let _ = self.link.shutdown().await;
                        return;
                    }
                },
                inbound = self.link.recv() => match inbound {
                    Ok(Some(pdu)) => {
                        if !self.on_inbound(pdu).await {
                            self.close().await;
                            return;
                        }
                    }
                    Ok(None) => {
                        info!(session = self.session, "remote hung up");
                        self.close().await;
                        return;
                    }
                    Err(e) => {
                        warn!(session = self.session, error = %e, "link error");
                        self.close().await;
                        return;
                    }
                },
            }
        }
    }

    /// Send a PDU, holding requests back while another is outstanding.
    async fn submit(&mut self, pdu: Bytes) -> std::io::Result<()> {
        let is_request = pdu
            .first()
            .and_then(|&op| Opcode::classify(op))
            .is_some_and(|class| class == OpcodeClass::Request);

        if !is_request {
            return self.link.send(&pdu).await;
        }
        if self.outstanding.is_some() {
            debug!(session = self.session, queued = self.queued.len() + 1, "request queued");
            self.queued.push_back(pdu);
            return Ok(());
        }
        self.link.send(&pdu).await?;
        self.outstanding = Some(pdu);
        Ok(())
    }

    /// Handle one inbound PDU. Returns `false` if the session must end.
    async fn on_inbound(&mut self, pdu: Bytes) -> bool {
        let class = pdu.first().and_then(|&op| Opcode::classify(op));
        if class != Some(OpcodeClass::Response) {
            debug!(session = self.session, len = pdu.len(), "inbound pdu");
            let session = self.session;
            return self.events.send(LinkEvent::Frame { session, pdu }).is_ok();
        }

        let Some(request) = self.outstanding.take() else {
            warn!(session = self.session, opcode = pdu[0], "response without outstanding request");
            return true;
        };
        if !self.on_response(&request, &pdu) {
            return false;
        }

        while let Some(next) = self.queued.pop_front() {
            match self.link.send(&next).await {
                Ok(()) => {
                    self.outstanding = Some(next);
                    break;
                }
                Err(e) => {
                    warn!(session = self.session, error = %e, "send failed");
                    return false;
                }
            }
        }
        true
    }

    fn on_response(&mut self, request: &[u8], pdu: &[u8]) -> bool {
        match Opcode::from_byte(pdu[0]) {
            Some(Opcode::Error) => match ErrorResponse::decode(pdu) {
                Ok(err) => warn!(
                    session = self.session,
                    request = err.request_opcode,
                    handle = err.handle,
                    code = %err.code,
                    "request failed"
                ),
                Err(e) => warn!(session = self.session, error = %e, "malformed error response"),
            },
            Some(Opcode::MtuResp) if request.first() == Some(&ATT_OP_MTU_REQ) => {
                match att::decode_mtu_response(pdu) {
                    Ok(server_mtu) => {
                        let client_mtu = u16::from_le_bytes([request[1], request[2]]);
                        let mtu = att::negotiated_mtu(client_mtu, server_mtu);
                        info!(session = self.session, mtu, "mtu exchanged");
                        let session = self.session;
                        return self
                            .events
                            .send(LinkEvent::MtuExchanged { session, mtu })
                            .is_ok();
                    }
                    Err(e) => warn!(session = self.session, error = %e, "malformed mtu response"),
                }
            }
            _ => debug!(session = self.session, opcode = pdu[0], "request acknowledged"),
        }
        true
    }

    async fn close(&mut self) {
        let _ = self.link.shutdown().await;
        let session = self.session;
        let _ = self.events.send(LinkEvent::Closed { session });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::{DeviceAddress, MemoryRemote, MemoryTransport};

    const SILENCE: Duration = Duration::from_millis(50);

    async fn connected() -> (AttChannel, EventReceiver, crate::transport::MemoryPeer) {
        let (transport, mut remote) = MemoryTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_connect(&transport, ConnectRequest::new(DeviceAddress::ANY), 1, tx);

        let channel = match rx.recv().await {
            Some(LinkEvent::Connected { channel, .. }) => channel,
            other => panic!("expected Connected, got {other:?}"),
        };
        let peer = remote.accept().await.unwrap();
        (channel, rx, peer)
    }

    #[tokio::test]
    async fn test_connect_failure_reported() {
        let (transport, _remote): (MemoryTransport, MemoryRemote) = MemoryTransport::new();
        transport.refuse("no route to host");
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_connect(&transport, ConnectRequest::new(DeviceAddress::ANY), 7, tx);

        match rx.recv().await {
            Some(LinkEvent::ConnectFailed { session, error }) => {
                assert_eq!(session, 7);
                assert!(error.to_string().contains("no route to host"));
            }
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_requests_serialized() {
        let (channel, _rx, mut peer) = connected().await;

        channel.send(att::encode_write_request(0x10, b"A", 23).unwrap());
        channel.send(att::encode_write_request(0x10, b"B", 23).unwrap());

        assert_eq!(&peer.recv().await.unwrap()[..], &[0x12, 0x10, 0x00, b'A']);
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());

        peer.send(Bytes::from_static(&[0x13]));
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x12, 0x10, 0x00, b'B']);
    }

    #[tokio::test]
    async fn test_error_response_releases_queue() {
        let (channel, _rx, mut peer) = connected().await;

        channel.send(att::encode_write_request(0x10, b"A", 23).unwrap());
        channel.send(att::encode_write_request(0x10, b"B", 23).unwrap());
        peer.recv().await.unwrap();

        peer.send(Bytes::from_static(&[0x01, 0x12, 0x10, 0x00, 0x03]));
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x12, 0x10, 0x00, b'B']);
    }

    #[tokio::test]
    async fn test_confirmation_bypasses_queue() {
        let (channel, _rx, mut peer) = connected().await;

        channel.send(att::encode_write_request(0x10, b"A", 23).unwrap());
        channel.send(att::encode_confirmation(23));

        assert_eq!(peer.recv().await.unwrap()[0], 0x12);
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x1E]);
    }

    #[tokio::test]
    async fn test_frames_forwarded_responses_consumed() {
        let (channel, mut rx, mut peer) = connected().await;

        channel.send(att::encode_write_request(0x10, b"A", 23).unwrap());
        peer.recv().await.unwrap();
        peer.send(Bytes::from_static(&[0x13]));
        peer.send(Bytes::from_static(&[0x1B, 0x10, 0x00, b'x']));

        match rx.recv().await {
            Some(LinkEvent::Frame { session, pdu }) => {
                assert_eq!(session, 1);
                assert_eq!(&pdu[..], &[0x1B, 0x10, 0x00, b'x']);
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mtu_exchange_event() {
        let (channel, mut rx, mut peer) = connected().await;

        channel.send(att::encode_mtu_request(247));
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x02, 0xF7, 0x00]);
        peer.send(Bytes::from_static(&[0x03, 0x40, 0x00]));

        match rx.recv().await {
            Some(LinkEvent::MtuExchanged { mtu, .. }) => assert_eq!(mtu, 64),
            other => panic!("expected MtuExchanged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_hangup_closes() {
        let (_channel, mut rx, peer) = connected().await;
        drop(peer);

        match rx.recv().await {
            Some(LinkEvent::Closed { session }) => assert_eq!(session, 1),
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_shuts_down_without_closed_event() {
        let (channel, mut rx, mut peer) = connected().await;
        drop(channel);

        assert!(peer.recv().await.is_none());
        // The driver exits and drops its sender without reporting Closed.
        assert!(rx.recv().await.is_none());
    }
}
