//! The bridge event loop.

use std::future::Future;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::config::BridgeConfig;
use super::connection::{Connection, ConnectionState};
use super::pump::{InputPump, PumpOutcome};
use super::relay::EventRelay;
use crate::att;
use crate::core::constants::ATT_MAX_MTU;
use crate::core::{BridgeError, Transport};
use crate::transport::{
    AddressType, DeviceAddress, EventReceiver, EventSender, LinkEvent, SecurityLevel,
};

/// Why [`Bridge::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The remote device closed the link.
    RemoteClosed,
    /// The connect attempt failed.
    ConnectFailed,
    /// The shutdown signal fired.
    Interrupted,
    /// Nothing to do: no connect was in progress.
    Idle,
}

impl ExitReason {
    /// Whether the bridge stopped without a failure.
    pub fn is_graceful(self) -> bool {
        !matches!(self, Self::ConnectFailed)
    }
}

/// Relays bytes between a local stream and one remote characteristic.
///
/// Owns the [`Connection`], the [`EventRelay`] and the [`InputPump`]. All
/// of them are only touched from [`run`](Self::run) or from direct calls on
/// the bridge, one event at a time.
pub struct Bridge<T: Transport, W> {
    config: BridgeConfig,
    transport: T,
    connection: Connection,
    relay: EventRelay,
    pump: InputPump,
    output: W,
    events_tx: EventSender,
    events_rx: EventReceiver,
    exit: Option<ExitReason>,
}

impl<T, W> Bridge<T, W>
where
    T: Transport,
    W: AsyncWrite + Unpin,
{
    /// Create a disconnected bridge writing remote values to `output`.
    pub fn new(config: BridgeConfig, transport: T, output: W) -> Self {
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let pump = InputPump::new(config.handle, config.write_mode);
        Self {
            config,
            transport,
            connection: Connection::new(),
            relay: EventRelay::new(),
            pump,
            output,
            events_tx,
            events_rx,
            exit: None,
        }
    }

    /// Configuration the bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The event relay.
    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    /// The input pump.
    pub fn pump(&self) -> &InputPump {
        &self.pump
    }

    /// The local output stream.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Consume the bridge, returning the local output stream.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Connect to the configured device.
    pub fn connect(&mut self) -> bool {
        self.connect_to(
            self.config.device,
            self.config.address_type,
            self.config.security_level,
        )
    }

    /// Connect to `address`.
    ///
    /// Returns immediately in `Connecting`; a no-op returning `false` unless
    /// currently `Disconnected`.
    pub fn connect_to(
        &mut self,
        address: DeviceAddress,
        address_type: AddressType,
        security_level: SecurityLevel,
    ) -> bool {
        let mut request = self.config.connect_request();
        request.destination = address;
        request.address_type = address_type;
        request.security_level = security_level;

        self.connection.connect(&self.transport, request, &self.events_tx)
    }

    /// Disconnect. Idempotent.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Wait for the next transport event.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events_rx.recv().await
    }

    /// Apply one transport event.
    ///
    /// Events from an earlier session are dropped. A protocol violation in
    /// an inbound frame is returned as an error.
    pub async fn dispatch(&mut self, event: LinkEvent) -> Result<(), BridgeError> {
        if event.session() != self.connection.session() {
            debug!(session = event.session(), "stale event dropped");
            return Ok(());
        }

        match event {
            LinkEvent::Connected { channel, .. } => {
                if self.connection.on_connected(channel) && self.config.mtu > 0 {
                    debug!(mtu = self.config.mtu, "requesting mtu exchange");
                    self.connection.send(att::encode_mtu_request(self.config.mtu));
                }
            }
            LinkEvent::ConnectFailed { error, .. } => {
                if self.connection.state() != ConnectionState::Connecting {
                    return Ok(());
                }
                self.connection.on_connect_failed();
                warn!(%error, "connect failed");
                let message = format!("# Connect error: {error}\n");
                self.output.write_all(message.as_bytes()).await?;
                self.output.flush().await?;
                self.exit = Some(ExitReason::ConnectFailed);
            }
            LinkEvent::Frame { pdu, .. } => {
                if self.connection.is_connected() {
                    self.relay.relay(pdu, &mut self.output, &self.connection).await?;
                }
            }
            LinkEvent::MtuExchanged { mtu, .. } => self.connection.set_mtu(mtu),
            LinkEvent::Closed { .. } => {
                if self.connection.state() != ConnectionState::Disconnected {
                    info!("remote closed the link");
                    self.connection.disconnect();
                    self.exit = Some(ExitReason::RemoteClosed);
                }
            }
        }
        Ok(())
    }

    /// Feed bytes read from the local input to the characteristic.
    pub async fn on_input(&mut self, bytes: &[u8]) -> Result<PumpOutcome, BridgeError> {
        self.pump.pump(bytes, &self.connection, &mut self.output).await
    }

    /// Run the event loop.
    ///
    /// Multiplexes `shutdown`, transport events and `input` until the bridge
    /// is disconnected with no connect in progress. End of input only stops
    /// reading; the link stays up. On error the connection is torn down
    /// before returning.
    pub async fn run<R, S>(&mut self, mut input: R, shutdown: S) -> Result<ExitReason, BridgeError>
    where
        R: AsyncRead + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; ATT_MAX_MTU as usize];
        let mut input_open = true;
        self.exit = None;

        while self.connection.state() != ConnectionState::Disconnected {
            let read_len = InputPump::chunk_len(&self.connection).min(buf.len());

            let result = tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("shutdown requested");
                    self.connection.disconnect();
                    return Ok(ExitReason::Interrupted);
                }
                Some(event) = self.events_rx.recv() => self.dispatch(event).await,
                read = input.read(&mut buf[..read_len]), if input_open => match read {
                    Ok(0) => {
                        debug!("input closed");
                        input_open = false;
                        Ok(())
                    }
                    Ok(n) => self.on_input(&buf[..n]).await.map(|_| ()),
                    Err(e) => {
                        warn!(error = %e, "input read failed");
                        input_open = false;
                        Ok(())
                    }
                },
            };

            if let Err(e) = result {
                self.connection.disconnect();
                return Err(e);
            }
        }

        Ok(self.exit.take().unwrap_or(ExitReason::Idle))
    }

    /// Send a raw PDU over the current connection.
    ///
    /// Returns `false` unless connected.
    pub fn send_raw(&self, pdu: Bytes) -> bool {
        self.connection.send(pdu)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bridge::WriteMode;
    use crate::transport::{MemoryPeer, MemoryTransport};

    const SILENCE: Duration = Duration::from_millis(50);

    type TestBridge = Bridge<MemoryTransport, Vec<u8>>;

    fn config() -> BridgeConfig {
        BridgeConfig::builder()
            .device("AA:BB:CC:DD:EE:FF".parse().unwrap())
            .handle(0x0025)
            .build()
            .unwrap()
    }

    fn request_config() -> BridgeConfig {
        BridgeConfig::builder()
            .device("AA:BB:CC:DD:EE:FF".parse().unwrap())
            .handle(0x0025)
            .write_mode(WriteMode::Request)
            .build()
            .unwrap()
    }

    fn pdu(hex_str: &str) -> Bytes {
        Bytes::from(hex::decode(hex_str).unwrap())
    }

    async fn step(bridge: &mut TestBridge) -> Result<(), BridgeError> {
        let event = bridge.next_event().await.unwrap();
        bridge.dispatch(event).await
    }

    async fn connected(config: BridgeConfig) -> (TestBridge, MemoryTransport, MemoryPeer) {
        let (transport, mut remote) = MemoryTransport::new();
        let mut bridge = Bridge::new(config, transport.clone(), Vec::<u8>::new());
        assert_eq!(bridge.state(), ConnectionState::Disconnected);

        assert!(bridge.connect());
        assert_eq!(bridge.state(), ConnectionState::Connecting);
        step(&mut bridge).await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Connected);

        let peer = remote.accept().await.unwrap();
        (bridge, transport, peer)
    }

    #[tokio::test]
    async fn test_connect_then_write() {
        let (mut bridge, transport, mut peer) = connected(config()).await;

        let request = &transport.requests()[0];
        assert_eq!(request.destination.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(request.address_type, AddressType::Public);

        assert_eq!(bridge.on_input(&[0x41]).await.unwrap(), PumpOutcome::Written(1));
        assert_eq!(&peer.recv().await.unwrap()[..], &hex::decode("52250041").unwrap()[..]);
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_default_writes_not_held_for_responses() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        for byte in b"ABCDE" {
            assert_eq!(bridge.on_input(&[*byte]).await.unwrap(), PumpOutcome::Written(1));
        }
        // The peer never acknowledges; every write still arrives, in order.
        for byte in b"ABCDE" {
            let write = tokio::time::timeout(SILENCE, peer.recv())
                .await
                .expect("write held back")
                .unwrap();
            assert_eq!(&write[..], &[0x52, 0x25, 0x00, *byte]);
        }
    }

    #[tokio::test]
    async fn test_write_requests_wait_for_response() {
        let (mut bridge, _transport, mut peer) = connected(request_config()).await;

        bridge.on_input(b"A").await.unwrap();
        bridge.on_input(b"BC").await.unwrap();
        bridge.on_input(b"D").await.unwrap();

        assert_eq!(&peer.recv().await.unwrap()[..], b"\x12\x25\x00A");
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
        peer.send(pdu("13"));
        assert_eq!(&peer.recv().await.unwrap()[..], b"\x12\x25\x00BC");
        peer.send(pdu("13"));
        assert_eq!(&peer.recv().await.unwrap()[..], b"\x12\x25\x00D");
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_long_input_split_at_mtu() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        let input = [b'x'; 45];
        assert_eq!(bridge.on_input(&input).await.unwrap(), PumpOutcome::Written(3));

        let mut relayed = Vec::new();
        for _ in 0..3 {
            let write = peer.recv().await.unwrap();
            assert_eq!(&write[..3], &[0x52, 0x25, 0x00]);
            relayed.extend_from_slice(&write[3..]);
        }
        assert_eq!(relayed, input);
    }

    #[tokio::test]
    async fn test_input_discarded_while_disconnected() {
        let (transport, _remote) = MemoryTransport::new();
        let mut bridge = Bridge::new(config(), transport, Vec::<u8>::new());

        assert_eq!(bridge.on_input(b"lost").await.unwrap(), PumpOutcome::Discarded);
        assert_eq!(bridge.pump().discarded(), 4);
    }

    #[tokio::test]
    async fn test_input_discarded_while_disconnected_not_replayed_after_connect() {
        let (transport, mut remote) = MemoryTransport::new();
        let mut bridge = Bridge::new(config(), transport, Vec::<u8>::new());

        assert_eq!(bridge.on_input(b"early").await.unwrap(), PumpOutcome::Discarded);

        assert!(bridge.connect());
        step(&mut bridge).await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Connected);
        let mut peer = remote.accept().await.unwrap();

        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
        assert_eq!(bridge.pump().discarded(), 5);
    }

    #[tokio::test]
    async fn test_input_discarded_while_connecting_not_replayed() {
        let (transport, mut remote) = MemoryTransport::new();
        transport.pause();
        let mut bridge = Bridge::new(config(), transport.clone(), Vec::<u8>::new());

        bridge.connect();
        assert_eq!(bridge.on_input(b"early").await.unwrap(), PumpOutcome::Discarded);

        transport.resume();
        step(&mut bridge).await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Connected);

        let mut peer = remote.accept().await.unwrap();
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_notification_relayed_without_confirmation() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        peer.send(pdu("1b25006f6b"));
        step(&mut bridge).await.unwrap();

        assert_eq!(bridge.output(), b"ok");
        assert_eq!(bridge.relay().last_handle(), Some(0x0025));
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_indication_round_trip() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        peer.send(pdu("1d10004849"));
        step(&mut bridge).await.unwrap();

        assert_eq!(bridge.output(), b"HI");
        assert_eq!(bridge.relay().last_handle(), Some(0x0010));
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x1E]);
        assert!(tokio::time::timeout(SILENCE, peer.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_indications_confirmed_in_order() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        peer.send(pdu("1d10004849"));
        step(&mut bridge).await.unwrap();
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x1E]);

        peer.send(pdu("1d1000796f"));
        step(&mut bridge).await.unwrap();
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x1E]);

        assert_eq!(bridge.output(), b"HIyo");
        assert_eq!(bridge.relay().relayed(), 2);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_fatal() {
        let (mut bridge, _transport, peer) = connected(config()).await;

        peer.send(pdu("1d10"));
        let err = step(&mut bridge).await.unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(bridge.output().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_frame_stops_run() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        peer.send(pdu("1b"));
        let err = bridge
            .run(tokio::io::empty(), std::future::pending())
            .await
            .unwrap_err();

        assert!(err.is_protocol_violation());
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_pdu_ignored() {
        let (mut bridge, _transport, peer) = connected(config()).await;

        peer.send(pdu("0a0300"));
        step(&mut bridge).await.unwrap();
        assert!(bridge.output().is_empty());
        assert_eq!(bridge.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_remote_close_disconnects() {
        let (mut bridge, _transport, peer) = connected(config()).await;

        drop(peer);
        step(&mut bridge).await.unwrap();

        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(!bridge.send_raw(pdu("1e")));
        assert_eq!(bridge.on_input(b"A").await.unwrap(), PumpOutcome::Discarded);
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        bridge.disconnect();
        bridge.disconnect();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(peer.recv().await.is_none());

        let (transport, _remote) = MemoryTransport::new();
        let mut idle = Bridge::new(config(), transport, Vec::<u8>::new());
        idle.disconnect();
        assert_eq!(idle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_is_noop_unless_disconnected() {
        let (transport, _remote) = MemoryTransport::new();
        transport.pause();
        let mut bridge = Bridge::new(config(), transport.clone(), Vec::<u8>::new());

        assert!(bridge.connect());
        assert!(!bridge.connect());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_while_connecting() {
        let (transport, _remote) = MemoryTransport::new();
        transport.pause();
        let mut bridge = Bridge::new(config(), transport.clone(), Vec::<u8>::new());

        bridge.connect();
        bridge.disconnect();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);

        transport.resume();
        assert!(tokio::time::timeout(SILENCE, bridge.next_event()).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_failure_reported() {
        let (transport, _remote) = MemoryTransport::new();
        transport.refuse("Connection refused");
        let mut bridge = Bridge::new(config(), transport, Vec::<u8>::new());

        bridge.connect();
        let reason = bridge
            .run(tokio::io::empty(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(reason, ExitReason::ConnectFailed);
        assert!(!reason.is_graceful());
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert_eq!(
            bridge.into_output(),
            b"# Connect error: connect failed: Connection refused\n"
        );
    }

    #[tokio::test]
    async fn test_run_relays_until_remote_closes() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;
        let (mut keyboard, input) = tokio::io::duplex(64);

        keyboard.write_all(b"A").await.unwrap();
        let device = tokio::spawn(async move {
            assert_eq!(&peer.recv().await.unwrap()[..], b"\x52\x25\x00A");
            peer.send(pdu("1d10004849"));
            assert_eq!(&peer.recv().await.unwrap()[..], &[0x1E]);
        });

        let reason = bridge.run(input, std::future::pending()).await.unwrap();
        device.await.unwrap();

        assert_eq!(reason, ExitReason::RemoteClosed);
        assert!(reason.is_graceful());
        assert_eq!(bridge.output(), b"HI");
        drop(keyboard);
    }

    #[tokio::test]
    async fn test_run_input_eof_keeps_link() {
        let (mut bridge, _transport, peer) = connected(config()).await;

        peer.send(pdu("1b250061"));
        let shutdown = async {
            tokio::time::sleep(SILENCE).await;
        };
        let reason = bridge.run(tokio::io::empty(), shutdown).await.unwrap();

        assert_eq!(reason, ExitReason::Interrupted);
        assert_eq!(bridge.output(), b"a");
    }

    #[tokio::test]
    async fn test_run_interrupted() {
        let (mut bridge, _transport, mut peer) = connected(config()).await;

        let reason = bridge.run(tokio::io::empty(), async {}).await.unwrap();
        assert_eq!(reason, ExitReason::Interrupted);
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_idle_without_connect() {
        let (transport, _remote) = MemoryTransport::new();
        let mut bridge = Bridge::new(config(), transport, Vec::<u8>::new());

        let reason = bridge.run(tokio::io::empty(), std::future::pending()).await.unwrap();
        assert_eq!(reason, ExitReason::Idle);
    }

    #[tokio::test]
    async fn test_mtu_exchange_widens_writes() {
        let config = BridgeConfig::builder()
            .device("AA:BB:CC:DD:EE:FF".parse().unwrap())
            .handle(0x0025)
            .mtu(64)
            .build()
            .unwrap();
        let (mut bridge, transport, mut peer) = connected(config).await;
        assert_eq!(transport.requests()[0].mtu, 64);

        assert_eq!(&peer.recv().await.unwrap()[..], &hex::decode("024000").unwrap()[..]);
        peer.send(pdu("034000"));
        step(&mut bridge).await.unwrap();

        assert_eq!(bridge.connection().mtu(), 64);
        assert_eq!(InputPump::chunk_len(bridge.connection()), 61);

        let input = [b'z'; 61];
        assert_eq!(bridge.on_input(&input).await.unwrap(), PumpOutcome::Written(1));
        assert_eq!(peer.recv().await.unwrap().len(), 64);

        bridge.disconnect();
        assert_eq!(bridge.connection().negotiated_mtu(), None);
    }
}
