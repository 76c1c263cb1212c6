//! Connection state machine.
//!
//! ```text
//!                connect()                 Connected event
//!  Disconnected ───────────▶ Connecting ──────────────────▶ Connected
//!       ▲                        │                              │
//!       │   ConnectFailed /      │        disconnect() /        │
//!       └──── disconnect() ──────┘◀────── Closed event ─────────┘
//! ```
//!
//! All transitions happen on the event loop. Connect completion arrives as a
//! [`LinkEvent`](crate::transport::LinkEvent) tagged with the session
//! generation current when `connect` was called.

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::Transport;
use crate::core::constants::ATT_DEFAULT_LE_MTU;
use crate::transport::{
    AddressType, AttChannel, ConnectRequest, DeviceAddress, EventSender, SecurityLevel,
    spawn_connect,
};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link; initial state.
    #[default]
    Disconnected,
    /// Connect issued, waiting for completion.
    Connecting,
    /// Link up, relay active.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Remote end of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Device address.
    pub address: DeviceAddress,
    /// Address type.
    pub address_type: AddressType,
}

/// The single logical link to the remote device.
///
/// Owns the attribute channel; the relay and the input pump only borrow it
/// for one send.
#[derive(Debug, Default)]
pub struct Connection {
    state: ConnectionState,
    target: Option<Target>,
    security_level: SecurityLevel,
    /// Present only while `Connected`.
    channel: Option<AttChannel>,
    /// Present only while `Connecting`.
    pending: Option<JoinHandle<()>>,
    /// Negotiated MTU; `None` until an exchange completes.
    mtu: Option<u16>,
    session: u64,
}

impl Connection {
    /// Create a disconnected connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether writes and confirmations may be sent.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Session generation of the most recent connect.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Remote end of the current or last connection.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Security level requested for the current or last connection.
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Negotiated MTU, if an exchange completed this session.
    pub fn negotiated_mtu(&self) -> Option<u16> {
        self.mtu
    }

    /// MTU in effect: negotiated, or the LE default.
    pub fn mtu(&self) -> u16 {
        self.mtu.unwrap_or(ATT_DEFAULT_LE_MTU)
    }

    /// Start connecting.
    ///
    /// Only valid from `Disconnected`; returns `false` and does nothing
    /// otherwise. Completion arrives later through `events`.
    pub fn connect<T: Transport>(
        &mut self,
        transport: &T,
        request: ConnectRequest,
        events: &EventSender,
    ) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "connect ignored");
            return false;
        }

        self.session += 1;
        self.target = Some(Target {
            address: request.destination,
            address_type: request.address_type,
        });
        self.security_level = request.security_level;
        self.state = ConnectionState::Connecting;

        info!(
            session = self.session,
            destination = %request.destination,
            address_type = %request.address_type,
            "connecting"
        );
        self.pending = Some(spawn_connect(transport, request, self.session, events.clone()));
        true
    }

    /// Complete a connect with the channel it produced.
    ///
    /// Returns `false`, dropping the channel, if the channel belongs to
    /// another session or the connect was cancelled in the meantime.
    pub fn on_connected(&mut self, channel: AttChannel) -> bool {
        if self.state != ConnectionState::Connecting || channel.session() != self.session {
            debug!(session = channel.session(), "stale channel released");
            return false;
        }

        self.pending = None;
        self.channel = Some(channel);
        self.state = ConnectionState::Connected;
        info!(session = self.session, "connected");
        true
    }

    /// Record a failed connect.
    pub fn on_connect_failed(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.pending = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Record the result of an MTU exchange.
    pub fn set_mtu(&mut self, mtu: u16) {
        if self.is_connected() {
            self.mtu = Some(mtu);
        }
    }

    /// Tear the connection down.
    ///
    /// Cancels a pending connect, releases the channel (the link driver
    /// flushes what it already has, then shuts the link), and forgets the
    /// negotiated MTU. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.channel = None;
        self.mtu = None;
        self.state = ConnectionState::Disconnected;
        info!(session = self.session, "disconnected");
    }

    /// Hand a PDU to the channel.
    ///
    /// Returns `false` without sending unless `Connected`. Delivery failures
    /// surface later as a `Closed` event, not here.
    pub fn send(&self, pdu: Bytes) -> bool {
        match (&self.state, &self.channel) {
            (ConnectionState::Connected, Some(channel)) => channel.send(pdu),
            _ => false,
        }
    }
}
