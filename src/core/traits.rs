//! Collaborator traits for the attribute bridge.
//!
//! The bridge never touches sockets directly. A [`Transport`] establishes a
//! link to the remote device and hands back an [`AttLink`], which moves whole
//! ATT PDUs in both directions.

use std::future::Future;
use std::io;

use bytes::Bytes;
use futures::future::BoxFuture;

use super::error::TransportError;
use crate::transport::ConnectRequest;

/// An established, PDU-oriented link to a remote device.
///
/// # Requirements
///
/// - `recv` MUST be cancel safe: dropping its future before completion must
///   not lose a PDU. The link driver polls it inside `tokio::select!`.
/// - `recv` returns `Ok(None)` once the peer hangs up.
/// - `shutdown` may be called on a link that is already closed.
pub trait AttLink: Send + 'static {
    /// Send one PDU.
    fn send(&mut self, pdu: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive the next PDU.
    fn recv(&mut self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;

    /// Shut the link down.
    fn shutdown(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Something that can open links to remote devices.
///
/// `connect` returns immediately with a future; the bridge drives it on a
/// background task and learns about completion through its event channel.
pub trait Transport: Send + Sync + 'static {
    /// Link type produced by this transport.
    type Link: AttLink;

    /// Start connecting to the device described by `request`.
    fn connect(
        &self,
        request: ConnectRequest,
    ) -> BoxFuture<'static, Result<Self::Link, TransportError>>;
}
