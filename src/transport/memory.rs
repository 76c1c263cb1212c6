//! In-process transport.
//!
//! [`MemoryTransport`] hands out links whose far end is a [`MemoryPeer`]
//! playing the remote device. Peers are collected through [`MemoryRemote`].
//! Used by the test suites and handy for wiring the bridge to something other
//! than a radio.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};

use super::address::ConnectRequest;
use crate::core::{AttLink, Transport, TransportError};

#[derive(Debug, Default)]
struct Shared {
    refusal: Option<String>,
    requests: Vec<ConnectRequest>,
}

/// Transport whose links end in [`MemoryPeer`]s.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    paused: Arc<watch::Sender<bool>>,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

/// Collects the remote ends of links opened through a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryRemote {
    accepted: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a transport and the remote that accepts its links.
    pub fn new() -> (Self, MemoryRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (paused, _) = watch::channel(false);
        let transport = Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            paused: Arc::new(paused),
            accepted: tx,
        };
        (transport, MemoryRemote { accepted: rx })
    }

    /// Make subsequent connects fail with `reason`.
    pub fn refuse(&self, reason: impl Into<String>) {
        self.lock().refusal = Some(reason.into());
    }

    /// Let connects succeed again.
    pub fn accept_connections(&self) {
        self.lock().refusal = None;
    }

    /// Hold connects in progress until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Let held connects complete.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Every connect request seen so far.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    type Link = MemoryLink;

    fn connect(
        &self,
        request: ConnectRequest,
    ) -> BoxFuture<'static, Result<MemoryLink, TransportError>> {
        self.lock().requests.push(request);
        let this = self.clone();
        let mut gate = self.paused.subscribe();

        Box::pin(async move {
            if gate.wait_for(|paused| !paused).await.is_err() {
                return Err(TransportError::LinkClosed);
            }

            let refusal = this.lock().refusal.clone();
            if let Some(reason) = refusal {
                return Err(TransportError::ConnectFailed(reason));
            }

            let (to_peer, from_central) = mpsc::unbounded_channel();
            let (to_central, from_peer) = mpsc::unbounded_channel();
            let peer = MemoryPeer {
                to_central,
                from_central,
            };
            this.accepted
                .send(peer)
                .map_err(|_| TransportError::ConnectFailed("remote not listening".into()))?;

            Ok(MemoryLink {
                to_peer: Some(to_peer),
                from_peer,
            })
        })
    }
}

impl MemoryRemote {
    /// Wait for the next link to be opened and return its remote end.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accepted.recv().await
    }
}

/// Local end of an in-memory link.
#[derive(Debug)]
pub struct MemoryLink {
    to_peer: Option<mpsc::UnboundedSender<Bytes>>,
    from_peer: mpsc::UnboundedReceiver<Bytes>,
}

impl AttLink for MemoryLink {
    async fn send(&mut self, pdu: &[u8]) -> io::Result<()> {
        let tx = self
            .to_peer
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        tx.send(Bytes::copy_from_slice(pdu))
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        Ok(self.from_peer.recv().await)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.to_peer = None;
        self.from_peer.close();
        Ok(())
    }
}

/// Remote end of an in-memory link, standing in for the device.
#[derive(Debug)]
pub struct MemoryPeer {
    to_central: mpsc::UnboundedSender<Bytes>,
    from_central: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryPeer {
    /// Send a PDU to the bridge. Returns `false` once the link is gone.
    pub fn send(&self, pdu: Bytes) -> bool {
        self.to_central.send(pdu).is_ok()
    }

    /// Wait for the next PDU from the bridge; `None` once the link is shut.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.from_central.recv().await
    }

    /// Take a PDU if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.from_central.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DeviceAddress;

    #[tokio::test]
    async fn test_memory_link_roundtrip() {
        let (transport, mut remote) = MemoryTransport::new();
        let mut link = transport
            .connect(ConnectRequest::new(DeviceAddress::ANY))
            .await
            .unwrap();
        let mut peer = remote.accept().await.unwrap();

        link.send(&[0x12, 0x01, 0x00, 0x41]).await.unwrap();
        assert_eq!(&peer.recv().await.unwrap()[..], &[0x12, 0x01, 0x00, 0x41]);

        assert!(peer.send(Bytes::from_static(&[0x13])));
        assert_eq!(&link.recv().await.unwrap().unwrap()[..], &[0x13]);

        drop(peer);
        assert!(link.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_shutdown_hangs_up_peer() {
        let (transport, mut remote) = MemoryTransport::new();
        let mut link = transport
            .connect(ConnectRequest::new(DeviceAddress::ANY))
            .await
            .unwrap();
        let mut peer = remote.accept().await.unwrap();

        link.shutdown().await.unwrap();
        assert!(peer.recv().await.is_none());
        assert!(link.send(&[0x1E]).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_refuse_and_record() {
        let (transport, _remote) = MemoryTransport::new();
        transport.refuse("device busy");

        let request = ConnectRequest::new("AA:BB:CC:DD:EE:FF".parse().unwrap());
        let err = transport.connect(request.clone()).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed(ref r) if r == "device busy"));
        assert_eq!(transport.requests(), vec![request]);

        transport.accept_connections();
        assert!(
            transport
                .connect(ConnectRequest::new(DeviceAddress::ANY))
                .await
                .is_ok()
        );
    }
}
