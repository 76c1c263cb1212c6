//! BlueZ transport: ATT over an L2CAP SEQPACKET socket.
//!
//! Connects the fixed ATT channel (CID 4) on an LE link, or a dynamic PSM
//! when one is configured. One SEQPACKET datagram carries exactly one PDU.

use std::io;
use std::net::Shutdown;

use bluer::l2cap::{Security, SecurityLevel as BluezSecurity, SeqPacket, Socket, SocketAddr};
use bluer::{Address, AddressType as BluezAddressType};
use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::debug;

use super::address::{AddressType, ConnectRequest, DeviceAddress, SecurityLevel};
use crate::core::constants::{ATT_CID, ATT_MAX_MTU, ATT_PSM_FIXED};
use crate::core::{AttLink, Transport, TransportError};

/// Opens ATT links through the kernel's L2CAP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BluezTransport;

impl BluezTransport {
    /// Create a new BlueZ transport.
    pub fn new() -> Self {
        Self
    }
}

fn address(addr: DeviceAddress) -> Address {
    Address::new(*addr.as_bytes())
}

fn address_type(kind: AddressType) -> BluezAddressType {
    match kind {
        AddressType::Public => BluezAddressType::LePublic,
        AddressType::Random => BluezAddressType::LeRandom,
    }
}

fn security(level: SecurityLevel) -> Security {
    let level = match level {
        SecurityLevel::Low => BluezSecurity::Low,
        SecurityLevel::Medium => BluezSecurity::Medium,
        SecurityLevel::High => BluezSecurity::High,
    };
    Security { level, key_size: 0 }
}

async fn open(request: ConnectRequest) -> io::Result<BluezLink> {
    let socket = Socket::<SeqPacket>::new_seq_packet()?;

    let source = request.source.unwrap_or(DeviceAddress::ANY);
    socket.bind(SocketAddr::new(address(source), BluezAddressType::LePublic, 0))?;
    socket.set_security(security(request.security_level))?;

    let mut remote = SocketAddr::new(
        address(request.destination),
        address_type(request.address_type),
        request.psm,
    );
    if request.psm == ATT_PSM_FIXED {
        remote.cid = ATT_CID;
    }

    debug!(
        destination = %request.destination,
        address_type = %request.address_type,
        security = %request.security_level,
        psm = request.psm,
        mtu = request.effective_mtu(),
        "opening l2cap socket"
    );
    let stream = socket.connect(remote).await?;

    // Sized for the largest PDU the remote may send after an MTU exchange.
    Ok(BluezLink {
        stream,
        buf: vec![0u8; ATT_MAX_MTU as usize],
    })
}

impl Transport for BluezTransport {
    type Link = BluezLink;

    fn connect(
        &self,
        request: ConnectRequest,
    ) -> BoxFuture<'static, Result<BluezLink, TransportError>> {
        Box::pin(async move {
            open(request)
                .await
                .map_err(|e| TransportError::ConnectFailed(e.to_string()))
        })
    }
}

/// An established L2CAP ATT link.
pub struct BluezLink {
    stream: SeqPacket,
    buf: Vec<u8>,
}

impl AttLink for BluezLink {
    async fn send(&mut self, pdu: &[u8]) -> io::Result<()> {
        self.stream.send(pdu).await.map(|_| ())
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        match self.stream.recv(&mut self.buf).await {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(Bytes::copy_from_slice(&self.buf[..n]))),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
