//! Transport layer.
//!
//! Everything between the bridge and the radio:
//!
//! - **Addressing**: [`DeviceAddress`], [`AddressType`], [`SecurityLevel`]
//!   and the [`ConnectRequest`] handed to a transport
//! - **Attribute channel**: [`spawn_connect`] starts a connect and, once the
//!   link is up, the driver that serialises requests and reports
//!   [`LinkEvent`]s
//! - **Transports**: [`MemoryTransport`] for in-process use and, with the
//!   `bluez` feature on Linux, [`BluezTransport`]
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Bridge                     │
//! ├─────────────────────────────────────────┤
//! │      AttChannel / LinkDriver            │  ← This module
//! ├─────────────────────────────────────────┤
//! │   Transport (BlueZ L2CAP | memory)      │
//! └─────────────────────────────────────────┘
//! ```

mod address;
#[cfg(all(feature = "bluez", target_os = "linux"))]
mod bluez;
mod link;
mod memory;

pub use address::*;
#[cfg(all(feature = "bluez", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "bluez", target_os = "linux"))))]
pub use bluez::{BluezLink, BluezTransport};
pub use link::{AttChannel, EventReceiver, EventSender, LinkEvent, spawn_connect};
pub use memory::{MemoryLink, MemoryPeer, MemoryRemote, MemoryTransport};
