//! # att-bridge
//!
//! A transparent byte pipe between a local stream and one characteristic on
//! a Bluetooth Low Energy device, spoken over the Attribute Protocol (ATT).
//!
//! - Bytes read from the local input become writes to the configured
//!   characteristic handle
//! - Notifications and indications from the device are written verbatim to
//!   the local output; indications are confirmed
//!
//! One connection, one handle. No discovery, no GATT server, no retries.
//!
//! ## Feature Flags
//!
//! - `bluez` (default): BlueZ L2CAP transport (Linux only)
//! - `cli` (default): the `att-bridge` binary
//!
//! ## Modules
//!
//! - [`core`]: Collaborator traits, constants, and error types
//! - [`att`]: Attribute protocol codec
//! - [`transport`]: Addressing, the attribute channel, and transports
//! - [`bridge`]: Connection state machine, relay, input pump, event loop
//!
//! ## Example Usage
//!
//! ```rust
//! use att_bridge::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::builder()
//!     .device("AA:BB:CC:DD:EE:FF".parse()?)
//!     .handle(parse_handle("0x0025")?)
//!     .build()?;
//!
//! let (transport, mut remote) = MemoryTransport::new();
//! let mut bridge = Bridge::new(config, transport, Vec::<u8>::new());
//! bridge.connect();
//!
//! let device = tokio::spawn(async move {
//!     let peer = remote.accept().await.unwrap();
//!     peer.send(bytes::Bytes::from_static(&[0x1B, 0x25, 0x00, b'h', b'i']));
//! });
//!
//! let reason = bridge.run(tokio::io::empty(), std::future::pending()).await?;
//! device.await?;
//! assert_eq!(reason, ExitReason::RemoteClosed);
//! assert_eq!(bridge.output(), b"hi");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Protocol codec
pub mod att;

// Transport layer
pub mod transport;

// Bridge API
pub mod bridge;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    // Bridge types
    pub use crate::bridge::{
        Bridge, BridgeConfig, BridgeConfigBuilder, ConnectionState, ExitReason, WriteMode,
        parse_handle,
    };

    // Transport types
    pub use crate::transport::{
        AddressType, ConnectRequest, DeviceAddress, MemoryTransport, SecurityLevel,
    };

    #[cfg(all(feature = "bluez", target_os = "linux"))]
    pub use crate::transport::BluezTransport;
}

// Re-export commonly used items at crate root
pub use crate::core::{BridgeError, ConfigError, DecodeError, TransportError};

pub use crate::bridge::{Bridge, BridgeConfig, ConnectionState, ExitReason};
pub use crate::transport::{AddressType, DeviceAddress, SecurityLevel};
