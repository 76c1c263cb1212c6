//! The bridge: connection lifecycle, relay and event loop.
//!
//! ```text
//!   input ──▶ InputPump ──write──▶ Connection ──▶ remote
//!                                      │
//!  output ◀── EventRelay ◀──notify/indicate──┘ (+ confirmation)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use att_bridge::bridge::{Bridge, BridgeConfig};
//! use att_bridge::transport::MemoryTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::builder()
//!     .device("AA:BB:CC:DD:EE:FF".parse()?)
//!     .handle(0x0025)
//!     .build()?;
//!
//! let (transport, _remote) = MemoryTransport::new();
//! let mut bridge = Bridge::new(config, transport, tokio::io::stdout());
//! bridge.connect();
//! let reason = bridge.run(tokio::io::stdin(), std::future::pending()).await?;
//! println!("stopped: {reason:?}");
//! # Ok(())
//! # }
//! ```

#[allow(clippy::module_inception)]
mod bridge;
mod config;
mod connection;
mod pump;
mod relay;

pub use bridge::{Bridge, ExitReason};
pub use config::{BridgeConfig, BridgeConfigBuilder, WriteMode, parse_handle};
pub use connection::{Connection, ConnectionState, Target};
pub use pump::{InputPump, PumpOutcome};
pub use relay::{EventRelay, RelayOutcome};
