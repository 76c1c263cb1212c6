//! Entry point for `att-bridge`.
//!
//! Parses arguments, sets up logging on stderr (stdout carries data), runs
//! the bridge on stdin/stdout until the device hangs up or Ctrl-C.

use std::process::ExitCode;

use att_bridge::bridge::{BridgeConfig, ExitReason, WriteMode, parse_handle};
use att_bridge::core::{BridgeError, ConfigError};
use att_bridge::transport::{AddressType, DeviceAddress, SecurityLevel};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Pipe stdin/stdout to a Bluetooth LE characteristic.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Remote device address (e.g. AA:BB:CC:DD:EE:FF).
    device: DeviceAddress,

    /// Characteristic value handle, hexadecimal (e.g. 0x0025).
    #[arg(value_parser = parse_handle)]
    handle: u16,

    /// Remote address type.
    #[arg(long, value_enum, default_value_t = AddressType::Public)]
    addr_type: AddressType,

    /// Link security level.
    #[arg(long, value_enum, default_value_t = SecurityLevel::Low)]
    sec_level: SecurityLevel,

    /// Local adapter address.
    #[arg(long)]
    adapter: Option<DeviceAddress>,

    /// MTU to request after connecting (0 keeps the default).
    #[arg(long, default_value_t = 0)]
    mtu: u16,

    /// L2CAP PSM (0 for the fixed ATT channel).
    #[arg(long, default_value_t = 0)]
    psm: u16,

    /// Use acknowledged Write Requests instead of Write Commands.
    #[arg(long)]
    write_request: bool,
}

impl Cli {
    fn config(&self) -> Result<BridgeConfig, ConfigError> {
        let mut builder = BridgeConfig::builder()
            .device(self.device)
            .handle(self.handle)
            .address_type(self.addr_type)
            .security_level(self.sec_level)
            .psm(self.psm)
            .mtu(self.mtu);
        if let Some(adapter) = self.adapter {
            builder = builder.source(adapter);
        }
        if self.write_request {
            builder = builder.write_mode(WriteMode::Request);
        }
        builder.build()
    }
}

fn init_logging() {
    // RUST_LOG controls verbosity; quiet by default.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(all(feature = "bluez", target_os = "linux"))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(all(feature = "bluez", target_os = "linux"))]
async fn bridge(config: BridgeConfig) -> Result<ExitReason, BridgeError> {
    use att_bridge::bridge::Bridge;
    use att_bridge::transport::BluezTransport;

    let mut bridge = Bridge::new(config, BluezTransport::new(), tokio::io::stdout());
    bridge.connect();
    bridge.run(tokio::io::stdin(), shutdown_signal()).await
}

#[cfg(not(all(feature = "bluez", target_os = "linux")))]
async fn bridge(_config: BridgeConfig) -> Result<ExitReason, BridgeError> {
    Err(att_bridge::core::TransportError::Unsupported.into())
}

fn run(cli: &Cli) -> Result<ExitReason, BridgeError> {
    let config = cli.config()?;
    tracing::debug!(device = %config.device, handle = config.handle, "starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(bridge(config));
    // stdin is read on a blocking thread that may never return.
    runtime.shutdown_background();
    result
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();

    match run(&cli) {
        Ok(reason) if reason.is_graceful() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}
