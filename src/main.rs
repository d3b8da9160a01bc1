//! Soil moisture serial bridge service

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use soilbridge::config::BridgeConfig;
use soilbridge::device::DeviceClass;
use soilbridge::error::Result;
use soilbridge::source::SerialLineSource;
use soilbridge::supervisor::ConnectionSupervisor;
use soilbridge::uplink::UplinkClient;

/// Bridge startup arguments
#[derive(Debug, Clone, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[clap(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Serial port path override (e.g., /dev/ttyUSB0)
    #[clap(short = 'p', long)]
    port: Option<String>,

    /// Device class override
    #[clap(short = 'c', long, value_enum)]
    device_class: Option<DeviceClass>,

    /// Logical device identifier override
    #[clap(long)]
    device_id: Option<String>,

    /// Ingestion API base URL override
    #[clap(long)]
    api_url: Option<String>,

    /// Only validate configuration without starting the bridge
    #[clap(long)]
    validate: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(class) = self.device_class {
            config.serial.device_class = class;
        }
        if let Some(id) = &self.device_id {
            config.device_id = Some(id.clone());
        }
        if let Some(url) = &self.api_url {
            config.api.url = url.clone();
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C, or SIGTERM on Unix)
async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}; Ctrl+C only", e);
            let _ = ctrl_c.await;
        }
    }

    #[cfg(not(unix))]
    let _ = ctrl_c.await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let mut config = BridgeConfig::load()?;
    args.apply(&mut config);
    config.validate()?;

    if args.validate {
        info!("Configuration validated successfully");
        return Ok(());
    }

    let class = config.serial.device_class;
    let device_id = config.device_id();

    info!("Soil moisture serial bridge starting");
    info!("Serial port: {} at {} baud", config.serial.port, class.baud_rate());
    info!("Device class: {}", class);
    info!("Device ID: {}", device_id);
    info!("API URL: {}", config.api.url);

    let source = SerialLineSource::new(&config.serial.port, class.baud_rate());
    let uplink = Arc::new(UplinkClient::new(&config.api.url, config.api.key.clone()));
    let supervisor = ConnectionSupervisor::new(
        source,
        class.decoder(),
        uplink,
        device_id,
        class.retry_delay(),
    );

    let shutdown = CancellationToken::new();
    let supervisor_handle = tokio::spawn(supervisor.run(shutdown.clone()));

    wait_for_shutdown().await;
    info!("Shutdown signal received, closing device link");
    shutdown.cancel();
    let _ = supervisor_handle.await;

    info!("Bridge stopped");
    Ok(())
}
