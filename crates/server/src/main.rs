//! Protobridge - serves canonical and legacy clients from one game host
//!
//! Main server binary

mod lobby;

use anyhow::Context;
use lobby::Lobby;
use protobridge_config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use protobridge_network::{event_channel, NetworkConfig, NetworkInterface, OfflineVerifier, UdpTransport};
use protobridge_protocol::{CURRENT_PROTOCOL, LEGACY_PROTOCOL};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Protobridge {} starting up", env!("CARGO_PKG_VERSION"));

    let bridge_config = BridgeConfig::load_or_default(DEFAULT_CONFIG_PATH)
        .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))?;
    bridge_config.display();

    let network_config = NetworkConfig::from_bridge_config(&bridge_config)?;
    info!(
        "Accepting protocol {} and legacy {:?} (bridged to {})",
        CURRENT_PROTOCOL, network_config.legacy_protocols, LEGACY_PROTOCOL
    );

    let (events_tx, events_rx) = event_channel(network_config.event_queue_capacity);
    let transport = UdpTransport::bind(&network_config, events_tx.clone())?;
    let receiver = tokio::spawn(transport.clone().run());

    let host = Arc::new(Lobby::new(network_config.motd.clone()));
    let interface = NetworkInterface::new(
        network_config,
        transport,
        host,
        Arc::new(OfflineVerifier),
        (events_tx, events_rx),
    )?;

    if let Err(e) = interface.run().await {
        error!("Network interface error: {}", e);
        return Err(e.into());
    }

    receiver.abort();
    info!("Protobridge shut down");
    Ok(())
}
