//! Super-Cache node binary.

use anyhow::{Context, Result};
use tracing::info;

use sc_node::{CacheNode, NodeConfig};
use sc_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize logging")?;

    let config = NodeConfig::from_env()?;
    info!(
        addr = %config.listener.socket_addr(),
        admission = ?config.listener.admission,
        queue_capacity = config.queue_capacity,
        "Starting Super-Cache node"
    );

    let mut node = CacheNode::new(config);
    node.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await
}
