//! # Murmur Node
//!
//! Entry point: initialize logging, load configuration, build the feeds
//! core, and serve until interrupted.

use anyhow::Result;
use node_runtime::{build_node, NodeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = NodeConfig::from_env();
    info!(data_dir = %config.data_dir, "Initializing Murmur node");

    let node = build_node(&config)?;
    info!(
        kinds = node.pipeline.registered_kinds().len(),
        "Murmur node initialized; feeds core ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
