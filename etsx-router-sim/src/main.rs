//! Etsx Router Simulator - Main entry point

use anyhow::Context;
use etsx_router_sim::Simulator;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load the scenario
    let path = std::env::args()
        .nth(1)
        .context("usage: etsx-router-sim <scenario.json>")?;
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;

    // Replay it
    let report = Simulator::from_json(&json)?.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
