// =============================================================================
// Cross-Venue Arbitrage Engine — Main Entry Point
// =============================================================================
//
// Starts the 12 order-book feeders, the periodic synthetic-pricing loop, and
// the main analytic cycle, then waits on Ctrl+C for a graceful shutdown.
// There is no persisted state to flush on exit.
// =============================================================================

mod book;
mod config;
mod cross_asset;
mod error;
mod feed;
mod multi_leg;
mod orchestrator;
mod risk;
mod snapshot;
mod synthetic;
mod types;
mod volatility;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::orchestrator::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Cross-Venue Arbitrage Engine — Starting Up        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = EngineConfig::default();
    info!(
        initial_capital = config.initial_capital,
        calculation_interval_ms = config.calculation_interval_ms,
        "engine configured"
    );

    let engine = Arc::new(Engine::new(config));

    engine.spawn_feeders();
    engine.spawn_synthetic_loop();

    let cycle_engine = engine.clone();
    tokio::spawn(async move {
        cycle_engine.run_analytic_cycle().await;
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");
    engine.request_shutdown();

    info!("Arbitrage engine shut down complete.");
    Ok(())
}
