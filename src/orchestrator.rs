// =============================================================================
// C9 — orchestrator: registry, feeder supervision, and the analytic cycle
// =============================================================================
//
// Grounded on the teacher's `AppState` (a single `Arc`-shared registry handed
// to every spawned task) and on `original_source/src/main.cpp`'s cadence:
// spawn feeders, warm up 5s, then run a tick loop that every 10 ticks pushes
// mids into the analyzers, every 50 prints a risk summary, and every ~30s a
// performance report. Unlike `AppState`, this registry carries no dashboard
// snapshot DTOs — it is purely the wiring point between C1 and C4-C8.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::book::{BookKey, BookStore};
use crate::config::EngineConfig;
use crate::cross_asset::CrossAssetAnalyzer;
use crate::feed;
use crate::multi_leg::MultiLegEngine;
use crate::risk::RiskManager;
use crate::synthetic::SyntheticEngine;
use crate::types::{Asset, MarketType, Venue};
use crate::volatility::VolatilityAnalyzer;

const TICK_PERIOD: Duration = Duration::from_millis(50);
const MID_PUSH_EVERY_N_TICKS: u64 = 10;
const RISK_SUMMARY_EVERY_N_TICKS: u64 = 50;
const PERFORMANCE_REPORT_PERIOD: Duration = Duration::from_secs(30);
const WARMUP_PERIOD: Duration = Duration::from_secs(5);
const FEED_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Shared state handed, via `Arc`, to every spawned task. No business logic
/// lives here — just the wiring point the orchestrator uses to hand the same
/// shared state to every consumer.
pub struct Engine {
    pub books: Arc<BookStore>,
    pub synthetic: Arc<SyntheticEngine>,
    pub volatility: Arc<VolatilityAnalyzer>,
    pub cross_asset: Arc<CrossAssetAnalyzer>,
    pub multi_leg: Arc<MultiLegEngine>,
    pub risk: Arc<RiskManager>,
    pub config: EngineConfig,
    shutdown: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            books: Arc::new(BookStore::new()),
            synthetic: Arc::new(SyntheticEngine::new()),
            volatility: Arc::new(VolatilityAnalyzer::new(
                config.history_window_vol,
                config.min_vol_spread_bps,
                config.max_vol_spread_bps,
            )),
            cross_asset: Arc::new(CrossAssetAnalyzer::new(
                config.history_window_ratio,
                config.min_ratio_spread_pct,
                config.max_ratio_spread_pct,
            )),
            multi_leg: Arc::new(MultiLegEngine::new()),
            risk: Arc::new(RiskManager::new(config.clone())),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Spawns one supervised feeder task per `BookKey`. Each task's own
    /// `run_feed` call runs until disconnect/error, then the supervisor
    /// sleeps and reconnects — mirroring the teacher's per-symbol stream
    /// tasks in `main.rs`.
    pub fn spawn_feeders(self: &Arc<Self>) {
        for key in BookKey::all() {
            let books = self.books.clone();
            let shutdown = self.shutdown_flag();
            tokio::spawn(async move {
                while !shutdown.load(Ordering::Relaxed) {
                    if let Err(e) = feed::run_feed(key, books.clone(), shutdown.clone()).await {
                        warn!(key = %key, error = %e, "feed error — reconnecting in 5s");
                    }
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    tokio::time::sleep(FEED_RECONNECT_DELAY).await;
                }
                info!(key = %key, "feeder task stopped");
            });
        }
        info!(count = BookKey::all().len(), "feeder tasks launched");
    }

    /// Spawns C4's periodic synthetic-pricing loop.
    pub fn spawn_synthetic_loop(self: &Arc<Self>) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(engine.config.calculation_interval_ms));
            while !engine.is_shutting_down() {
                interval.tick().await;
                if engine.is_shutting_down() {
                    break;
                }
                engine
                    .synthetic
                    .tick(&engine.books, &engine.config, crate::config::DEFAULT_TAU_YEARS);
            }
            info!("synthetic pricing loop stopped");
        });
    }

    fn push_mids_into_analyzers(&self) {
        for asset in Asset::ALL {
            for venue in Venue::ALL {
                let spot = self.books.mid(&BookKey::new(venue, asset, MarketType::Spot));
                let futures = self.books.mid(&BookKey::new(venue, asset, MarketType::Futures));
                if let (Some(spot), Some(futures)) = (spot, futures) {
                    self.volatility.update(venue, asset, spot, futures);
                    self.multi_leg.update_market_data(venue, asset, spot, futures);
                }
                if asset == Asset::Btc {
                    if let Some(price) = spot {
                        self.cross_asset.update_btc_price(venue, price);
                    }
                } else if let Some(price) = spot {
                    self.cross_asset.update_eth_price(venue, price);
                }
            }
        }
    }

    fn print_risk_summary(&self) {
        let metrics = self.risk.get_current_metrics();
        info!(
            capital = metrics.total_capital,
            available = metrics.available_capital,
            exposure = metrics.total_exposure,
            daily_pnl = metrics.daily_pnl,
            win_rate = metrics.win_rate,
            total_trades = metrics.total_trades,
            "risk summary"
        );
    }

    fn print_performance_report(&self) {
        let synthetic_count = self.synthetic.len();
        let vol_opportunities = self.volatility.scan().len();
        let cross_asset_opportunities = self.cross_asset.scan().len();
        let multi_leg_opportunities = self.multi_leg.scan_all().len();
        info!(
            synthetic_entries = synthetic_count,
            volatility_opportunities = vol_opportunities,
            cross_asset_opportunities,
            multi_leg_opportunities,
            "performance report"
        );
    }

    /// The main analytic cycle: ticks every ~50ms, pushing mids into
    /// analyzers every 10 ticks, printing a risk summary every 50 ticks, and
    /// a performance report every ~30s.
    pub async fn run_analytic_cycle(self: &Arc<Self>) {
        tokio::time::sleep(WARMUP_PERIOD).await;
        info!("analytic cycle starting");

        let tick_count = AtomicU64::new(0);
        let mut last_report = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(TICK_PERIOD);

        while !self.is_shutting_down() {
            interval.tick().await;
            if self.is_shutting_down() {
                break;
            }

            let tick = tick_count.fetch_add(1, Ordering::Relaxed) + 1;

            if tick % MID_PUSH_EVERY_N_TICKS == 0 {
                self.push_mids_into_analyzers();
            }
            if tick % RISK_SUMMARY_EVERY_N_TICKS == 0 {
                self.print_risk_summary();
            }
            if last_report.elapsed() >= PERFORMANCE_REPORT_PERIOD {
                self.print_performance_report();
                last_report = tokio::time::Instant::now();
            }
        }
        info!("analytic cycle stopped");
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_engine_starts_with_empty_analyzers() {
        let engine = Engine::new(EngineConfig::default());
        assert!(engine.synthetic.is_empty());
        assert!(engine.volatility.scan().is_empty());
        assert!(engine.cross_asset.scan().is_empty());
        assert!(engine.multi_leg.scan_all().is_empty());
    }

    #[test]
    fn request_shutdown_sets_the_flag() {
        let engine = Engine::new(EngineConfig::default());
        assert!(!engine.is_shutting_down());
        engine.request_shutdown();
        assert!(engine.is_shutting_down());
    }
}
