// =============================================================================
// C4 — synthetic pricing engine
// =============================================================================
//
// Periodic loop (driven by the orchestrator) that, for every (venue, asset)
// with both a spot and a futures/perp book, computes a fair-value estimate
// and the live mispricing against it. Dispatch of which variant a venue runs
// is fixed, not configurable: Binance and OKX run cost-of-carry
// ("futures_vs_spot"); Bybit runs the funding-adjusted synthetic spot
// ("spot_vs_perpetual"). This mirrors the reference deployment's per-venue
// wiring rather than deriving it from book contents.
//
// Follows C5/C6's shape: its own `RwLock`-guarded map, snapshotted into
// locals from the book store (releasing the book lock) before publishing.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::book::{BookKey, BookStore};
use crate::config::EngineConfig;
use crate::types::{Asset, MarketType, Venue};

/// The two pricing relationships the engine supports for a (venue, asset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntheticVariant {
    /// Cost-of-carry: synthetic = spot * exp(r * tau), compared against the
    /// real futures/dated-future price.
    FuturesVsSpot,
    /// Funding-adjusted: synthetic = perp * (1 - funding_rate), compared
    /// against the real spot price.
    SpotVsPerpetual,
}

impl std::fmt::Display for SyntheticVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FuturesVsSpot => write!(f, "futures_vs_spot"),
            Self::SpotVsPerpetual => write!(f, "spot_vs_perpetual"),
        }
    }
}

fn variant_for(venue: Venue) -> SyntheticVariant {
    match venue {
        Venue::Binance | Venue::Okx => SyntheticVariant::FuturesVsSpot,
        Venue::Bybit => SyntheticVariant::SpotVsPerpetual,
    }
}

/// One computed fair-value/mispricing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticPrice {
    pub venue: Venue,
    pub asset: Asset,
    pub variant: SyntheticVariant,
    pub real: f64,
    pub synthetic: f64,
    pub mispricing_pct: f64,
    /// For `SpotVsPerpetual`, the funding rate used. For `FuturesVsSpot` this
    /// carries the risk-free rate used in the cost-of-carry calculation — the
    /// field is overloaded the same way in the reference deployment, which
    /// always populates it even when "funding" isn't semantically meaningful
    /// for that variant.
    pub funding_rate: f64,
    pub valid: bool,
}

fn publish_key(venue: Venue, asset: Asset, variant: SyntheticVariant) -> String {
    format!("{venue}_{asset}_{variant}")
}

/// `synthetic = spot * exp(r * tau)`.
pub fn cost_of_carry_future(spot: f64, risk_free_rate: f64, tau_years: f64) -> f64 {
    spot * (risk_free_rate * tau_years).exp()
}

/// `synthetic = perp * (1 - funding_rate)`.
pub fn funding_adjusted_spot(perp: f64, funding_rate: f64) -> f64 {
    perp * (1.0 - funding_rate)
}

/// `(real - synthetic) / synthetic * 100`, or 0 if `synthetic == 0`.
pub fn mispricing_pct(real: f64, synthetic: f64) -> f64 {
    if synthetic == 0.0 {
        0.0
    } else {
        (real - synthetic) / synthetic * 100.0
    }
}

pub struct SyntheticEngine {
    prices: RwLock<HashMap<String, SyntheticPrice>>,
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Recompute every (venue, asset) entry from the current book state.
    /// Takes the book store's read guard once per key and releases it before
    /// taking its own write guard, per the engine's lock-ordering discipline.
    pub fn tick(&self, books: &BookStore, config: &EngineConfig, tau_years: f64) {
        let mut computed = Vec::with_capacity(Venue::ALL.len() * Asset::ALL.len());

        for venue in Venue::ALL {
            for asset in Asset::ALL {
                let spot_key = BookKey::new(venue, asset, MarketType::Spot);
                let fut_key = BookKey::new(venue, asset, MarketType::Futures);
                let spot_mid = books.mid(&spot_key);
                let fut_mid = books.mid(&fut_key);
                let (Some(spot), Some(fut)) = (spot_mid, fut_mid) else {
                    continue;
                };

                let variant = variant_for(venue);
                let (real, synthetic, funding_rate) = match variant {
                    SyntheticVariant::FuturesVsSpot => (
                        fut,
                        cost_of_carry_future(spot, config.risk_free_rate, tau_years),
                        config.risk_free_rate,
                    ),
                    SyntheticVariant::SpotVsPerpetual => (
                        spot,
                        funding_adjusted_spot(fut, config.default_funding_rate),
                        config.default_funding_rate,
                    ),
                };

                let pct = mispricing_pct(real, synthetic);
                let valid = pct.abs() >= config.min_mispricing_pct && pct.abs() <= config.max_mispricing_pct;

                computed.push((
                    publish_key(venue, asset, variant),
                    SyntheticPrice {
                        venue,
                        asset,
                        variant,
                        real,
                        synthetic,
                        mispricing_pct: pct,
                        funding_rate,
                        valid,
                    },
                ));
            }
        }

        let mut prices = self.prices.write();
        prices.clear();
        for (key, price) in computed {
            debug!(key = %key, mispricing_pct = price.mispricing_pct, valid = price.valid, "synthetic price computed");
            prices.insert(key, price);
        }
    }

    /// Valid entries sorted by `|mispricing_pct|` descending.
    pub fn get_opportunities(&self) -> Vec<SyntheticPrice> {
        let prices = self.prices.read();
        let mut valid: Vec<SyntheticPrice> = prices.values().filter(|p| p.valid).cloned().collect();
        valid.sort_by(|a, b| b.mispricing_pct.abs().partial_cmp(&a.mispricing_pct.abs()).unwrap());
        valid
    }

    pub fn len(&self) -> usize {
        self.prices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SyntheticEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookUpdate, PriceLevel, UpdateKind};

    fn snapshot(key: BookKey, bid: f64, ask: f64) -> BookUpdate {
        BookUpdate {
            key,
            kind: UpdateKind::Snapshot,
            bids: vec![PriceLevel { price: bid, quantity: 1.0 }],
            asks: vec![PriceLevel { price: ask, quantity: 1.0 }],
            seq: None,
            event_ts: None,
        }
    }

    #[test]
    fn cost_of_carry_matches_reference_scenario() {
        let synthetic = cost_of_carry_future(30_000.0, 0.05, 0.25);
        assert!((synthetic - 30_377.36).abs() < 0.01);
        let pct = mispricing_pct(30_150.0, synthetic);
        assert!((pct - (-0.749)).abs() < 0.01);
    }

    #[test]
    fn binance_and_okx_run_futures_vs_spot() {
        assert_eq!(variant_for(Venue::Binance), SyntheticVariant::FuturesVsSpot);
        assert_eq!(variant_for(Venue::Okx), SyntheticVariant::FuturesVsSpot);
    }

    #[test]
    fn bybit_runs_spot_vs_perpetual() {
        assert_eq!(variant_for(Venue::Bybit), SyntheticVariant::SpotVsPerpetual);
    }

    #[test]
    fn tick_populates_an_entry_per_venue_asset_with_both_books() {
        let store = BookStore::new();
        let config = EngineConfig::default();
        let engine = SyntheticEngine::new();

        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Btc, MarketType::Spot), 30_000.0, 30_001.0))
            .unwrap();
        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Btc, MarketType::Futures), 30_150.0, 30_151.0))
            .unwrap();

        engine.tick(&store, &config, 0.25);
        assert_eq!(engine.len(), 1);
        let opportunities = engine.get_opportunities();
        if let Some(entry) = opportunities.first() {
            assert_eq!(entry.venue, Venue::Binance);
            assert_eq!(entry.variant, SyntheticVariant::FuturesVsSpot);
        }
    }

    #[test]
    fn get_opportunities_excludes_invalid_entries_and_sorts_by_magnitude() {
        let store = BookStore::new();
        let config = EngineConfig::default();
        let engine = SyntheticEngine::new();

        // Tiny mispricing on ETH/Binance => below min_mispricing_pct, invalid.
        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Eth, MarketType::Spot), 2000.0, 2000.01))
            .unwrap();
        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Eth, MarketType::Futures), 2000.0001, 2000.01))
            .unwrap();

        // Large mispricing on BTC/Binance => valid.
        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Btc, MarketType::Spot), 30_000.0, 30_001.0))
            .unwrap();
        store
            .apply(&snapshot(BookKey::new(Venue::Binance, Asset::Btc, MarketType::Futures), 30_150.0, 30_151.0))
            .unwrap();

        engine.tick(&store, &config, 0.25);
        let opportunities = engine.get_opportunities();
        assert!(opportunities.iter().all(|o| o.valid));
    }
}
