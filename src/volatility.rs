// =============================================================================
// C5 — realized/implied volatility analyzer
// =============================================================================
//
// Maintains a rolling window of (spot, futures, basis_bps) observations per
// (venue, asset) and, once enough history has accumulated, derives a
// realized-volatility estimate and a basis-implied-volatility proxy.
//
// Note for anyone cross-referencing the reference deployment: its
// `basis_implied_volatility` field is wired directly to `abs(basis_bps)`
// rather than to its own (unused) `calculate_basis_implied_volatility`
// helper. That's a latent bug in the reference, not a design choice — this
// implementation always calls the real formula.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{Asset, Opportunity, Venue};

/// Minutes per year, used to annualize per-minute sampled variance.
const MINUTES_PER_YEAR: f64 = 525_600.0;

#[derive(Debug, Clone, Copy)]
struct MarketDataPoint {
    spot_price: f64,
    futures_price: f64,
    basis_bps: f64,
}

/// The computed indicator for one (venue, asset) key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolatilityIndicator {
    pub realized_vol: f64,
    pub basis_implied_vol_proxy: f64,
    pub vol_risk_premium: f64,
    pub confidence: f64,
}

/// An emitted basis-deviation opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityOpportunity {
    pub venue: Venue,
    pub asset: Asset,
    pub spot_price: f64,
    pub futures_price: f64,
    pub basis_bps: f64,
    pub realized_vol: f64,
    pub implied_vol_proxy: f64,
    pub strategy: String,
    pub expected_profit: f64,
    pub confidence: f64,
}

impl VolatilityOpportunity {
    pub fn to_opportunity(&self, min_vol_spread_bps: f64) -> Opportunity {
        Opportunity {
            type_tag: "volatility_basis_deviation".to_string(),
            primary_venue: self.venue,
            secondary_venue: None,
            asset: Some(self.asset),
            metric: self.basis_bps.abs(),
            metric_threshold: min_vol_spread_bps,
            expected_profit_usd: self.expected_profit,
            confidence: self.confidence,
            executable: self.basis_bps.abs() >= min_vol_spread_bps,
            strategy_text: self.strategy.clone(),
        }
    }
}

fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    variance.sqrt()
}

fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Annualized stdev of log spot returns, capped at 200%.
fn realized_volatility(history: &[MarketDataPoint]) -> f64 {
    let prices: Vec<f64> = history.iter().map(|p| p.spot_price).collect();
    let returns = log_returns(&prices);
    let vol = sample_stdev(&returns) * MINUTES_PER_YEAR.sqrt() * 100.0;
    vol.min(200.0)
}

/// The basis-implied-volatility proxy the reference deployment's own (dead)
/// helper computes, capped at 150%.
fn basis_implied_volatility(history: &[MarketDataPoint]) -> f64 {
    let basis: Vec<f64> = history.iter().map(|p| p.basis_bps).collect();
    let changes = diffs(&basis);
    let vol = sample_stdev(&changes) * MINUTES_PER_YEAR.sqrt() * 0.1;
    vol.min(150.0)
}

/// Computes the full indicator from an already-borrowed series. Both
/// `indicator()` and `scan()` call this under a single lock acquisition —
/// neither re-locks `history` while holding a guard over it.
fn indicator_from_series(series: &[MarketDataPoint]) -> Option<VolatilityIndicator> {
    if series.len() < 3 {
        return None;
    }
    let realized = realized_volatility(series);
    let implied = basis_implied_volatility(series);
    Some(VolatilityIndicator {
        realized_vol: realized,
        basis_implied_vol_proxy: implied,
        vol_risk_premium: implied - realized,
        confidence: (series.len() as f64 / 10.0).min(0.95),
    })
}

pub struct VolatilityAnalyzer {
    history: RwLock<HashMap<(Venue, Asset), Vec<MarketDataPoint>>>,
    window: usize,
    min_vol_spread_bps: f64,
    max_vol_spread_bps: f64,
}

impl VolatilityAnalyzer {
    pub fn new(window: usize, min_vol_spread_bps: f64, max_vol_spread_bps: f64) -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            window,
            min_vol_spread_bps,
            max_vol_spread_bps,
        }
    }

    pub fn update(&self, venue: Venue, asset: Asset, spot: f64, futures: f64) {
        if spot <= 0.0 || futures <= 0.0 {
            return;
        }
        let basis_bps = (futures - spot) / spot * 10_000.0;
        let mut history = self.history.write();
        let series = history.entry((venue, asset)).or_default();
        series.push(MarketDataPoint {
            spot_price: spot,
            futures_price: futures,
            basis_bps,
        });
        if series.len() > self.window {
            series.remove(0);
        }
    }

    /// `None` until at least 3 points have accumulated for the key.
    pub fn indicator(&self, venue: Venue, asset: Asset) -> Option<VolatilityIndicator> {
        let history = self.history.read();
        let series = history.get(&(venue, asset))?;
        indicator_from_series(series)
    }

    /// Opportunities for every key whose current `|basis_bps|` falls within
    /// `[min_vol_spread_bps, max_vol_spread_bps]`, sorted by `|basis_bps|` desc.
    pub fn scan(&self) -> Vec<VolatilityOpportunity> {
        let history = self.history.read();
        let mut out = Vec::new();

        for (&(venue, asset), series) in history.iter() {
            if series.len() < 3 {
                continue;
            }
            let latest = series.last().unwrap();
            let spread = latest.basis_bps.abs();
            if spread < self.min_vol_spread_bps || spread > self.max_vol_spread_bps {
                continue;
            }
            let indicator = match indicator_from_series(series) {
                Some(i) => i,
                None => continue,
            };
            let strategy = if latest.basis_bps > 0.0 {
                format!("Futures overpriced on {venue} {asset}: sell futures, buy spot")
            } else {
                format!("Futures underpriced on {venue} {asset}: buy futures, sell spot")
            };
            out.push(VolatilityOpportunity {
                venue,
                asset,
                spot_price: latest.spot_price,
                futures_price: latest.futures_price,
                basis_bps: latest.basis_bps,
                realized_vol: indicator.realized_vol,
                implied_vol_proxy: indicator.basis_implied_vol_proxy,
                strategy,
                expected_profit: spread * latest.spot_price * 0.00005,
                confidence: indicator.confidence,
            });
        }

        out.sort_by(|a, b| b.basis_bps.abs().partial_cmp(&a.basis_bps.abs()).unwrap());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_indicator_before_three_points() {
        let analyzer = VolatilityAnalyzer::new(30, 20.0, 500.0);
        analyzer.update(Venue::Binance, Asset::Btc, 30_000.0, 30_050.0);
        analyzer.update(Venue::Binance, Asset::Btc, 30_010.0, 30_060.0);
        assert!(analyzer.indicator(Venue::Binance, Asset::Btc).is_none());
    }

    #[test]
    fn vol_risk_premium_is_implied_minus_realized() {
        let analyzer = VolatilityAnalyzer::new(30, 20.0, 500.0);
        for (spot, fut) in [(30_000.0, 30_050.0), (30_100.0, 30_200.0), (29_950.0, 30_000.0), (30_200.0, 30_260.0)] {
            analyzer.update(Venue::Binance, Asset::Btc, spot, fut);
        }
        let indicator = analyzer.indicator(Venue::Binance, Asset::Btc).unwrap();
        assert!((indicator.vol_risk_premium - (indicator.basis_implied_vol_proxy - indicator.realized_vol)).abs() < 1e-9);
    }

    #[test]
    fn zero_or_negative_prices_are_ignored() {
        let analyzer = VolatilityAnalyzer::new(30, 20.0, 500.0);
        analyzer.update(Venue::Binance, Asset::Btc, 0.0, 30_050.0);
        analyzer.update(Venue::Binance, Asset::Btc, -1.0, 30_050.0);
        assert!(analyzer.indicator(Venue::Binance, Asset::Btc).is_none());
    }

    #[test]
    fn window_evicts_oldest() {
        let analyzer = VolatilityAnalyzer::new(3, 20.0, 500.0);
        for i in 0..5 {
            analyzer.update(Venue::Binance, Asset::Btc, 30_000.0 + i as f64, 30_050.0 + i as f64);
        }
        let history = analyzer.history.read();
        assert_eq!(history.get(&(Venue::Binance, Asset::Btc)).unwrap().len(), 3);
    }

    #[test]
    fn scan_respects_bps_bounds() {
        let analyzer = VolatilityAnalyzer::new(30, 20.0, 500.0);
        // Tiny basis, below min threshold.
        for (spot, fut) in [(30_000.0, 30_001.0), (30_000.0, 30_001.0), (30_000.0, 30_001.0)] {
            analyzer.update(Venue::Okx, Asset::Eth, spot, fut);
        }
        assert!(analyzer.scan().is_empty());
    }
}
