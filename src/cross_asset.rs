// =============================================================================
// C6 — cross-asset (BTC/ETH ratio) analyzer
// =============================================================================
//
// Tracks each venue's current BTC and ETH price and, whenever both are
// present, the BTC/ETH ratio. Emits two families of opportunity: a
// cross-exchange ratio spread (two venues' ratios have drifted apart) and an
// intra-venue mean-reversion signal (a venue's current ratio has drifted
// from its own EWMA fair value).
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{Opportunity, Venue};

const EWMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
struct RatioPoint {
    ratio: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CurrentPrices {
    btc: Option<f64>,
    eth: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossAssetOpportunity {
    pub kind: CrossAssetKind,
    pub primary_venue: Venue,
    pub secondary_venue: Option<Venue>,
    pub metric: f64,
    pub strategy: String,
    pub expected_profit: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossAssetKind {
    CrossExchangeSpread,
    IntraVenueMeanReversion,
}

impl CrossAssetOpportunity {
    pub fn to_opportunity(&self, min_ratio_spread_pct: f64) -> Opportunity {
        let type_tag = match self.kind {
            CrossAssetKind::CrossExchangeSpread => "cross_exchange_ratio_spread",
            CrossAssetKind::IntraVenueMeanReversion => "intra_venue_mean_reversion",
        };
        Opportunity {
            type_tag: type_tag.to_string(),
            primary_venue: self.primary_venue,
            secondary_venue: self.secondary_venue,
            asset: None,
            metric: self.metric,
            metric_threshold: min_ratio_spread_pct,
            expected_profit_usd: self.expected_profit,
            confidence: self.confidence,
            executable: self.metric >= min_ratio_spread_pct,
            strategy_text: self.strategy.clone(),
        }
    }
}

/// Exponentially-weighted ratio fair value, weights `alpha^(n-1-i)`.
/// Requires `history.len() >= 2`.
fn ewma_fair_value(history: &[RatioPoint]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let n = history.len();
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (i, point) in history.iter().enumerate() {
        let weight = EWMA_ALPHA.powi((n - 1 - i) as i32);
        weighted_sum += point.ratio * weight;
        weight_sum += weight;
    }
    Some(weighted_sum / weight_sum)
}

pub struct CrossAssetAnalyzer {
    prices: RwLock<HashMap<Venue, CurrentPrices>>,
    ratio_history: RwLock<HashMap<Venue, Vec<RatioPoint>>>,
    window: usize,
    min_ratio_spread_pct: f64,
    max_ratio_spread_pct: f64,
}

impl CrossAssetAnalyzer {
    pub fn new(window: usize, min_ratio_spread_pct: f64, max_ratio_spread_pct: f64) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            ratio_history: RwLock::new(HashMap::new()),
            window,
            min_ratio_spread_pct,
            max_ratio_spread_pct,
        }
    }

    pub fn update_btc_price(&self, venue: Venue, price: f64) {
        self.update_price(venue, price, true);
    }

    pub fn update_eth_price(&self, venue: Venue, price: f64) {
        self.update_price(venue, price, false);
    }

    fn update_price(&self, venue: Venue, price: f64, is_btc: bool) {
        if price <= 0.0 {
            return;
        }
        let mut prices = self.prices.write();
        let entry = prices.entry(venue).or_default();
        if is_btc {
            entry.btc = Some(price);
        } else {
            entry.eth = Some(price);
        }
        let (btc, eth) = (entry.btc, entry.eth);
        drop(prices);

        if let (Some(btc), Some(eth)) = (btc, eth) {
            if eth > 0.0 {
                let ratio = btc / eth;
                let mut history = self.ratio_history.write();
                let series = history.entry(venue).or_default();
                series.push(RatioPoint { ratio });
                if series.len() > self.window {
                    series.remove(0);
                }
            }
        }
    }

    fn current_ratio(&self, venue: Venue) -> Option<f64> {
        self.prices.read().get(&venue).and_then(|p| match (p.btc, p.eth) {
            (Some(btc), Some(eth)) if eth > 0.0 => Some(btc / eth),
            _ => None,
        })
    }

    fn cross_exchange_opportunities(&self) -> Vec<CrossAssetOpportunity> {
        let prices = self.prices.read();
        let ratios: Vec<(Venue, f64, f64, f64)> = Venue::ALL
            .into_iter()
            .filter_map(|venue| {
                let p = prices.get(&venue)?;
                let (btc, eth) = (p.btc?, p.eth?);
                if eth <= 0.0 {
                    return None;
                }
                Some((venue, btc, eth, btc / eth))
            })
            .collect();
        drop(prices);

        if ratios.len() < 2 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for i in 0..ratios.len() {
            for j in (i + 1)..ratios.len() {
                let (v1, btc1, _eth1, r1) = ratios[i];
                let (v2, btc2, _eth2, r2) = ratios[j];
                let spread_pct = (r1 - r2).abs() / r2 * 100.0;
                if spread_pct < self.min_ratio_spread_pct || spread_pct > self.max_ratio_spread_pct {
                    continue;
                }
                let (primary, secondary, primary_btc, secondary_btc) =
                    if r1 < r2 { (v1, v2, btc1, btc2) } else { (v2, v1, btc2, btc1) };
                let strategy = format!(
                    "Buy BTC/{primary} + Sell ETH/{primary} | Sell BTC/{secondary} + Buy ETH/{secondary}"
                );
                out.push(CrossAssetOpportunity {
                    kind: CrossAssetKind::CrossExchangeSpread,
                    primary_venue: primary,
                    secondary_venue: Some(secondary),
                    metric: spread_pct,
                    strategy,
                    expected_profit: spread_pct * primary_btc.min(secondary_btc) * 0.01,
                    confidence: (0.5 + spread_pct / 0.2).min(0.8),
                });
            }
        }
        out
    }

    fn mean_reversion_opportunities(&self) -> Vec<CrossAssetOpportunity> {
        let history = self.ratio_history.read();
        let mut out = Vec::new();

        for &venue in Venue::ALL.iter() {
            let series = match history.get(&venue) {
                Some(s) if s.len() >= 2 => s,
                _ => continue,
            };
            let current = series.last().unwrap().ratio;
            let fair = match ewma_fair_value(series) {
                Some(f) if f > 0.0 => f,
                _ => continue,
            };
            let deviation_pct = (current - fair).abs() / fair * 100.0;
            if deviation_pct < self.min_ratio_spread_pct {
                continue;
            }
            let btc_price = match self.prices.read().get(&venue).and_then(|p| p.btc) {
                Some(price) => price,
                None => continue,
            };
            let strategy = if current > fair {
                format!("{venue} ratio overextended: short BTC / long ETH")
            } else {
                format!("{venue} ratio oversold: long BTC / short ETH")
            };
            out.push(CrossAssetOpportunity {
                kind: CrossAssetKind::IntraVenueMeanReversion,
                primary_venue: venue,
                secondary_venue: None,
                metric: deviation_pct,
                strategy,
                expected_profit: deviation_pct * btc_price * 0.005,
                confidence: (0.4 + deviation_pct / 0.1).min(0.85),
            });
        }
        out
    }

    /// Both opportunity families, sorted by `metric` descending.
    pub fn scan(&self) -> Vec<CrossAssetOpportunity> {
        let mut out = self.cross_exchange_opportunities();
        out.extend(self.mean_reversion_opportunities());
        out.sort_by(|a, b| b.metric.partial_cmp(&a.metric).unwrap());
        out
    }
}
