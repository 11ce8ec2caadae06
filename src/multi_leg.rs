// =============================================================================
// C7 — multi-leg strategy engine
// =============================================================================
//
// Holds the latest `RealMarketData` per (venue, asset) and generates
// multi-leg strategy candidates from it: calendar spreads, a synthetic
// replication trade, and butterfly spreads. The dated-future expiry string
// and the calendar/synthetic legs' perpetual quantity and futures leg price
// are fixed literal constants of the reference deployment, not independently
// configurable — these generators are deterministic functions of the
// current market snapshot.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::Asset;
use crate::types::Opportunity;
use crate::types::Venue;

const DATED_FUTURE_EXPIRY: &str = "2025-12-25";
const PERPETUAL_LEG_QTY: f64 = 0.050;
const TAU_YEARS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegInstrumentType {
    Spot,
    Perpetual,
    Future,
    CallOption,
    Lending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageLeg {
    pub venue: Venue,
    pub instrument: String,
    pub action: LegAction,
    pub quantity: f64,
    pub price: f64,
    pub expiry: String,
    pub instrument_type: LegInstrumentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    CalendarSpread,
    SyntheticReplication,
    Butterfly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLegStrategy {
    pub strategy_type: StrategyType,
    pub legs: Vec<ArbitrageLeg>,
    pub expected_profit: f64,
    pub roi_percent: f64,
    pub risk_score: f64,
    pub confidence: f64,
}

impl MultiLegStrategy {
    /// `metric`/`metric_threshold` are left at 0 — position sizing only
    /// consults `expected_profit_usd` and `confidence` for a multi-leg
    /// candidate, per §4.8's admission gate.
    pub fn to_opportunity(&self) -> Option<Opportunity> {
        let first_leg = self.legs.first()?;
        let type_tag = match self.strategy_type {
            StrategyType::CalendarSpread => "calendar_spread",
            StrategyType::SyntheticReplication => "synthetic_replication",
            StrategyType::Butterfly => "butterfly",
        };
        Some(Opportunity {
            type_tag: type_tag.to_string(),
            primary_venue: first_leg.venue,
            secondary_venue: None,
            asset: None,
            metric: self.roi_percent,
            metric_threshold: 0.0,
            expected_profit_usd: self.expected_profit,
            confidence: self.confidence,
            executable: self.expected_profit > 0.0,
            strategy_text: format!("{:?} ({} legs)", self.strategy_type, self.legs.len()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct RealMarketData {
    spot: f64,
    futures: f64,
    basis_bps: f64,
    implied_volatility: f64,
}

fn implied_volatility_from_basis(basis_bps: f64, tau_years: f64) -> f64 {
    let pct = (basis_bps.abs() / 10_000.0 / tau_years.sqrt()) * 100.0;
    pct.clamp(15.0, 150.0)
}

/// `intrinsic + spot * (vol/100) * sqrt(tau) * 0.4 * decay(moneyness)`, with
/// `decay(m) = exp(-|m-1|*5)` applied only when `|m-1| > 0.05`.
fn estimate_call_premium(spot: f64, strike: f64, vol_pct: f64, tau_years: f64) -> f64 {
    let moneyness = strike / spot;
    let vol_sqrt_t = (vol_pct / 100.0) * tau_years.sqrt();
    let intrinsic = (spot - strike).max(0.0);
    let time_value = spot * vol_sqrt_t * 0.4;
    let decay = if (moneyness - 1.0).abs() > 0.05 {
        (-(moneyness - 1.0).abs() * 5.0).exp()
    } else {
        1.0
    };
    intrinsic + time_value * decay
}

pub struct MultiLegEngine {
    market_data: RwLock<HashMap<(Venue, Asset), RealMarketData>>,
}

impl MultiLegEngine {
    pub fn new() -> Self {
        Self {
            market_data: RwLock::new(HashMap::new()),
        }
    }

    pub fn update_market_data(&self, venue: Venue, asset: Asset, spot: f64, futures: f64) {
        if spot <= 0.0 || futures <= 0.0 {
            return;
        }
        let basis_bps = (futures - spot) / spot * 10_000.0;
        let data = RealMarketData {
            spot,
            futures,
            basis_bps,
            implied_volatility: implied_volatility_from_basis(basis_bps, TAU_YEARS),
        };
        self.market_data.write().insert((venue, asset), data);
    }

    fn calendar_spreads(&self) -> Vec<MultiLegStrategy> {
        let market_data = self.market_data.read();
        let mut out = Vec::new();
        for (&(venue, asset), data) in market_data.iter() {
            let spread = (data.futures - data.spot).abs();
            if spread < 1.0 {
                continue;
            }
            let legs = vec![
                ArbitrageLeg {
                    venue,
                    instrument: format!("{asset}USDT-PERP"),
                    action: LegAction::Buy,
                    quantity: PERPETUAL_LEG_QTY,
                    price: data.futures,
                    expiry: "PERPETUAL".to_string(),
                    instrument_type: LegInstrumentType::Perpetual,
                },
                ArbitrageLeg {
                    venue,
                    instrument: format!("{asset}USDT-Q325"),
                    action: LegAction::Sell,
                    quantity: PERPETUAL_LEG_QTY,
                    price: data.spot * 1.02,
                    expiry: DATED_FUTURE_EXPIRY.to_string(),
                    instrument_type: LegInstrumentType::Future,
                },
            ];
            out.push(MultiLegStrategy {
                strategy_type: StrategyType::CalendarSpread,
                legs,
                expected_profit: spread * 0.5,
                roi_percent: spread / data.spot * 100.0,
                risk_score: 0.40,
                confidence: 0.80,
            });
        }
        out
    }

    fn synthetic_replication(&self) -> Vec<MultiLegStrategy> {
        let market_data = self.market_data.read();
        let mut out = Vec::new();
        for (&(venue, asset), data) in market_data.iter() {
            let profit = -1.2 * (data.futures - data.spot);
            let legs = vec![
                ArbitrageLeg {
                    venue,
                    instrument: format!("{asset}USDT"),
                    action: LegAction::Buy,
                    quantity: 1.0,
                    price: data.spot,
                    expiry: String::new(),
                    instrument_type: LegInstrumentType::Spot,
                },
                ArbitrageLeg {
                    venue,
                    instrument: format!("{asset}USDT-PERP"),
                    action: LegAction::Sell,
                    quantity: 1.0,
                    price: data.spot,
                    expiry: "PERPETUAL".to_string(),
                    instrument_type: LegInstrumentType::Spot,
                },
                ArbitrageLeg {
                    venue,
                    instrument: "USDT-LENDING".to_string(),
                    action: LegAction::Sell,
                    quantity: 1.0,
                    price: data.spot,
                    expiry: String::new(),
                    instrument_type: LegInstrumentType::Lending,
                },
            ];
            out.push(MultiLegStrategy {
                strategy_type: StrategyType::SyntheticReplication,
                legs,
                expected_profit: profit,
                roi_percent: profit / data.spot * 100.0,
                risk_score: 0.50,
                confidence: 0.75,
            });
        }
        out
    }

    fn butterflies(&self) -> Vec<MultiLegStrategy> {
        let market_data = self.market_data.read();
        let mut out = Vec::new();
        for (&(venue, asset), data) in market_data.iter() {
            let spot = data.spot;
            let atm = spot;
            let low = spot * 0.95;
            let up = spot * 1.05;
            let vol = data.implied_volatility;

            let p_low = estimate_call_premium(spot, low, vol, TAU_YEARS);
            let p_atm = estimate_call_premium(spot, atm, vol, TAU_YEARS);
            let p_up = estimate_call_premium(spot, up, vol, TAU_YEARS);
            let net = p_low - 2.0 * p_atm + p_up;
            let max_profit = (up - atm) - net.abs();

            if max_profit <= 10.0 || net.abs() <= 5.0 {
                continue;
            }

            let leg = |action, strike: f64, price: f64, qty: f64| ArbitrageLeg {
                venue,
                instrument: format!("{asset}-CALL-{}", strike as i64),
                action,
                quantity: qty,
                price,
                expiry: DATED_FUTURE_EXPIRY.to_string(),
                instrument_type: LegInstrumentType::CallOption,
            };
            let legs = vec![
                leg(LegAction::Buy, low, p_low, 1.0),
                leg(LegAction::Sell, atm, p_atm, 2.0),
                leg(LegAction::Buy, up, p_up, 1.0),
            ];

            out.push(MultiLegStrategy {
                strategy_type: StrategyType::Butterfly,
                legs,
                expected_profit: max_profit,
                roi_percent: max_profit / (atm * 0.1) * 100.0,
                risk_score: 0.30,
                confidence: (vol / 50.0).min(0.80),
            });
        }
        out
    }

    /// All three generators concatenated, sorted by `expected_profit` desc.
    pub fn scan_all(&self) -> Vec<MultiLegStrategy> {
        let mut out = self.calendar_spreads();
        out.extend(self.synthetic_replication());
        out.extend(self.butterflies());
        out.sort_by(|a, b| b.expected_profit.partial_cmp(&a.expected_profit).unwrap());
        out
    }
}

impl Default for MultiLegEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_vol_is_clamped() {
        assert_eq!(implied_volatility_from_basis(0.0, TAU_YEARS), 15.0);
        assert!(implied_volatility_from_basis(100_000.0, TAU_YEARS) <= 150.0);
    }

    #[test]
    fn calendar_spread_requires_minimum_basis() {
        let engine = MultiLegEngine::new();
        engine.update_market_data(Venue::Binance, Asset::Btc, 30_000.0, 30_000.5);
        assert!(engine.calendar_spreads().is_empty());
    }

    #[test]
    fn calendar_spread_emitted_above_threshold() {
        let engine = MultiLegEngine::new();
        engine.update_market_data(Venue::Binance, Asset::Btc, 30_000.0, 30_150.0);
        let strategies = engine.calendar_spreads();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].legs.len(), 2);
        assert!((strategies[0].expected_profit - 75.0).abs() < 1e-9);
    }

    #[test]
    fn synthetic_replication_always_present_once_data_exists() {
        let engine = MultiLegEngine::new();
        engine.update_market_data(Venue::Okx, Asset::Eth, 2000.0, 2010.0);
        let strategies = engine.synthetic_replication();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].legs.len(), 3);
    }

    #[test]
    fn butterfly_requires_both_thresholds() {
        let engine = MultiLegEngine::new();
        engine.update_market_data(Venue::Binance, Asset::Btc, 30_000.0, 30_150.0);
        // Just exercise the generator — whether it emits depends on the
        // computed premia, which is asserted indirectly via the filter logic.
        let strategies = engine.butterflies();
        for s in &strategies {
            assert!(s.expected_profit > 10.0);
        }
    }

    #[test]
    fn scan_all_sorts_by_expected_profit_descending() {
        let engine = MultiLegEngine::new();
        engine.update_market_data(Venue::Binance, Asset::Btc, 30_000.0, 30_150.0);
        engine.update_market_data(Venue::Bybit, Asset::Eth, 2_000.0, 2_005.0);
        let strategies = engine.scan_all();
        for window in strategies.windows(2) {
            assert!(window[0].expected_profit >= window[1].expected_profit);
        }
    }
}
