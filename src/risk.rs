// =============================================================================
// Risk Manager (C8) — position sizing and trade admission
// =============================================================================
//
// Accepts trade signals derived from C4/C5/C6/C7's opportunities, sizes them
// under capital/exposure/confidence constraints, and tracks positions and
// aggregate P&L. Unlike the circuit-breaker engine this module replaces, the
// gate here isn't a handful of independent breakers — it's a single ordered
// sequence of checks `evaluate_opportunity` runs top to bottom, matching the
// reference deployment's admission order exactly.
//
// `RwLock<Inner>` + a manual `Debug` impl is kept from this codebase's
// existing risk engine; the breaker-specific fields are gone, replaced by
// the position/PnL bookkeeping this component actually needs.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::types::Opportunity;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub strategy_id: String,
    pub venue: String,
    pub instrument: String,
    pub side: TradeAction,
    pub entry_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub opened_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Internal signal shape `evaluate_opportunity` consumes. `process_opportunity`
/// adapts the common §3 `Opportunity` envelope into this.
#[derive(Debug, Clone)]
pub struct TradeSignal {
    pub instrument: String,
    pub price: f64,
    pub expected_profit: f64,
    pub confidence: f64,
    pub strategy_type: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_capital: f64,
    pub available_capital: f64,
    pub total_exposure: f64,
    pub daily_pnl: f64,
    pub max_drawdown: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub win_rate: f64,
    pub avg_profit_per_trade: f64,
}

struct Inner {
    positions: HashMap<String, Position>,
    daily_pnl: f64,
    max_drawdown: f64,
    peak_equity: f64,
    total_trades: u64,
    winning_trades: u64,
}

impl Inner {
    fn new(capital: f64) -> Self {
        Self {
            positions: HashMap::new(),
            daily_pnl: 0.0,
            max_drawdown: 0.0,
            peak_equity: capital,
            total_trades: 0,
            winning_trades: 0,
        }
    }
}

pub struct RiskManager {
    state: RwLock<Inner>,
    config: EngineConfig,
    current_capital: RwLock<f64>,
    emergency_stop: AtomicBool,
}

impl RiskManager {
    pub fn new(config: EngineConfig) -> Self {
        let capital = config.initial_capital;
        Self {
            state: RwLock::new(Inner::new(capital)),
            current_capital: RwLock::new(capital),
            config,
            emergency_stop: AtomicBool::new(false),
        }
    }

    pub fn set_current_capital(&self, capital: f64) {
        *self.current_capital.write() = capital;
    }

    pub fn is_emergency_stop_triggered(&self) -> bool {
        self.emergency_stop.load(Ordering::Relaxed)
    }

    pub fn trigger_emergency_stop(&self) {
        warn!("emergency stop triggered");
        self.emergency_stop.store(true, Ordering::Relaxed);
    }

    pub fn reset_emergency_stop(&self) {
        self.emergency_stop.store(false, Ordering::Relaxed);
    }

    fn stop_price(&self, price: f64) -> f64 {
        price * (1.0 - self.config.stop_loss_pct)
    }

    /// `risk_amount / |price - stop_price|`, capped by `max_single_position *
    /// capital / price`, floored by `min_trade_size`.
    fn calculate_position_size(&self, price: f64, capital: f64) -> f64 {
        let risk_amount = capital * self.config.max_risk_per_trade;
        let risk_per_unit = (price - self.stop_price(price)).abs();
        let size = if risk_per_unit > 0.0 {
            risk_amount / risk_per_unit
        } else {
            self.config.min_trade_size
        };
        let cap = self.config.max_single_position * capital / price;
        size.min(cap).max(self.config.min_trade_size)
    }

    fn metrics_locked(&self, state: &Inner, capital: f64) -> RiskMetrics {
        let total_exposure: f64 = state
            .positions
            .values()
            .filter(|p| p.active)
            .map(|p| (p.quantity * p.current_price).abs())
            .sum();
        let total_unrealized: f64 = state.positions.values().filter(|p| p.active).map(|p| p.unrealized_pnl).sum();
        let available_capital = capital + total_unrealized - total_exposure;
        let win_rate = if state.total_trades > 0 {
            state.winning_trades as f64 / state.total_trades as f64
        } else {
            0.0
        };
        let avg_profit_per_trade = if state.total_trades > 0 {
            state.daily_pnl / state.total_trades as f64
        } else {
            0.0
        };

        RiskMetrics {
            total_capital: capital,
            available_capital,
            total_exposure,
            daily_pnl: state.daily_pnl,
            max_drawdown: state.max_drawdown,
            total_trades: state.total_trades,
            winning_trades: state.winning_trades,
            win_rate,
            avg_profit_per_trade,
        }
    }

    pub fn get_current_metrics(&self) -> RiskMetrics {
        let capital = *self.current_capital.read();
        let state = self.state.read();
        self.metrics_locked(&state, capital)
    }

    /// Admission gate, in the exact order the reference deployment runs it:
    /// emergency stop, profit/confidence floors, daily-loss breaker, size the
    /// trade, validate against trade limits, then exposure headroom.
    pub fn evaluate_opportunity(&self, signal: &TradeSignal) -> (bool, f64, Option<String>) {
        if self.is_emergency_stop_triggered() {
            return (false, 0.0, Some("emergency stop active".to_string()));
        }
        if signal.expected_profit < self.config.min_profit_threshold {
            return (false, 0.0, Some("expected profit below threshold".to_string()));
        }
        if signal.confidence < self.config.min_confidence {
            return (false, 0.0, Some("confidence below threshold".to_string()));
        }

        let capital = *self.current_capital.read();
        let state = self.state.read();
        if state.daily_pnl < -self.config.max_daily_loss * capital {
            drop(state);
            return (false, 0.0, Some("daily loss limit breached".to_string()));
        }

        let metrics = self.metrics_locked(&state, capital);
        drop(state);

        let mut size = self.calculate_position_size(signal.price, capital);
        let trade_value = size * signal.price;

        if size < self.config.min_trade_size {
            return (false, 0.0, Some("sized trade below minimum trade size".to_string()));
        }
        if trade_value > metrics.available_capital {
            return (false, 0.0, Some("trade value exceeds available capital".to_string()));
        }
        if trade_value > self.config.max_single_position * capital {
            return (false, 0.0, Some("trade value exceeds max single position".to_string()));
        }

        let new_exposure = metrics.total_exposure + trade_value;
        let exposure_cap = self.config.max_total_exposure * capital;
        if new_exposure > exposure_cap {
            let headroom = exposure_cap - metrics.total_exposure;
            if headroom < self.config.min_trade_size * signal.price {
                return (false, 0.0, Some("no exposure headroom remaining".to_string()));
            }
            size = headroom / signal.price;
        }

        (true, size, None)
    }

    /// Adapts the common `Opportunity` envelope into a `TradeSignal` and
    /// calls `evaluate_opportunity`, so callers don't re-derive the sign
    /// convention (positive profit => buy the primary leg).
    pub fn process_opportunity(&self, opportunity: &Opportunity, mid_price: f64) -> (bool, f64, Option<String>) {
        let signal = TradeSignal {
            instrument: opportunity.type_tag.clone(),
            price: mid_price,
            expected_profit: opportunity.expected_profit_usd.abs(),
            confidence: opportunity.confidence,
            strategy_type: opportunity.type_tag.clone(),
        };
        self.evaluate_opportunity(&signal)
    }

    pub fn open_position(&self, signal: &TradeSignal, size: f64, venue: &str) -> String {
        let strategy_id = Uuid::new_v4().to_string();
        let side = if signal.expected_profit >= 0.0 { TradeAction::Buy } else { TradeAction::Sell };
        let position = Position {
            strategy_id: strategy_id.clone(),
            venue: venue.to_string(),
            instrument: signal.instrument.clone(),
            side,
            entry_price: signal.price,
            current_price: signal.price,
            quantity: size,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            opened_at: Utc::now(),
            active: true,
        };
        info!(strategy_id = %strategy_id, instrument = %signal.instrument, size, "position opened");
        self.state.write().positions.insert(strategy_id.clone(), position);
        strategy_id
    }

    /// Refreshes `current_price`/`unrealized_pnl` for every active position
    /// whose instrument appears in `price_by_instrument`.
    pub fn update_positions(&self, price_by_instrument: &HashMap<String, f64>) {
        let mut state = self.state.write();
        for position in state.positions.values_mut() {
            if !position.active {
                continue;
            }
            if let Some(&price) = price_by_instrument.get(&position.instrument) {
                position.current_price = price;
                position.unrealized_pnl = (price - position.entry_price) * position.quantity;
            }
        }
    }

    pub fn close_position(&self, strategy_id: &str, exit_price: f64) -> Option<f64> {
        let mut state = self.state.write();
        let position = state.positions.get_mut(strategy_id)?;
        if !position.active {
            return None;
        }
        let realized = (exit_price - position.entry_price) * position.quantity;
        position.current_price = exit_price;
        position.realized_pnl = realized;
        position.active = false;

        state.daily_pnl += realized;
        state.total_trades += 1;
        if realized > 0.0 {
            state.winning_trades += 1;
        }
        let capital = *self.current_capital.read();
        let equity = capital + state.daily_pnl;
        if equity > state.peak_equity {
            state.peak_equity = equity;
        }
        let drawdown = (state.peak_equity - equity) / state.peak_equity;
        if drawdown > state.max_drawdown {
            state.max_drawdown = drawdown;
        }

        info!(strategy_id = %strategy_id, realized, "position closed");
        Some(realized)
    }

    pub fn active_positions(&self) -> Vec<Position> {
        self.state.read().positions.values().filter(|p| p.active).cloned().collect()
    }
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("capital", &*self.current_capital.read())
            .field("emergency_stop", &self.is_emergency_stop_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RiskManager {
        RiskManager::new(EngineConfig::default())
    }

    fn good_signal() -> TradeSignal {
        TradeSignal {
            instrument: "BTCUSDT".to_string(),
            price: 30_000.0,
            expected_profit: 0.01,
            confidence: 0.9,
            strategy_type: "futures_vs_spot".to_string(),
        }
    }

    #[test]
    fn rejects_below_profit_threshold() {
        let manager = manager();
        let mut signal = good_signal();
        signal.expected_profit = 0.0;
        let (approved, _, reason) = manager.evaluate_opportunity(&signal);
        assert!(!approved);
        assert!(reason.is_some());
    }

    #[test]
    fn rejects_below_confidence_threshold() {
        let manager = manager();
        let mut signal = good_signal();
        signal.confidence = 0.1;
        let (approved, _, _) = manager.evaluate_opportunity(&signal);
        assert!(!approved);
    }

    #[test]
    fn rejects_when_emergency_stopped() {
        let manager = manager();
        manager.trigger_emergency_stop();
        let (approved, _, reason) = manager.evaluate_opportunity(&good_signal());
        assert!(!approved);
        assert_eq!(reason.unwrap(), "emergency stop active");
    }

    #[test]
    fn approved_size_respects_minimum_and_single_position_cap() {
        let manager = manager();
        let (approved, size, _) = manager.evaluate_opportunity(&good_signal());
        assert!(approved);
        assert!(size >= manager.config.min_trade_size);
        let cap = manager.config.max_single_position * manager.config.initial_capital / good_signal().price;
        assert!(size <= cap + 1e-9);
    }

    #[test]
    fn open_then_close_position_updates_daily_pnl() {
        let manager = manager();
        let signal = good_signal();
        let (approved, size, _) = manager.evaluate_opportunity(&signal);
        assert!(approved);
        let id = manager.open_position(&signal, size, "Binance");
        let realized = manager.close_position(&id, signal.price * 1.05).unwrap();
        assert!(realized > 0.0);
        let metrics = manager.get_current_metrics();
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.winning_trades, 1);
        assert!(metrics.daily_pnl > 0.0);
    }

    #[test]
    fn closing_losing_position_does_not_increment_winning_trades() {
        let manager = manager();
        let signal = good_signal();
        let (_, size, _) = manager.evaluate_opportunity(&signal);
        let id = manager.open_position(&signal, size, "Binance");
        manager.close_position(&id, signal.price * 0.95).unwrap();
        let metrics = manager.get_current_metrics();
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.winning_trades, 0);
    }

    #[test]
    fn daily_loss_breaker_rejects_further_trades() {
        let manager = manager();
        let signal = good_signal();
        let (_, size, _) = manager.evaluate_opportunity(&signal);
        let id = manager.open_position(&signal, size, "Binance");
        // Close at zero to realize the full position value as a loss, which
        // for this size/capital combination just exceeds max_daily_loss * capital.
        manager.close_position(&id, 0.0).unwrap();
        let (approved, _, reason) = manager.evaluate_opportunity(&good_signal());
        assert!(!approved);
        assert_eq!(reason.unwrap(), "daily loss limit breached");
    }

    #[test]
    fn process_opportunity_adapts_common_envelope() {
        let manager = manager();
        let opportunity = Opportunity {
            type_tag: "volatility_basis_deviation".to_string(),
            primary_venue: crate::types::Venue::Binance,
            secondary_venue: None,
            asset: Some(crate::types::Asset::Btc),
            metric: 25.0,
            metric_threshold: 20.0,
            expected_profit_usd: 5.0,
            confidence: 0.9,
            executable: true,
            strategy_text: "sell futures, buy spot".to_string(),
        };
        let (approved, size, _) = manager.process_opportunity(&opportunity, 30_000.0);
        assert!(approved);
        assert!(size > 0.0);
    }
}
