// =============================================================================
// Engine configuration — the concrete realization of the abstract
// configuration object, with every tunable this engine exposes.
// =============================================================================
//
// Every field carries a serde default so that a partially-specified JSON
// config still deserializes (matching the runtime-config idiom elsewhere in
// this codebase). Unlike that sibling config, this one is never persisted to
// disk: the engine has no persisted state.
// =============================================================================

use serde::{Deserialize, Serialize};

/// τ, the fixed time-to-expiry (in years) used by the synthetic pricing
/// engine's cost-of-carry calculation. Hardcoded per the reference
/// deployment; see DESIGN.md for why this isn't derived from instrument
/// metadata.
pub const DEFAULT_TAU_YEARS: f64 = 0.25;

/// Soft freshness horizon: a book older than this is stale and excluded
/// from every analyzer's inputs.
pub const FRESHNESS_WINDOW_SECS: i64 = 30;

fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_max_risk_per_trade() -> f64 {
    0.01
}
fn default_max_total_exposure() -> f64 {
    0.20
}
fn default_max_single_position() -> f64 {
    0.05
}
fn default_stop_loss_pct() -> f64 {
    0.02
}
fn default_take_profit_pct() -> f64 {
    0.05
}
fn default_max_daily_loss() -> f64 {
    0.05
}
fn default_min_trade_size() -> f64 {
    0.001
}
fn default_max_leverage() -> f64 {
    3.0
}
fn default_min_profit_threshold() -> f64 {
    0.0005
}
fn default_min_confidence() -> f64 {
    0.7
}
fn default_min_mispricing_pct() -> f64 {
    0.01
}
fn default_max_mispricing_pct() -> f64 {
    5.0
}
fn default_funding_rate() -> f64 {
    1e-4
}
fn default_risk_free_rate() -> f64 {
    0.05
}
fn default_calculation_interval_ms() -> u64 {
    1000
}
fn default_history_window_vol() -> usize {
    30
}
fn default_history_window_ratio() -> usize {
    20
}
fn default_min_vol_spread_bps() -> f64 {
    20.0
}
fn default_max_vol_spread_bps() -> f64 {
    500.0
}
fn default_min_ratio_spread_pct() -> f64 {
    0.01
}
fn default_max_ratio_spread_pct() -> f64 {
    2.0
}
fn default_freshness_window_s() -> i64 {
    FRESHNESS_WINDOW_SECS
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_max_risk_per_trade")]
    pub max_risk_per_trade: f64,
    #[serde(default = "default_max_total_exposure")]
    pub max_total_exposure: f64,
    #[serde(default = "default_max_single_position")]
    pub max_single_position: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
    #[serde(default = "default_min_trade_size")]
    pub min_trade_size: f64,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: f64,
    #[serde(default = "default_min_profit_threshold")]
    pub min_profit_threshold: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_min_mispricing_pct")]
    pub min_mispricing_pct: f64,
    #[serde(default = "default_max_mispricing_pct")]
    pub max_mispricing_pct: f64,
    #[serde(default = "default_funding_rate")]
    pub default_funding_rate: f64,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_calculation_interval_ms")]
    pub calculation_interval_ms: u64,

    #[serde(default = "default_history_window_vol")]
    pub history_window_vol: usize,
    #[serde(default = "default_history_window_ratio")]
    pub history_window_ratio: usize,
    #[serde(default = "default_min_vol_spread_bps")]
    pub min_vol_spread_bps: f64,
    #[serde(default = "default_max_vol_spread_bps")]
    pub max_vol_spread_bps: f64,
    #[serde(default = "default_min_ratio_spread_pct")]
    pub min_ratio_spread_pct: f64,
    #[serde(default = "default_max_ratio_spread_pct")]
    pub max_ratio_spread_pct: f64,

    #[serde(default = "default_freshness_window_s")]
    pub freshness_window_s: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            max_risk_per_trade: default_max_risk_per_trade(),
            max_total_exposure: default_max_total_exposure(),
            max_single_position: default_max_single_position(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_daily_loss: default_max_daily_loss(),
            min_trade_size: default_min_trade_size(),
            max_leverage: default_max_leverage(),
            min_profit_threshold: default_min_profit_threshold(),
            min_confidence: default_min_confidence(),
            min_mispricing_pct: default_min_mispricing_pct(),
            max_mispricing_pct: default_max_mispricing_pct(),
            default_funding_rate: default_funding_rate(),
            risk_free_rate: default_risk_free_rate(),
            calculation_interval_ms: default_calculation_interval_ms(),
            history_window_vol: default_history_window_vol(),
            history_window_ratio: default_history_window_ratio(),
            min_vol_spread_bps: default_min_vol_spread_bps(),
            max_vol_spread_bps: default_max_vol_spread_bps(),
            min_ratio_spread_pct: default_min_ratio_spread_pct(),
            max_ratio_spread_pct: default_max_ratio_spread_pct(),
            freshness_window_s: default_freshness_window_s(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.initial_capital, 10_000.0);
        assert_eq!(cfg.max_risk_per_trade, 0.01);
        assert_eq!(cfg.max_total_exposure, 0.20);
        assert_eq!(cfg.max_single_position, 0.05);
        assert_eq!(cfg.stop_loss_pct, 0.02);
        assert_eq!(cfg.take_profit_pct, 0.05);
        assert_eq!(cfg.max_daily_loss, 0.05);
        assert_eq!(cfg.min_trade_size, 0.001);
        assert_eq!(cfg.max_leverage, 3.0);
        assert_eq!(cfg.min_profit_threshold, 0.0005);
        assert_eq!(cfg.min_confidence, 0.7);
        assert_eq!(cfg.min_mispricing_pct, 0.01);
        assert_eq!(cfg.max_mispricing_pct, 5.0);
        assert_eq!(cfg.default_funding_rate, 1e-4);
        assert_eq!(cfg.risk_free_rate, 0.05);
        assert_eq!(cfg.calculation_interval_ms, 1000);
        assert_eq!(cfg.history_window_vol, 30);
        assert_eq!(cfg.history_window_ratio, 20);
        assert_eq!(cfg.min_vol_spread_bps, 20.0);
        assert_eq!(cfg.max_vol_spread_bps, 500.0);
        assert_eq!(cfg.min_ratio_spread_pct, 0.01);
        assert_eq!(cfg.max_ratio_spread_pct, 2.0);
        assert_eq!(cfg.freshness_window_s, 30);
    }

    #[test]
    fn deserialize_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.initial_capital, 10_000.0);
        assert_eq!(cfg.max_leverage, 3.0);
    }

    #[test]
    fn deserialize_partial_json_fills_defaults() {
        let json = r#"{ "initial_capital": 50000.0, "max_risk_per_trade": 0.02 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.initial_capital, 50_000.0);
        assert_eq!(cfg.max_risk_per_trade, 0.02);
        assert_eq!(cfg.min_confidence, 0.7);
    }
}
