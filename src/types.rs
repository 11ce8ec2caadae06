// =============================================================================
// Shared types used across the arbitrage engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// The three venues this engine ingests order-book data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Binance,
    Bybit,
    Okx,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "Binance"),
            Self::Bybit => write!(f, "Bybit"),
            Self::Okx => write!(f, "OKX"),
        }
    }
}

impl Venue {
    pub const ALL: [Venue; 3] = [Venue::Binance, Venue::Bybit, Venue::Okx];
}

/// The two assets tracked per venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Btc,
    Eth,
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Btc => write!(f, "BTC"),
            Self::Eth => write!(f, "ETH"),
        }
    }
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Btc, Asset::Eth];
}

/// Spot vs. derivative market type. "Futures" covers both dated futures and
/// perpetual/linear swaps — the dialect in §6 does not distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketType {
    Spot,
    Futures,
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spot => write!(f, "Spot"),
            Self::Futures => write!(f, "Futures"),
        }
    }
}

/// The common opportunity envelope C5/C6/C7 each produce, consumed uniformly
/// by the risk gate's `process_opportunity` adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub type_tag: String,
    pub primary_venue: Venue,
    pub secondary_venue: Option<Venue>,
    pub asset: Option<Asset>,
    pub metric: f64,
    pub metric_threshold: f64,
    pub expected_profit_usd: f64,
    pub confidence: f64,
    pub executable: bool,
    pub strategy_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_reference_naming() {
        assert_eq!(Venue::Okx.to_string(), "OKX");
        assert_eq!(Asset::Btc.to_string(), "BTC");
        assert_eq!(MarketType::Futures.to_string(), "Futures");
    }

    #[test]
    fn all_const_covers_every_variant() {
        assert_eq!(Venue::ALL.len(), 3);
        assert_eq!(Asset::ALL.len(), 2);
    }
}
