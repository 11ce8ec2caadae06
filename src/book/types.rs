use serde::{Deserialize, Serialize};

use crate::types::{Asset, MarketType, Venue};

/// Identifies one of the fixed set of live order books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookKey {
    pub venue: Venue,
    pub asset: Asset,
    pub market: MarketType,
}

impl BookKey {
    pub const fn new(venue: Venue, asset: Asset, market: MarketType) -> Self {
        Self {
            venue,
            asset,
            market,
        }
    }

    /// The 12 live keys in the reference deployment: 3 venues x 2 assets x
    /// {spot, futures}.
    pub fn all() -> Vec<BookKey> {
        let mut keys = Vec::with_capacity(12);
        for venue in Venue::ALL {
            for asset in Asset::ALL {
                keys.push(BookKey::new(venue, asset, MarketType::Spot));
                keys.push(BookKey::new(venue, asset, MarketType::Futures));
            }
        }
        keys
    }
}

impl std::fmt::Display for BookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.venue, self.asset, self.market)
    }
}

/// A single price/quantity level. `quantity == 0.0` means "level removed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Whether a `BookUpdate` replaces a book's contents or patches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    Snapshot,
    Delta,
}

/// The canonical, venue-agnostic update record every dialect parser produces.
/// Analyzers and the book store never see venue-specific JSON — only this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookUpdate {
    pub key: BookKey,
    pub kind: UpdateKind,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub seq: Option<u64>,
    pub event_ts: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_keys_has_twelve_entries() {
        assert_eq!(BookKey::all().len(), 12);
    }

    #[test]
    fn display_matches_original_key_format() {
        let key = BookKey::new(Venue::Binance, Asset::Btc, MarketType::Futures);
        assert_eq!(key.to_string(), "Binance_BTC_Futures");
    }
}
