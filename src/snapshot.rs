// =============================================================================
// C3 — consistent point-in-time snapshot reader
// =============================================================================
//
// A thin read-only view over C1: every field of `BookSnapshot` is produced
// from `BookStore::read_book`'s single acquisition of the book store's read
// guard, so a caller never observes e.g. a fresh `best_bid` paired with a
// stale `age_seconds`. Missing sides never panic — they surface as `None`.
// =============================================================================

use crate::book::{BookKey, BookStore, PriceLevel};

/// A consistent, single-read view of one book.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub key: BookKey,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub mid: Option<f64>,
    pub age_seconds: f64,
    pub fresh: bool,
    pub valid: bool,
    pub top_bids: Vec<PriceLevel>,
    pub top_asks: Vec<PriceLevel>,
}

/// Read a consistent snapshot of `key`'s book, `depth` levels per side.
/// Returns `None` only if `key` isn't one of the store's fixed keys.
pub fn read_snapshot(store: &BookStore, key: BookKey, depth: usize) -> Option<BookSnapshot> {
    let reading = store.read_book(&key, depth)?;
    Some(BookSnapshot {
        key,
        best_bid: reading.best_bid,
        best_ask: reading.best_ask,
        mid: reading.mid,
        age_seconds: reading.age_seconds,
        fresh: reading.fresh,
        valid: reading.valid,
        top_bids: reading.top_bids,
        top_asks: reading.top_asks,
    })
}

/// Mid prices for every live key, for the analyzers that only need a price
/// series (C4/C5/C6).
pub fn all_mids(store: &BookStore) -> std::collections::HashMap<BookKey, f64> {
    store.mids_for_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookUpdate, UpdateKind};
    use crate::types::{Asset, MarketType, Venue};

    #[test]
    fn snapshot_reflects_current_book_state() {
        let store = BookStore::new();
        let key = BookKey::new(Venue::Okx, Asset::Eth, MarketType::Spot);
        store
            .apply(&BookUpdate {
                key,
                kind: UpdateKind::Snapshot,
                bids: vec![PriceLevel { price: 2000.0, quantity: 1.0 }],
                asks: vec![PriceLevel { price: 2001.0, quantity: 1.0 }],
                seq: None,
                event_ts: None,
            })
            .unwrap();

        let snap = read_snapshot(&store, key, 5).unwrap();
        assert_eq!(snap.best_bid, Some(2000.0));
        assert_eq!(snap.best_ask, Some(2001.0));
        assert_eq!(snap.mid, Some(2000.5));
        assert!(snap.fresh);
        assert!(snap.valid);
    }

    #[test]
    fn snapshot_of_empty_book_has_no_prices_but_does_not_panic() {
        let store = BookStore::new();
        let key = BookKey::new(Venue::Bybit, Asset::Btc, MarketType::Futures);
        let snap = read_snapshot(&store, key, 5).unwrap();
        assert_eq!(snap.best_bid, None);
        assert_eq!(snap.mid, None);
        assert!(!snap.valid);
    }
}
