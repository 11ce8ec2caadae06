// =============================================================================
// C1 — the live order book registry
// =============================================================================
//
// A single `BookStore` owns all 12 fixed books behind one `RwLock`, mirroring
// the single global `book_mutex` the reference deployment used — except here
// the lock is per-registry, not a free-floating global, and it is a
// `parking_lot::RwLock` so readers (every analyzer's scan) don't block each
// other. Freshness and validity are computed on read, never corrected: a
// stale or crossed book is surfaced as such, not silently patched.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::side_book::SideBook;
use super::types::{BookKey, BookUpdate, PriceLevel, UpdateKind};
use crate::config::FRESHNESS_WINDOW_SECS;
use crate::error::EngineError;

/// One side-by-side bid/ask book plus the wall-clock time it was last
/// touched by any update (snapshot or delta).
#[derive(Debug, Clone)]
pub struct Book {
    pub bids: SideBook,
    pub asks: SideBook,
    pub last_update: Instant,
}

impl Book {
    fn new() -> Self {
        Self {
            bids: SideBook::new(),
            asks: SideBook::new(),
            last_update: Instant::now(),
        }
    }

    fn apply(&mut self, update: &BookUpdate) {
        if update.kind == UpdateKind::Snapshot {
            self.bids.clear();
            self.asks.clear();
        }
        for level in &update.bids {
            self.bids.apply_level(*level);
        }
        for level in &update.asks {
            self.asks.apply_level(*level);
        }
        self.last_update = Instant::now();
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.max_price()
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.min_price()
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn age(&self) -> Duration {
        self.last_update.elapsed()
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < Duration::from_secs(FRESHNESS_WINDOW_SECS as u64)
    }

    /// `best_bid < best_ask` and the spread is at most 1% of the mid.
    /// `None` (no reason) means valid; a missing side is reported as its
    /// own reason rather than treated as vacuously valid.
    pub fn validity_reason(&self) -> Option<&'static str> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => {
                if bid >= ask {
                    Some("crossed book: best_bid >= best_ask")
                } else {
                    let mid = (bid + ask) / 2.0;
                    let spread_pct = (ask - bid) / mid * 100.0;
                    if spread_pct > 1.0 {
                        Some("spread exceeds 1% of mid")
                    } else {
                        None
                    }
                }
            }
            _ => Some("missing bid or ask side"),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity_reason().is_none()
    }
}

/// A point-in-time read of one book's health, handed to analyzers so they
/// never have to re-derive freshness/validity themselves.
#[derive(Debug, Clone, Copy)]
pub struct BookHealth {
    pub fresh: bool,
    pub valid: bool,
}

/// Every field C3's snapshot reader needs, produced from a single
/// acquisition of the book store's read guard so the tuple can never tear
/// under a concurrent `apply`.
#[derive(Debug, Clone)]
pub struct BookReading {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub mid: Option<f64>,
    pub age_seconds: f64,
    pub fresh: bool,
    pub valid: bool,
    pub top_bids: Vec<PriceLevel>,
    pub top_asks: Vec<PriceLevel>,
}

/// The registry of all live books, keyed by `BookKey`.
#[derive(Debug)]
pub struct BookStore {
    books: RwLock<HashMap<BookKey, Book>>,
}

impl BookStore {
    /// Pre-populates all 12 fixed keys with empty books so every analyzer
    /// can assume a key lookup never misses for a key in `BookKey::all()`.
    pub fn new() -> Self {
        let mut books = HashMap::with_capacity(12);
        for key in BookKey::all() {
            books.insert(key, Book::new());
        }
        Self {
            books: RwLock::new(books),
        }
    }

    pub fn apply(&self, update: &BookUpdate) -> Result<(), EngineError> {
        let mut books = self.books.write();
        match books.get_mut(&update.key) {
            Some(book) => {
                book.apply(update);
                debug!(key = %update.key, kind = ?update.kind, "applied book update");
                Ok(())
            }
            None => {
                warn!(key = %update.key, "update for unknown book key");
                Err(EngineError::UnknownBookKey(update.key))
            }
        }
    }

    pub fn best_bid(&self, key: &BookKey) -> Option<f64> {
        self.books.read().get(key).and_then(Book::best_bid)
    }

    pub fn best_ask(&self, key: &BookKey) -> Option<f64> {
        self.books.read().get(key).and_then(Book::best_ask)
    }

    pub fn mid(&self, key: &BookKey) -> Option<f64> {
        self.books.read().get(key).and_then(Book::mid)
    }

    pub fn health(&self, key: &BookKey) -> Option<BookHealth> {
        self.books.read().get(key).map(|book| BookHealth {
            fresh: book.is_fresh(),
            valid: book.is_valid(),
        })
    }

    pub fn age_seconds(&self, key: &BookKey) -> Option<f64> {
        self.books.read().get(key).map(|book| book.age().as_secs_f64())
    }

    /// Every field of a `BookReading`, built from one acquisition of the
    /// read guard — mirrors the teacher's `OrderBookManager::get`, which
    /// locks once and clones the whole state out rather than re-locking per
    /// field.
    pub fn read_book(&self, key: &BookKey, depth: usize) -> Option<BookReading> {
        let books = self.books.read();
        let book = books.get(key)?;
        Some(BookReading {
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            mid: book.mid(),
            age_seconds: book.age().as_secs_f64(),
            fresh: book.is_fresh(),
            valid: book.is_valid(),
            top_bids: book.bids.top_desc(depth),
            top_asks: book.asks.top_asc(depth),
        })
    }

    /// Only a book's mid price, for callers (C5/C6) that just need a price
    /// series and don't care about depth.
    pub fn mids_for_all(&self) -> HashMap<BookKey, f64> {
        self.books
            .read()
            .iter()
            .filter_map(|(key, book)| book.mid().map(|mid| (*key, mid)))
            .collect()
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, MarketType, Venue};

    fn key() -> BookKey {
        BookKey::new(Venue::Binance, Asset::Btc, MarketType::Spot)
    }

    fn update(kind: UpdateKind, bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>) -> BookUpdate {
        BookUpdate {
            key: key(),
            kind,
            bids: bids
                .into_iter()
                .map(|(price, quantity)| PriceLevel { price, quantity })
                .collect(),
            asks: asks
                .into_iter()
                .map(|(price, quantity)| PriceLevel { price, quantity })
                .collect(),
            seq: None,
            event_ts: None,
        }
    }

    #[test]
    fn new_store_prepopulates_all_twelve_keys() {
        let store = BookStore::new();
        for k in BookKey::all() {
            assert!(store.mid(&k).is_none());
            assert!(store.health(&k).is_some());
        }
    }

    #[test]
    fn apply_known_key_succeeds() {
        let store = BookStore::new();
        let good = update(UpdateKind::Snapshot, vec![(100.0, 1.0)], vec![(101.0, 1.0)]);
        assert!(store.apply(&good).is_ok());
    }

    #[test]
    fn snapshot_replaces_delta_patches() {
        let store = BookStore::new();
        store
            .apply(&update(UpdateKind::Snapshot, vec![(100.0, 1.0)], vec![(101.0, 1.0)]))
            .unwrap();
        assert_eq!(store.best_bid(&key()), Some(100.0));
        store
            .apply(&update(UpdateKind::Delta, vec![(100.0, 0.0), (99.0, 2.0)], vec![]))
            .unwrap();
        assert_eq!(store.best_bid(&key()), Some(99.0));
        assert_eq!(store.best_ask(&key()), Some(101.0));
    }

    #[test]
    fn mid_is_average_of_best_bid_and_ask() {
        let store = BookStore::new();
        store
            .apply(&update(UpdateKind::Snapshot, vec![(100.0, 1.0)], vec![(102.0, 1.0)]))
            .unwrap();
        assert_eq!(store.mid(&key()), Some(101.0));
    }

    #[test]
    fn crossed_book_is_invalid() {
        let store = BookStore::new();
        store
            .apply(&update(UpdateKind::Snapshot, vec![(105.0, 1.0)], vec![(100.0, 1.0)]))
            .unwrap();
        let health = store.health(&key()).unwrap();
        assert!(!health.valid);
    }

    #[test]
    fn wide_spread_is_invalid() {
        let store = BookStore::new();
        store
            .apply(&update(UpdateKind::Snapshot, vec![(100.0, 1.0)], vec![(110.0, 1.0)]))
            .unwrap();
        let health = store.health(&key()).unwrap();
        assert!(!health.valid);
    }

    #[test]
    fn fresh_book_right_after_update() {
        let store = BookStore::new();
        store
            .apply(&update(UpdateKind::Snapshot, vec![(100.0, 1.0)], vec![(100.5, 1.0)]))
            .unwrap();
        let health = store.health(&key()).unwrap();
        assert!(health.fresh);
    }
}
