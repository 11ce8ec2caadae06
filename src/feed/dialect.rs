// =============================================================================
// C2 — per-venue wire dialect parsers
// =============================================================================
//
// Each venue speaks a different JSON shape for the same thing: a batch of
// price/quantity levels to merge into a book. These functions are the only
// place that JSON dialect knowledge lives; everything downstream of them
// (the book store, every analyzer) only ever sees `BookUpdate`.
//
// Binance's partial-depth stream has no snapshot/delta distinction at the
// message level — every message is a delta against whatever state the
// consumer already holds. Bybit's v5 public channel tags each message
// `type: "snapshot" | "delta"` and nests levels under `data`. OKX's `books`
// channel never carries an explicit type; by convention here every OKX
// message is treated as a full replacement (see SPEC_FULL.md §4.2).
// =============================================================================

use serde_json::Value;

use crate::book::{BookKey, BookUpdate, PriceLevel, UpdateKind};
use crate::error::EngineError;

fn parse_levels(levels: &[Value]) -> Vec<PriceLevel> {
    levels
        .iter()
        .filter_map(|level| {
            let pair = level.as_array()?;
            let price: f64 = pair.first()?.as_str()?.parse().ok()?;
            let quantity: f64 = pair.get(1)?.as_str()?.parse().ok()?;
            Some(PriceLevel { price, quantity })
        })
        .collect()
}

/// Binance `@depth` / `@depth20@100ms`: top-level `b`/`a` arrays, always a delta.
pub fn parse_binance(key: BookKey, text: &str) -> Result<BookUpdate, EngineError> {
    let root: Value = serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;
    let bids = root
        .get("b")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field b".into()))?;
    let asks = root
        .get("a")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field a".into()))?;

    Ok(BookUpdate {
        key,
        kind: UpdateKind::Delta,
        bids: parse_levels(bids),
        asks: parse_levels(asks),
        seq: None,
        event_ts: None,
    })
}

/// Bybit v5 public `orderbook.*`: `{"type": "snapshot"|"delta", "data": {"b": [...], "a": [...]}}`.
/// Control frames (`success`/`ret_msg`) carry no book data and are skipped by
/// the caller before this is invoked.
pub fn parse_bybit(key: BookKey, text: &str) -> Result<BookUpdate, EngineError> {
    let root: Value = serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;
    let data = root
        .get("data")
        .ok_or_else(|| EngineError::Parse("missing field data".into()))?;
    let bids = data
        .get("b")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field data.b".into()))?;
    let asks = data
        .get("a")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field data.a".into()))?;

    let kind = match root.get("type").and_then(Value::as_str) {
        Some("snapshot") => UpdateKind::Snapshot,
        _ => UpdateKind::Delta,
    };

    Ok(BookUpdate {
        key,
        kind,
        bids: parse_levels(bids),
        asks: parse_levels(asks),
        seq: None,
        event_ts: None,
    })
}

/// OKX `books` channel: `{"data": [{"bids": [...], "asks": [...]}, ...]}`.
/// Treated as a snapshot — OKX's `books` payloads are consumed here without
/// tracking the `books`/`books-l2-tbt` checksum sequence, so each message
/// replaces rather than patches.
pub fn parse_okx(key: BookKey, text: &str) -> Result<BookUpdate, EngineError> {
    let root: Value = serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;
    let entry = root
        .get("data")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| EngineError::Parse("missing field data[0]".into()))?;
    let bids = entry
        .get("bids")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field bids".into()))?;
    let asks = entry
        .get("asks")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Parse("missing field asks".into()))?;

    Ok(BookUpdate {
        key,
        kind: UpdateKind::Snapshot,
        bids: parse_levels(bids),
        asks: parse_levels(asks),
        seq: None,
        event_ts: None,
    })
}

/// Is this Bybit frame a control/ack frame rather than a book update?
pub fn is_bybit_control_frame(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .map(|v| v.get("success").is_some() || v.get("ret_msg").is_some())
        .unwrap_or(false)
}

/// Is this OKX frame an `event` ack rather than a book update?
pub fn is_okx_event_frame(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .map(|v| v.get("event").is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, MarketType, Venue};

    fn key() -> BookKey {
        BookKey::new(Venue::Binance, Asset::Btc, MarketType::Futures)
    }

    #[test]
    fn binance_message_is_always_a_delta() {
        let text = r#"{"b":[["100.0","1.5"]],"a":[["101.0","2.0"]]}"#;
        let update = parse_binance(key(), text).unwrap();
        assert_eq!(update.kind, UpdateKind::Delta);
        assert_eq!(update.bids, vec![PriceLevel { price: 100.0, quantity: 1.5 }]);
        assert_eq!(update.asks, vec![PriceLevel { price: 101.0, quantity: 2.0 }]);
    }

    #[test]
    fn binance_zero_quantity_level_is_preserved_for_book_store_to_erase() {
        let text = r#"{"b":[["100.0","0.0"]],"a":[]}"#;
        let update = parse_binance(key(), text).unwrap();
        assert_eq!(update.bids, vec![PriceLevel { price: 100.0, quantity: 0.0 }]);
    }

    #[test]
    fn bybit_snapshot_sets_snapshot_kind() {
        let text = r#"{"type":"snapshot","data":{"b":[["100.0","1.0"]],"a":[["101.0","1.0"]]}}"#;
        let update = parse_bybit(key(), text).unwrap();
        assert_eq!(update.kind, UpdateKind::Snapshot);
    }

    #[test]
    fn bybit_delta_sets_delta_kind() {
        let text = r#"{"type":"delta","data":{"b":[],"a":[]}}"#;
        let update = parse_bybit(key(), text).unwrap();
        assert_eq!(update.kind, UpdateKind::Delta);
    }

    #[test]
    fn bybit_control_frame_is_detected() {
        assert!(is_bybit_control_frame(r#"{"success":true,"ret_msg":""}"#));
        assert!(!is_bybit_control_frame(r#"{"type":"delta","data":{}}"#));
    }

    #[test]
    fn okx_message_is_treated_as_snapshot() {
        let text = r#"{"data":[{"bids":[["100.0","1.0"]],"asks":[["101.0","1.0"]]}]}"#;
        let update = parse_okx(key(), text).unwrap();
        assert_eq!(update.kind, UpdateKind::Snapshot);
        assert_eq!(update.bids, vec![PriceLevel { price: 100.0, quantity: 1.0 }]);
    }

    #[test]
    fn okx_event_frame_is_detected() {
        assert!(is_okx_event_frame(r#"{"event":"subscribe"}"#));
        assert!(!is_okx_event_frame(r#"{"data":[]}"#));
    }
}
