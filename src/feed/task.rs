// =============================================================================
// C2 — feeder tasks: one per live book, each owning its own WebSocket
// =============================================================================
//
// Grounded on the teacher's `market_data/orderbook.rs::run_depth_stream`:
// connect, split the stream, read until disconnect or error, then return so
// the caller can reconnect. The caller here is `orchestrator.rs`, which
// wraps each feeder in a `loop { ...; sleep(5s) }` exactly like the
// teacher's per-symbol stream tasks in `main.rs`.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use super::dialect;
use crate::book::{BookKey, BookStore};
use crate::types::{Asset, MarketType, Venue};

fn binance_symbol(asset: Asset) -> &'static str {
    match asset {
        Asset::Btc => "btcusdt",
        Asset::Eth => "ethusdt",
    }
}

fn binance_url(key: BookKey) -> String {
    let symbol = binance_symbol(key.asset);
    match key.market {
        MarketType::Spot => format!("wss://stream.binance.com:9443/ws/{symbol}@depth20@100ms"),
        MarketType::Futures => format!("wss://fstream.binance.com/ws/{symbol}@depth"),
    }
}

fn bybit_url(key: BookKey) -> &'static str {
    match key.market {
        MarketType::Spot => "wss://stream.bybit.com/v5/public/spot",
        MarketType::Futures => "wss://stream.bybit.com/v5/public/linear",
    }
}

fn bybit_subscribe_symbol(asset: Asset) -> &'static str {
    match asset {
        Asset::Btc => "BTCUSDT",
        Asset::Eth => "ETHUSDT",
    }
}

fn okx_inst_id(key: BookKey) -> String {
    let base = match key.asset {
        Asset::Btc => "BTC",
        Asset::Eth => "ETH",
    };
    match key.market {
        MarketType::Spot => format!("{base}-USDT"),
        MarketType::Futures => format!("{base}-USDT-SWAP"),
    }
}

/// Run one feeder to completion — i.e. until the stream disconnects, errors,
/// or `shutdown` is observed. Never itself reconnects; the orchestrator's
/// supervisor loop owns that decision.
pub async fn run_feed(key: BookKey, store: Arc<BookStore>, shutdown: Arc<AtomicBool>) -> Result<()> {
    match key.venue {
        Venue::Binance => run_binance(key, &store, &shutdown).await,
        Venue::Bybit => run_bybit(key, &store, &shutdown).await,
        Venue::Okx => run_okx(key, &store, &shutdown).await,
    }
}

async fn run_binance(key: BookKey, store: &Arc<BookStore>, shutdown: &Arc<AtomicBool>) -> Result<()> {
    let url = binance_url(key);
    info!(key = %key, url = %url, "connecting to Binance depth stream");
    let (ws_stream, _) = connect_async(&url).await.context("binance connect failed")?;
    info!(key = %key, "Binance stream connected");
    let (_write, mut read) = ws_stream.split();

    while !shutdown.load(Ordering::Relaxed) {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match dialect::parse_binance(key, &text) {
                Ok(update) => {
                    if let Err(e) = store.apply(&update) {
                        warn!(key = %key, error = %e, "failed to apply binance update");
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "failed to parse binance message"),
            },
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "binance stream read error");
                return Err(e.into());
            }
            None => {
                warn!(key = %key, "binance stream ended");
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn run_bybit(key: BookKey, store: &Arc<BookStore>, shutdown: &Arc<AtomicBool>) -> Result<()> {
    let url = bybit_url(key);
    info!(key = %key, url = %url, "connecting to Bybit depth stream");
    let (mut ws_stream, _) = connect_async(url).await.context("bybit connect failed")?;

    let topic = format!("orderbook.50.{}", bybit_subscribe_symbol(key.asset));
    let subscribe = json!({ "op": "subscribe", "args": [topic] });
    ws_stream
        .send(Message::Text(subscribe.to_string()))
        .await
        .context("bybit subscribe failed")?;
    info!(key = %key, "Bybit stream connected and subscribed");

    let (_write, mut read) = ws_stream.split();
    while !shutdown.load(Ordering::Relaxed) {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if dialect::is_bybit_control_frame(&text) {
                    continue;
                }
                match dialect::parse_bybit(key, &text) {
                    Ok(update) => {
                        if let Err(e) = store.apply(&update) {
                            warn!(key = %key, error = %e, "failed to apply bybit update");
                        }
                    }
                    Err(e) => warn!(key = %key, error = %e, "failed to parse bybit message"),
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "bybit stream read error");
                return Err(e.into());
            }
            None => {
                warn!(key = %key, "bybit stream ended");
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn run_okx(key: BookKey, store: &Arc<BookStore>, shutdown: &Arc<AtomicBool>) -> Result<()> {
    let url = "wss://ws.okx.com:8443/ws/v5/public";
    info!(key = %key, url = %url, "connecting to OKX depth stream");
    let (mut ws_stream, _) = connect_async(url).await.context("okx connect failed")?;

    let subscribe = json!({
        "op": "subscribe",
        "args": [{ "channel": "books", "instId": okx_inst_id(key) }],
    });
    ws_stream
        .send(Message::Text(subscribe.to_string()))
        .await
        .context("okx subscribe failed")?;
    info!(key = %key, "OKX stream connected and subscribed");

    let (_write, mut read) = ws_stream.split();
    while !shutdown.load(Ordering::Relaxed) {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if dialect::is_okx_event_frame(&text) {
                    continue;
                }
                match dialect::parse_okx(key, &text) {
                    Ok(update) => {
                        if let Err(e) = store.apply(&update) {
                            warn!(key = %key, error = %e, "failed to apply okx update");
                        }
                    }
                    Err(e) => warn!(key = %key, error = %e, "failed to parse okx message"),
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "okx stream read error");
                return Err(e.into());
            }
            None => {
                warn!(key = %key, "okx stream ended");
                return Ok(());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, MarketType, Venue};

    #[test]
    fn binance_urls_pick_the_right_stream_per_market() {
        let spot = BookKey::new(Venue::Binance, Asset::Btc, MarketType::Spot);
        let fut = BookKey::new(Venue::Binance, Asset::Eth, MarketType::Futures);
        assert!(binance_url(spot).contains("stream.binance.com"));
        assert!(binance_url(fut).contains("fstream.binance.com"));
    }

    #[test]
    fn okx_inst_id_appends_swap_suffix_for_futures() {
        let spot = BookKey::new(Venue::Okx, Asset::Btc, MarketType::Spot);
        let fut = BookKey::new(Venue::Okx, Asset::Btc, MarketType::Futures);
        assert_eq!(okx_inst_id(spot), "BTC-USDT");
        assert_eq!(okx_inst_id(fut), "BTC-USDT-SWAP");
    }
}
