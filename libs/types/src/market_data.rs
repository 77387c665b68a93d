//! Kline wire messages and the normalized [`Candle`]
//!
//! ## Data Format Reference
//!
//! Combined stream (`/stream?streams=...`):
//! ```json
//! {"stream":"btcusdt@kline_1m","data":{"e":"kline","E":1700000000000,"s":"BTCUSDT","k":{...}}}
//! ```
//!
//! Raw stream (`/ws/<name>`): the `data` object on its own.
//!
//! Candle object (`k`):
//! ```json
//! {"t":1699999980000,"T":1700000039999,"s":"BTCUSDT","i":"1m","f":100,"L":200,
//!  "o":"0.0010","c":"0.0020","h":"0.0025","l":"0.0015","v":"1000","n":100,"x":false,
//!  "q":"1.0000","V":"500","Q":"0.500"}
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::PriceParseError;
use crate::signal::PairKey;

/// Combined-stream wrapper around a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope<T> {
    /// Stream name the payload arrived on, e.g. `btcusdt@kline_1m`
    pub stream: String,
    pub data: T,
}

/// Kline event as published by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

/// Candle body nested in a [`KlineEvent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlinePayload {
    #[serde(rename = "t")]
    pub start_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "f", default)]
    pub first_trade_id: i64,
    #[serde(rename = "L", default)]
    pub last_trade_id: i64,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "n")]
    pub trade_count: i64,
    #[serde(rename = "x")]
    pub is_closed: bool,
    #[serde(rename = "q", default)]
    pub quote_volume: String,
    #[serde(rename = "V", default)]
    pub taker_buy_base_volume: String,
    #[serde(rename = "Q", default)]
    pub taker_buy_quote_volume: String,
}

/// One normalized candle tick
///
/// Built once from a [`KlineEvent`] and never modified afterwards. Decimal fields are
/// carried verbatim; see [`Candle::close_price`] for the only numeric conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    pub event_time: i64,
    pub start_time: i64,
    pub close_time: i64,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub trade_count: i64,
    pub quote_volume: String,
    pub taker_buy_base_volume: String,
    pub taker_buy_quote_volume: String,
    /// `true` on the final tick of the candle's time bucket
    pub is_closed: bool,
}

impl Candle {
    /// Key of the indicator state this candle feeds
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.symbol, &self.interval)
    }

    /// Parse the close price, rejecting anything that is not a finite number
    pub fn close_price(&self) -> Result<f64, PriceParseError> {
        let price: f64 = self
            .close
            .trim()
            .parse()
            .map_err(|_| PriceParseError::Malformed {
                symbol: self.symbol.clone(),
                interval: self.interval.clone(),
                raw: self.close.clone(),
            })?;

        if !price.is_finite() {
            return Err(PriceParseError::NotFinite {
                symbol: self.symbol.clone(),
                interval: self.interval.clone(),
                raw: self.close.clone(),
            });
        }

        Ok(price)
    }
}

impl From<KlineEvent> for Candle {
    fn from(event: KlineEvent) -> Self {
        let k = event.kline;
        Self {
            // Event-level symbol is authoritative; the nested one repeats it
            symbol: event.symbol,
            interval: k.interval,
            event_time: event.event_time,
            start_time: k.start_time,
            close_time: k.close_time,
            first_trade_id: k.first_trade_id,
            last_trade_id: k.last_trade_id,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
            trade_count: k.trade_count,
            quote_volume: k.quote_volume,
            taker_buy_base_volume: k.taker_buy_base_volume,
            taker_buy_quote_volume: k.taker_buy_quote_volume,
            is_closed: k.is_closed,
        }
    }
}
