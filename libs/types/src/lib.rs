//! # Shared Types for the EMA Crossover Monitor
//!
//! Value types that cross crate boundaries in the detection pipeline:
//!
//! - **Wire shapes**: [`KlineEvent`], [`KlinePayload`] and the combined-stream
//!   [`StreamEnvelope`], exactly as the exchange sends them
//! - **Domain values**: [`Candle`] (normalized, immutable) and [`Signal`] (what the
//!   detector emits and the notifier delivers)
//! - **Table keys**: [`PairKey`] for per-pair indicator state, [`DedupKey`] for the
//!   duplicate-suppression table
//!
//! ## Numeric Policy
//!
//! Every decimal field of a candle stays the string the exchange sent. Only the close
//! price is ever turned into a number, on demand, through [`Candle::close_price`]. That
//! keeps normalization lossless and confines float conversion to the one place that
//! needs it.
//!
//! ```rust
//! use types::{Candle, KlineEvent};
//!
//! let raw = r#"{"e":"kline","E":1700000000000,"s":"BTCUSDT","k":{
//!     "t":1699999980000,"T":1700000039999,"s":"BTCUSDT","i":"1m",
//!     "o":"37000.10","c":"37010.55","h":"37020.00","l":"36990.00","v":"12.5",
//!     "n":321,"x":false}}"#;
//! let event: KlineEvent = serde_json::from_str(raw).unwrap();
//! let candle = Candle::from(event);
//! assert_eq!(candle.close_price().unwrap(), 37010.55);
//! ```

pub mod errors;
pub mod market_data;
pub mod signal;

pub use errors::PriceParseError;
pub use market_data::{Candle, KlineEvent, KlinePayload, StreamEnvelope};
pub use signal::{DedupKey, PairKey, Signal, SignalType};

/// Subscription token for one symbol/interval kline stream, e.g. `btcusdt@kline_1m`.
///
/// The exchange only accepts lower-case symbols in stream names.
pub fn kline_stream_name(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval)
}
