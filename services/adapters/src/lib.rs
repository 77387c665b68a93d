//! # Feed Adapter - Kline Ingestion for the EMA Crossover Monitor
//!
//! ## Purpose
//!
//! Owns the exchange side of the pipeline: one WebSocket connection subscribed to a
//! combined kline stream, kept alive with pings and restored after failures, plus the
//! normalizer that turns raw frames into [`types::Candle`] values.
//!
//! ## Data Flow
//!
//! ```text
//! Exchange ──WebSocket──▶ FeedConnector ──Vec<u8>──▶ MessageNormalizer ──Candle──▶ detector
//!                           │   ▲
//!                   read error  └── FixedIntervalRetry (constant wait, no give-up)
//! ```
//!
//! Both hand-offs are bounded `tokio::sync::mpsc` queues. When a consumer falls behind,
//! producers wait; nothing is dropped on the floor except frames that fail to decode.
//!
//! ## Failure Semantics
//!
//! - **First connect**: returned to the caller, never retried
//! - **Later read errors**: logged, then redialed every `reconnect_interval_ms`
//! - **Undecodable frames**: logged at `warn` and skipped
//! - **Shutdown**: cancelling the token (or `close()`) stops reading, pinging and
//!   redialing, and closes the frame queue so downstream stages drain and exit
//!
//! ```rust,no_run
//! use feed_adapter::{FeedConfig, FeedConnector, MessageNormalizer, TungsteniteDialer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> feed_adapter::Result<()> {
//! let config = FeedConfig::default();
//! let shutdown = CancellationToken::new();
//! let dialer = TungsteniteDialer::new(config.connect_timeout());
//! let connector = FeedConnector::new(config, dialer, &shutdown);
//!
//! let frames = connector.take_frames().expect("frames taken once");
//! connector.connect(&["btcusdt@kline_1m".to_string()]).await?;
//!
//! let (candles_tx, mut candles) = tokio::sync::mpsc::channel(100);
//! tokio::spawn(async move {
//!     MessageNormalizer::new().run(frames, candles_tx, shutdown).await;
//! });
//! while let Some(candle) = candles.recv().await {
//!     println!("{} {} close={}", candle.symbol, candle.interval, candle.close);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod input;

pub use config::{FeedConfig, DEFAULT_QUEUE_CAPACITY};
pub use error::{AdapterError, Result};
pub use input::{
    build_stream_url, ConnectionState, Dialer, FeedConnector, FeedLink, FixedIntervalRetry,
    MessageNormalizer, TungsteniteDialer,
};
