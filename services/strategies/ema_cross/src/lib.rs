//! # EMA Cross Strategy - Crossover Detection over Kline Streams
//!
//! ## Purpose
//!
//! Watches candle streams for every configured symbol and interval, keeps a short and
//! a long exponential moving average per pair, and reports when the two cross with the
//! price confirming the direction. Repeats inside a window are suppressed; survivors
//! are logged, counted and pushed to webhooks.
//!
//! ## Architecture Role
//!
//! ```text
//! feed_adapter ──Candle──▶ [SignalDetector] ──Signal──▶ [DedupFilter] ──Signal──▶ [Notifier]
//!                              │                                                   │
//!                        EmaSeries x2 per pair                          generic JSON / Lark card
//!                        (commit on closed candles,
//!                         project on every tick)
//! ```
//!
//! ## Detection Rule
//!
//! For each candle the detector compares the committed EMAs (state after the last
//! closed candle) with EMAs projected from the live price:
//!
//! - **Bullish**: short was below long, is now above, and price is above long
//! - **Bearish**: short was above long, is now below, and price is below long
//!
//! Ties never count. A crossover can fire on an open candle; EMA state only moves when
//! a candle closes.
//!
//! ## Examples
//!
//! ```rust
//! use ema_cross_strategy::crossover::{cross, Crossover};
//! use ema_cross_strategy::indicators::EmaSeries;
//!
//! let mut short = EmaSeries::new(3);
//! let mut long = EmaSeries::new(5);
//! for price in [100.0, 102.0, 104.0] {
//!     short.commit(price);
//!     long.commit(price);
//! }
//!
//! let price = 90.0;
//! let outcome = cross(
//!     short.committed(),
//!     long.committed(),
//!     short.project(price),
//!     long.project(price),
//!     price,
//! );
//! assert_eq!(outcome, Crossover::Bearish);
//! ```

pub mod config;
pub mod crossover;
pub mod detector;
pub mod error;
pub mod filter;
pub mod indicators;
pub mod notifier;
pub mod pipeline;

pub use config::MonitorConfig;
pub use crossover::{cross, Crossover};
pub use detector::{PairState, SignalDetector};
pub use error::{Result, StrategyError};
pub use filter::DedupFilter;
pub use indicators::EmaSeries;
pub use notifier::{build_lark_card, Notifier};
pub use pipeline::{Pipeline, PipelineStatus};
