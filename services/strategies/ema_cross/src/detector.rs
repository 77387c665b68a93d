//! Per-pair EMA state and crossover detection
//!
//! ## Locking
//!
//! The pair table is a map of independently locked cells. The table lock is held only
//! to find or create a cell; the cell lock is held for the whole
//! read-previous / project / detect / commit sequence of one candle, so two candles for
//! the same pair can never interleave even when several workers share a detector.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use strategy_shared::PipelineMetrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use types::{Candle, PairKey, Signal};

use crate::crossover::cross;
use crate::error::Result;
use crate::indicators::EmaSeries;

/// Short and long EMA for one symbol/interval
#[derive(Debug, Clone, PartialEq)]
pub struct PairState {
    pub short: EmaSeries,
    pub long: EmaSeries,
}

impl PairState {
    fn new(short_period: usize, long_period: usize) -> Self {
        Self {
            short: EmaSeries::new(short_period),
            long: EmaSeries::new(long_period),
        }
    }
}

type PairCell = Arc<Mutex<PairState>>;

/// Turns candles into raw crossover signals
pub struct SignalDetector {
    short_period: usize,
    long_period: usize,
    pairs: Mutex<HashMap<PairKey, PairCell>>,
}

impl SignalDetector {
    pub fn new(short_period: usize, long_period: usize) -> Self {
        Self {
            short_period,
            long_period,
            pairs: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: PairKey) -> PairCell {
        let mut pairs = self.pairs.lock();
        let cell = pairs.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(PairState::new(
                self.short_period,
                self.long_period,
            )))
        });
        Arc::clone(cell)
    }

    /// Feed one candle; returns the crossover it triggers, if any.
    ///
    /// The crossover is judged on projected EMAs, so it can fire on an open candle.
    /// EMA state advances only when the candle is closed.
    pub fn process(&self, candle: &Candle) -> Result<Option<Signal>> {
        let cell = self.cell(candle.pair_key());
        let price = candle.close_price()?;

        let mut state = cell.lock();

        let prev_short = state.short.committed();
        let prev_long = state.long.committed();
        let curr_short = state.short.project(price);
        let curr_long = state.long.project(price);

        let signal = cross(prev_short, prev_long, curr_short, curr_long, price)
            .signal_type()
            .map(|signal_type| Signal {
                signal_type,
                symbol: candle.symbol.clone(),
                interval: candle.interval.clone(),
                price,
                short_ema: curr_short,
                long_ema: curr_long,
                timestamp: Utc::now(),
            });

        if candle.is_closed {
            state.short.commit(price);
            state.long.commit(price);
        }

        Ok(signal)
    }

    /// Copy of the state for `key`, if any candle for it has been seen
    pub fn pair_state(&self, key: &PairKey) -> Option<PairState> {
        let cell = self.pairs.lock().get(key).cloned()?;
        let state = cell.lock().clone();
        Some(state)
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.lock().len()
    }

    /// Stage loop: candles in, raw signals out
    pub async fn run(
        &self,
        mut candles: mpsc::Receiver<Candle>,
        signals: mpsc::Sender<Signal>,
        metrics: Arc<PipelineMetrics>,
        shutdown: CancellationToken,
    ) {
        loop {
            let candle = tokio::select! {
                _ = shutdown.cancelled() => break,
                candle = candles.recv() => match candle {
                    Some(candle) => candle,
                    None => break,
                },
            };

            metrics.increment_candles();

            let signal = match self.process(&candle) {
                Ok(Some(signal)) => signal,
                Ok(None) => continue,
                Err(e) => {
                    metrics.increment_dropped();
                    tracing::warn!(
                        "Dropping candle for {}/{}: {}",
                        candle.symbol,
                        candle.interval,
                        e
                    );
                    continue;
                }
            };

            tracing::debug!(
                "Crossover {} on {}/{} at {} (short={:.4}, long={:.4})",
                signal.signal_type,
                signal.symbol,
                signal.interval,
                signal.price,
                signal.short_ema,
                signal.long_ema
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = signals.send(signal) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Signal detector stopped ({} pairs tracked)", self.pair_count());
    }
}
