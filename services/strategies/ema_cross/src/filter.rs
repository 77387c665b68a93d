//! Duplicate signal suppression

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strategy_shared::PipelineMetrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use types::{DedupKey, Signal};

/// Lets a (symbol, interval, type) fire at most once per window
///
/// Entries are kept for the life of the process; the table is bounded by the number
/// of configured pairs times two signal types.
pub struct DedupFilter {
    window: Duration,
    last_emitted: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
}

impl DedupFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether `signal` goes through at time `now`, recording it if so
    pub fn admit(&self, signal: &Signal, now: DateTime<Utc>) -> bool {
        let key = signal.dedup_key();
        let mut last_emitted = self.last_emitted.lock();

        if let Some(last) = last_emitted.get(&key) {
            // A clock step backwards counts as no time elapsed
            let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.window {
                return false;
            }
        }

        last_emitted.insert(key, now);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_emitted.lock().len()
    }

    /// Stage loop: raw signals in, filtered signals out
    pub async fn run(
        &self,
        mut raw: mpsc::Receiver<Signal>,
        filtered: mpsc::Sender<Signal>,
        metrics: Arc<PipelineMetrics>,
        shutdown: CancellationToken,
    ) {
        loop {
            let signal = tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = raw.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };

            if !self.admit(&signal, Utc::now()) {
                metrics.increment_suppressed();
                tracing::debug!(
                    "Suppressed duplicate {} within {}s window",
                    signal.dedup_key(),
                    self.window.as_secs()
                );
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = filtered.send(signal) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Dedup filter stopped ({} keys tracked)", self.tracked_keys());
    }
}
