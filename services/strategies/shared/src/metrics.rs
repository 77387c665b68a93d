//! Pipeline metrics collection

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe counters for every stage of the detection pipeline
#[derive(Debug)]
pub struct PipelineMetrics {
    start_time: Instant,
    feed_connected: AtomicBool,
    candles_received: AtomicU64,
    candles_dropped: AtomicU64,
    signals_detected: AtomicU64,
    bullish_signals: AtomicU64,
    bearish_signals: AtomicU64,
    signals_suppressed: AtomicU64,
    webhooks_sent: AtomicU64,
    webhooks_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub feed_connected: bool,
    pub candles_received: u64,
    pub candles_dropped: u64,
    pub signals_detected: u64,
    pub bullish_signals: u64,
    pub bearish_signals: u64,
    pub signals_suppressed: u64,
    pub webhooks_sent: u64,
    pub webhooks_failed: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            feed_connected: AtomicBool::new(false),
            candles_received: AtomicU64::new(0),
            candles_dropped: AtomicU64::new(0),
            signals_detected: AtomicU64::new(0),
            bullish_signals: AtomicU64::new(0),
            bearish_signals: AtomicU64::new(0),
            signals_suppressed: AtomicU64::new(0),
            webhooks_sent: AtomicU64::new(0),
            webhooks_failed: AtomicU64::new(0),
        }
    }

    pub fn set_feed_connected(&self, connected: bool) {
        self.feed_connected.store(connected, Ordering::Relaxed);
    }

    pub fn increment_candles(&self) {
        self.candles_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dropped(&self) {
        self.candles_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a signal that made it past dedup
    pub fn record_signal(&self, bullish: bool) {
        self.signals_detected.fetch_add(1, Ordering::Relaxed);
        if bullish {
            self.bullish_signals.fetch_add(1, Ordering::Relaxed);
        } else {
            self.bearish_signals.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_suppressed(&self) {
        self.signals_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook(&self, delivered: bool) {
        if delivered {
            self.webhooks_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.webhooks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs(),
            feed_connected: self.feed_connected.load(Ordering::Relaxed),
            candles_received: self.candles_received.load(Ordering::Relaxed),
            candles_dropped: self.candles_dropped.load(Ordering::Relaxed),
            signals_detected: self.signals_detected.load(Ordering::Relaxed),
            bullish_signals: self.bullish_signals.load(Ordering::Relaxed),
            bearish_signals: self.bearish_signals.load(Ordering::Relaxed),
            signals_suppressed: self.signals_suppressed.load(Ordering::Relaxed),
            webhooks_sent: self.webhooks_sent.load(Ordering::Relaxed),
            webhooks_failed: self.webhooks_failed.load(Ordering::Relaxed),
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
