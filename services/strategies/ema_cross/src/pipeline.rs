//! Stage wiring for the monitor
//!
//! ```text
//! FeedConnector ─frames─▶ MessageNormalizer ─candles─▶ SignalDetector ─raw─▶ DedupFilter ─filtered─▶ Notifier ─▶ (output)
//! ```
//!
//! Every arrow is a bounded queue of `feed.queue_capacity`. Each stage is its own task
//! and stops as soon as the shutdown token fires or its inbound queue closes. Whatever
//! is still queued at cancellation is dropped.

use feed_adapter::{ConnectionState, Dialer, FeedConnector, MessageNormalizer, TungsteniteDialer};
use health_check::HealthReporter;
use std::sync::Arc;
use strategy_shared::PipelineMetrics;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use types::Signal;

use crate::config::MonitorConfig;
use crate::detector::SignalDetector;
use crate::error::{Result, StrategyError};
use crate::filter::DedupFilter;
use crate::notifier::Notifier;

/// The assembled detection pipeline, ready to run
pub struct Pipeline<D: Dialer = TungsteniteDialer> {
    config: MonitorConfig,
    connector: Arc<FeedConnector<D>>,
    normalizer: Arc<MessageNormalizer>,
    detector: Arc<SignalDetector>,
    filter: Arc<DedupFilter>,
    notifier: Arc<Notifier>,
    metrics: Arc<PipelineMetrics>,
    output: Option<mpsc::Sender<Signal>>,
    shutdown: CancellationToken,
}

impl Pipeline<TungsteniteDialer> {
    /// Pipeline dialing the configured exchange endpoint
    pub fn from_config(config: MonitorConfig, shutdown: CancellationToken) -> Result<Self> {
        let dialer = TungsteniteDialer::new(config.feed.connect_timeout());
        Self::new(config, dialer, shutdown)
    }
}

impl<D: Dialer> Pipeline<D> {
    pub fn new(config: MonitorConfig, dialer: D, shutdown: CancellationToken) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(PipelineMetrics::new());
        let connector = FeedConnector::new(config.feed.clone(), dialer, &shutdown);
        let detector = SignalDetector::new(
            config.indicators.ema_short_period,
            config.indicators.ema_long_period,
        );
        let filter = DedupFilter::new(config.signal.deduplication_window());
        let notifier = Notifier::new(
            config.webhook.clone(),
            config.message_card.clone(),
            Arc::clone(&metrics),
        )?;

        Ok(Self {
            config,
            connector: Arc::new(connector),
            normalizer: Arc::new(MessageNormalizer::new()),
            detector: Arc::new(detector),
            filter: Arc::new(filter),
            notifier: Arc::new(notifier),
            metrics,
            output: None,
            shutdown,
        })
    }

    /// Also forward every delivered signal to `output`
    pub fn with_signal_output(mut self, output: mpsc::Sender<Signal>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn connector(&self) -> Arc<FeedConnector<D>> {
        Arc::clone(&self.connector)
    }

    pub fn detector(&self) -> Arc<SignalDetector> {
        Arc::clone(&self.detector)
    }

    /// Live view for the health endpoints
    pub fn status(&self) -> Arc<PipelineStatus<D>> {
        Arc::new(PipelineStatus {
            connector: Arc::clone(&self.connector),
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Connect, run every stage, and return once they have all stopped.
    ///
    /// Fails only if the first connection attempt fails.
    pub async fn run(self) -> Result<()> {
        let streams = self.config.stream_names();
        let frames = self
            .connector
            .take_frames()
            .ok_or_else(|| StrategyError::configuration("Frame queue already taken"))?;

        tracing::info!(
            "Subscribing to {} streams: {}",
            streams.len(),
            streams.join(", ")
        );
        self.connector.connect(&streams).await?;

        let stages_done = self.shutdown.child_token();
        let connection_watch = tokio::spawn(track_connection(
            self.connector.subscribe_state(),
            Arc::clone(&self.metrics),
            stages_done.clone(),
        ));

        let capacity = self.config.feed.queue_capacity;
        let (candle_tx, candle_rx) = mpsc::channel(capacity);
        let (raw_tx, raw_rx) = mpsc::channel(capacity);
        let (filtered_tx, filtered_rx) = mpsc::channel(capacity);

        let mut stages = JoinSet::new();

        let normalizer = Arc::clone(&self.normalizer);
        let token = self.shutdown.clone();
        stages.spawn(async move { normalizer.run(frames, candle_tx, token).await });

        let detector = Arc::clone(&self.detector);
        let metrics = Arc::clone(&self.metrics);
        let token = self.shutdown.clone();
        stages.spawn(async move { detector.run(candle_rx, raw_tx, metrics, token).await });

        let filter = Arc::clone(&self.filter);
        let metrics = Arc::clone(&self.metrics);
        let token = self.shutdown.clone();
        stages.spawn(async move { filter.run(raw_rx, filtered_tx, metrics, token).await });

        let notifier = Arc::clone(&self.notifier);
        let output = self.output.clone();
        let token = self.shutdown.clone();
        stages.spawn(async move { notifier.run(filtered_rx, output, token).await });

        tracing::info!("Pipeline running");

        while let Some(joined) = stages.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Pipeline stage failed: {}", e);
            }
        }

        stages_done.cancel();
        if let Err(e) = connection_watch.await {
            tracing::error!("Connection watcher failed: {}", e);
        }

        self.connector.close().await?;
        self.metrics.set_feed_connected(false);
        tracing::info!("Pipeline stopped");
        Ok(())
    }
}

/// Connection state and counters, as served on `/health` and `/metrics`
pub struct PipelineStatus<D: Dialer = TungsteniteDialer> {
    connector: Arc<FeedConnector<D>>,
    metrics: Arc<PipelineMetrics>,
}

impl<D: Dialer> HealthReporter for PipelineStatus<D> {
    fn connection_state(&self) -> String {
        self.connector.state().as_str().to_string()
    }

    fn metrics(&self) -> serde_json::Value {
        serde_json::to_value(self.metrics.snapshot()).unwrap_or_default()
    }
}

/// Mirror every connector state change into the `feed_connected` flag
async fn track_connection(
    mut states: watch::Receiver<ConnectionState>,
    metrics: Arc<PipelineMetrics>,
    stop: CancellationToken,
) {
    loop {
        let state = *states.borrow_and_update();
        metrics.set_feed_connected(state == ConnectionState::Connected);

        tokio::select! {
            _ = stop.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
