//! Signal delivery: log line, counters, and webhooks
//!
//! Two independent channels, each optional:
//! - **Generic webhook**: the [`Signal`] JSON as-is
//! - **Lark**: an interactive message card built by [`build_lark_card`]
//!
//! Every delivery runs on its own task with a fixed retry budget, so a slow or dead
//! endpoint never holds up the pipeline. When the stage stops it waits up to
//! `webhook.shutdown_grace_ms` for deliveries still in flight and aborts the rest.

use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use strategy_shared::PipelineMetrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use types::{Signal, SignalType};

use crate::config::{MessageCardConfig, WebhookConfig};
use crate::error::{Result, StrategyError};

/// Build the Lark interactive card for `signal`
pub fn build_lark_card(signal: &Signal, card: &MessageCardConfig) -> Value {
    let (template, title) = match signal.signal_type {
        SignalType::Bullish => ("blue", "📈 Golden Cross (Bullish)"),
        SignalType::Bearish => ("red", "📉 Death Cross (Bearish)"),
    };

    let field = |label: &str, value: String, is_short: bool| {
        json!({
            "is_short": is_short,
            "text": { "tag": "lark_md", "content": format!("**{}**\n{}", label, value) }
        })
    };

    let mut fields = vec![
        field("Symbol", signal.symbol.clone(), true),
        field("Interval", signal.interval.clone(), true),
        field("Price", format!("{:.2}", signal.price), true),
    ];

    if card.include_ema_values {
        fields.push(field("EMA Short", format!("{:.2}", signal.short_ema), true));
        fields.push(field("EMA Long", format!("{:.2}", signal.long_ema), true));
    }

    if card.include_timestamp {
        fields.push(field(
            "Time",
            signal.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            false,
        ));
    }

    let mut elements = vec![json!({ "tag": "div", "fields": fields })];

    if !card.buttons.is_empty() {
        let actions: Vec<Value> = card
            .buttons
            .iter()
            .map(|button| {
                json!({
                    "tag": "button",
                    "text": { "tag": "plain_text", "content": button.text },
                    "url": button.url.replace("{symbol}", &signal.symbol),
                    "type": "primary"
                })
            })
            .collect();
        elements.push(json!({ "tag": "hr" }));
        elements.push(json!({ "tag": "action", "actions": actions }));
    }

    json!({
        "msg_type": "interactive",
        "card": {
            "header": {
                "title": { "tag": "plain_text", "content": title },
                "template": template
            },
            "elements": elements
        }
    })
}

/// Named POST target
#[derive(Debug, Clone)]
struct Endpoint {
    name: &'static str,
    url: String,
}

/// Fans filtered signals out to the configured webhooks
pub struct Notifier {
    client: Client,
    webhook: WebhookConfig,
    card: MessageCardConfig,
    metrics: Arc<PipelineMetrics>,
}

impl Notifier {
    pub fn new(
        webhook: WebhookConfig,
        card: MessageCardConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(webhook.timeout()).build()?;
        Ok(Self {
            client,
            webhook,
            card,
            metrics,
        })
    }

    /// Record `signal` and start its webhook deliveries.
    ///
    /// Returns the delivery tasks; each resolves to `true` once its endpoint accepted
    /// the payload. Callers are free to drop them.
    pub fn notify(&self, signal: &Signal) -> Vec<JoinHandle<bool>> {
        self.metrics
            .record_signal(signal.signal_type == SignalType::Bullish);

        tracing::info!(
            "🚨 {} signal: {} {} at {:.2}",
            signal.signal_type,
            signal.symbol,
            signal.interval,
            signal.price
        );

        let mut deliveries = Vec::new();

        if self.webhook.enabled {
            match serde_json::to_value(signal) {
                Ok(payload) => deliveries.push(self.spawn_delivery(
                    Endpoint {
                        name: "webhook",
                        url: self.webhook.url.clone(),
                    },
                    payload,
                )),
                Err(e) => tracing::error!("Failed to serialize signal: {}", e),
            }
        }

        if self.webhook.lark.enabled {
            deliveries.push(self.spawn_delivery(
                Endpoint {
                    name: "lark",
                    url: self.webhook.lark.webhook_url.clone(),
                },
                build_lark_card(signal, &self.card),
            ));
        }

        deliveries
    }

    fn spawn_delivery(&self, endpoint: Endpoint, payload: Value) -> JoinHandle<bool> {
        let client = self.client.clone();
        let metrics = Arc::clone(&self.metrics);
        let attempts = self.webhook.attempts();
        let backoff = self.webhook.retry_backoff();

        tokio::spawn(async move {
            let delivered = deliver(&client, &endpoint, &payload, attempts, backoff).await;
            metrics.record_webhook(delivered);
            delivered
        })
    }

    /// Stage loop: notify every filtered signal, then pass it on to `output` if set
    pub async fn run(
        &self,
        mut filtered: mpsc::Receiver<Signal>,
        output: Option<mpsc::Sender<Signal>>,
        shutdown: CancellationToken,
    ) {
        let mut in_flight: Vec<JoinHandle<bool>> = Vec::new();

        loop {
            let signal = tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = filtered.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };

            in_flight.retain(|delivery| !delivery.is_finished());
            in_flight.extend(self.notify(&signal));

            if let Some(output) = &output {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    sent = output.send(signal) => {
                        if sent.is_err() {
                            tracing::debug!("Signal output receiver dropped");
                        }
                    }
                }
            }
        }

        self.finish_deliveries(in_flight).await;
        tracing::info!("Notifier stopped");
    }

    /// Wait out the shutdown grace period for pending deliveries, then abort them
    async fn finish_deliveries(&self, mut in_flight: Vec<JoinHandle<bool>>) {
        in_flight.retain(|delivery| !delivery.is_finished());
        if in_flight.is_empty() {
            return;
        }

        let grace = self.webhook.shutdown_grace();
        tracing::info!(
            "Waiting up to {}ms for {} webhook deliveries",
            grace.as_millis(),
            in_flight.len()
        );

        let deadline = Instant::now() + grace;
        let mut abandoned = 0;
        for mut delivery in in_flight {
            match tokio::time::timeout_at(deadline, &mut delivery).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!("Webhook delivery task failed: {}", e),
                Err(_) => {
                    delivery.abort();
                    abandoned += 1;
                }
            }
        }

        if abandoned > 0 {
            tracing::warn!("Abandoned {} webhook deliveries at shutdown", abandoned);
        }
    }
}

async fn deliver(
    client: &Client,
    endpoint: &Endpoint,
    payload: &Value,
    attempts: u32,
    backoff: Duration,
) -> bool {
    for attempt in 1..=attempts {
        match post_once(client, &endpoint.url, payload).await {
            Ok(()) => {
                tracing::info!("{} delivered to {}", endpoint.name, endpoint.url);
                return true;
            }
            Err(e) => {
                tracing::warn!(
                    "{} attempt {}/{} failed: {}",
                    endpoint.name,
                    attempt,
                    attempts,
                    e
                );
            }
        }

        if attempt < attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    tracing::error!(
        "{} delivery to {} failed after {} attempts",
        endpoint.name,
        endpoint.url,
        attempts
    );
    false
}

async fn post_once(client: &Client, url: &str, payload: &Value) -> Result<()> {
    let response = client.post(url).json(payload).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(StrategyError::Delivery {
            url: url.to_string(),
            message: format!("status code: {}", status.as_u16()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CardButton;
    use chrono::TimeZone;

    fn signal(signal_type: SignalType) -> Signal {
        Signal {
            signal_type,
            symbol: "ETHUSDT".to_string(),
            interval: "5m".to_string(),
            price: 2345.678,
            short_ema: 2340.1234,
            long_ema: 2338.9,
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    fn contents(card: &Value) -> Vec<String> {
        card["card"]["elements"][0]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["text"]["content"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_bullish_card_layout() {
        let card = build_lark_card(&signal(SignalType::Bullish), &MessageCardConfig::default());

        assert_eq!(card["msg_type"], "interactive");
        assert_eq!(card["card"]["header"]["template"], "blue");
        assert_eq!(
            contents(&card),
            vec![
                "**Symbol**\nETHUSDT",
                "**Interval**\n5m",
                "**Price**\n2345.68",
                "**EMA Short**\n2340.12",
                "**EMA Long**\n2338.90",
                "**Time**\n2024-01-02 03:04:05",
            ]
        );
        assert_eq!(card["card"]["elements"][0]["fields"][5]["is_short"], false);
        // No buttons configured: no divider, no action row
        assert_eq!(card["card"]["elements"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_bearish_card_without_optional_fields() {
        let config = MessageCardConfig {
            include_ema_values: false,
            include_timestamp: false,
            buttons: vec![CardButton {
                text: "Chart".to_string(),
                url: "https://www.binance.com/en/trade/{symbol}".to_string(),
            }],
        };
        let card = build_lark_card(&signal(SignalType::Bearish), &config);

        assert_eq!(card["card"]["header"]["template"], "red");
        assert_eq!(contents(&card).len(), 3);

        let action = &card["card"]["elements"][2];
        assert_eq!(card["card"]["elements"][1]["tag"], "hr");
        assert_eq!(action["tag"], "action");
        assert_eq!(
            action["actions"][0]["url"],
            "https://www.binance.com/en/trade/ETHUSDT"
        );
        assert_eq!(action["actions"][0]["text"]["content"], "Chart");
    }

    #[tokio::test]
    async fn test_notify_without_webhooks_only_counts() {
        let metrics = Arc::new(PipelineMetrics::new());
        let notifier = Notifier::new(
            WebhookConfig::default(),
            MessageCardConfig::default(),
            Arc::clone(&metrics),
        )
        .unwrap();

        assert!(notifier.notify(&signal(SignalType::Bearish)).is_empty());

        let snap = metrics.snapshot();
        assert_eq!(snap.signals_detected, 1);
        assert_eq!(snap.bearish_signals, 1);
        assert_eq!(snap.webhooks_sent + snap.webhooks_failed, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_while_output_is_full() {
        let metrics = Arc::new(PipelineMetrics::new());
        let notifier = Notifier::new(
            WebhookConfig::default(),
            MessageCardConfig::default(),
            Arc::clone(&metrics),
        )
        .unwrap();

        let (filtered_tx, filtered_rx) = mpsc::channel(4);
        let (output_tx, _output_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();

        filtered_tx.send(signal(SignalType::Bullish)).await.unwrap();
        filtered_tx.send(signal(SignalType::Bearish)).await.unwrap();

        let token = shutdown.clone();
        let stage = tokio::spawn(async move {
            notifier.run(filtered_rx, Some(output_tx), token).await;
        });

        // Second signal is taken but cannot be forwarded: output holds one, unread
        tokio::time::timeout(Duration::from_secs(2), async {
            while metrics.snapshot().signals_detected < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("both signals reached the notifier");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), stage)
            .await
            .expect("stage stopped after cancel")
            .unwrap();
        drop(filtered_tx);
    }
}
