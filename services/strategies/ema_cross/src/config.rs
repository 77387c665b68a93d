//! Monitor configuration
//!
//! Loaded from TOML, then patched from `EMA_MONITOR_*` environment variables, then
//! validated. Every section has defaults, so a file only needs what it changes.

use feed_adapter::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strategy_shared::{env_override, load_config, parse_list};

use crate::error::{Result, StrategyError};

/// Environment variable naming the config file when no CLI argument is given
pub const CONFIG_PATH_ENV: &str = "EMA_MONITOR_CONFIG";

/// Config file used when neither the CLI nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "configs/ema_monitor.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Trading pairs to watch, e.g. `BTCUSDT`
    pub symbols: Vec<String>,

    /// Candle intervals to watch, e.g. `1m`
    pub intervals: Vec<String>,

    pub feed: FeedConfig,
    pub indicators: IndicatorConfig,
    pub signal: SignalConfig,
    pub webhook: WebhookConfig,
    pub message_card: MessageCardConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_short_period: usize,
    pub ema_long_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Minimum time before the same symbol/interval/type may fire again
    pub deduplication_window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// POST the raw signal JSON to `url`
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
    /// Extra attempts after the first
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
    /// How long shutdown waits for deliveries still in flight
    pub shutdown_grace_ms: u64,
    pub lark: LarkConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarkConfig {
    pub enabled: bool,
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageCardConfig {
    pub include_ema_values: bool,
    pub include_timestamp: bool,
    pub buttons: Vec<CardButton>,
}

/// Link button on the Lark card; `{symbol}` in the URL is replaced per signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Health server port; 0 disables it
    pub healthcheck_port: u16,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            intervals: vec!["1m".to_string()],
            feed: FeedConfig::default(),
            indicators: IndicatorConfig::default(),
            signal: SignalConfig::default(),
            webhook: WebhookConfig::default(),
            message_card: MessageCardConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_short_period: 12,
            ema_long_period: 26,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            deduplication_window_secs: 300, // 5 minutes
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_ms: 10_000,
            retry_count: 3,
            retry_backoff_ms: 1_000,
            shutdown_grace_ms: 5_000,
            lark: LarkConfig::default(),
        }
    }
}

impl Default for MessageCardConfig {
    fn default() -> Self {
        Self {
            include_ema_values: true,
            include_timestamp: true,
            buttons: Vec::new(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            healthcheck_port: 8080,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Total POST attempts per delivery: the first plus `retry_count` retries
    pub fn attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

impl SignalConfig {
    pub fn deduplication_window(&self) -> Duration {
        Duration::from_secs(self.deduplication_window_secs)
    }
}

impl MonitorConfig {
    /// Load from `path`, apply environment overrides, validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: MonitorConfig = load_config(path.as_ref())
            .map_err(|e| StrategyError::configuration(format!("{:#}", e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_override("EMA_MONITOR_WS_URL") {
            self.feed.websocket_url = url;
        }
        if let Some(symbols) = env_override("EMA_MONITOR_SYMBOLS") {
            self.symbols = parse_list(&symbols);
        }
        if let Some(intervals) = env_override("EMA_MONITOR_INTERVALS") {
            self.intervals = parse_list(&intervals);
        }
        if let Some(url) = env_override("EMA_MONITOR_WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(level) = env_override("EMA_MONITOR_LOG_LEVEL") {
            self.monitoring.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(StrategyError::configuration(
                "At least one symbol must be configured",
            ));
        }

        if self.intervals.is_empty() {
            return Err(StrategyError::configuration(
                "At least one interval must be configured",
            ));
        }

        self.feed
            .validate()
            .map_err(|e| StrategyError::configuration(e.to_string()))?;

        let IndicatorConfig {
            ema_short_period: short,
            ema_long_period: long,
        } = self.indicators;
        if short == 0 || short >= long {
            return Err(StrategyError::configuration(format!(
                "EMA periods must satisfy 0 < short < long, got short={} long={}",
                short, long
            )));
        }

        if self.webhook.enabled && self.webhook.url.is_empty() {
            return Err(StrategyError::configuration(
                "webhook.url is required when webhook.enabled = true",
            ));
        }

        if self.webhook.lark.enabled && self.webhook.lark.webhook_url.is_empty() {
            return Err(StrategyError::configuration(
                "webhook.lark.webhook_url is required when webhook.lark.enabled = true",
            ));
        }

        Ok(())
    }

    /// Subscription tokens for every symbol x interval pair, symbols outermost
    pub fn stream_names(&self) -> Vec<String> {
        self.symbols
            .iter()
            .flat_map(|symbol| {
                self.intervals
                    .iter()
                    .map(move |interval| types::kline_stream_name(symbol, interval))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
symbols = ["BTCUSDT", "ETHUSDT"]
intervals = ["1m", "5m"]

[feed]
websocket_url = "wss://stream.binance.com:9443/ws"
reconnect_interval_ms = 3000

[indicators]
ema_short_period = 3
ema_long_period = 5

[signal]
deduplication_window_secs = 60

[webhook]
enabled = true
url = "https://hooks.example.com/signal"
retry_count = 2

[webhook.lark]
enabled = true
webhook_url = "https://open.larksuite.com/hook/abc"

[message_card]
include_ema_values = false

[[message_card.buttons]]
text = "Chart"
url = "https://www.binance.com/en/trade/{symbol}"

[monitoring]
healthcheck_port = 0
"#;

    fn parse(content: &str) -> Result<MonitorConfig> {
        let config: MonitorConfig = toml::from_str(content)
            .map_err(|e| StrategyError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_parses_full_sample() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.feed.reconnect_interval_ms, 3000);
        assert_eq!(config.feed.ping_interval_ms, 30_000);
        assert_eq!(config.indicators.ema_short_period, 3);
        assert_eq!(config.signal.deduplication_window(), Duration::from_secs(60));
        assert_eq!(config.webhook.retry_count, 2);
        assert_eq!(config.webhook.timeout_ms, 10_000);
        assert!(config.webhook.lark.enabled);
        assert!(!config.message_card.include_ema_values);
        assert!(config.message_card.include_timestamp);
        assert_eq!(config.message_card.buttons.len(), 1);
        assert_eq!(config.monitoring.healthcheck_port, 0);
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_stream_names_cover_every_pair() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(
            config.stream_names(),
            vec![
                "btcusdt@kline_1m",
                "btcusdt@kline_5m",
                "ethusdt@kline_1m",
                "ethusdt@kline_5m",
            ]
        );
    }

    #[test]
    fn test_rejects_bad_periods() {
        let mut config = MonitorConfig::default();
        config.indicators.ema_short_period = 26;
        config.indicators.ema_long_period = 26;
        assert!(config.validate().is_err());

        config.indicators.ema_short_period = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_symbols_and_intervals() {
        let mut config = MonitorConfig::default();
        config.symbols.clear();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.intervals.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_webhook_needs_url() {
        let mut config = MonitorConfig::default();
        config.webhook.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(StrategyError::Configuration { .. })
        ));

        let mut config = MonitorConfig::default();
        config.webhook.lark.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let mut config = MonitorConfig::default();
        config.feed.websocket_url = "https://stream.binance.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_attempts_saturate_at_max_retry_count() {
        let mut webhook = WebhookConfig::default();
        assert_eq!(webhook.attempts(), 4);

        webhook.retry_count = 0;
        assert_eq!(webhook.attempts(), 1);

        webhook.retry_count = u32::MAX;
        assert_eq!(webhook.attempts(), u32::MAX);
    }
}
