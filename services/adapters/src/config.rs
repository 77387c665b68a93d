//! Feed connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AdapterError, Result};

/// Default capacity of the bounded queues between pipeline stages
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Settings for the kline WebSocket feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base WebSocket URL; the stream list is appended as a query
    pub websocket_url: String,

    /// Fixed wait before every reconnection attempt
    pub reconnect_interval_ms: u64,

    /// Protocol-level ping period while connected
    pub ping_interval_ms: u64,

    /// Upper bound on a single handshake
    pub connect_timeout_ms: u64,

    /// Capacity of the raw frame queue
    pub queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            websocket_url: "wss://stream.binance.com:9443/stream".to_string(),
            reconnect_interval_ms: 5_000,
            ping_interval_ms: 30_000,
            connect_timeout_ms: 10_000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl FeedConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.websocket_url.starts_with("ws://") && !self.websocket_url.starts_with("wss://") {
            return Err(AdapterError::Configuration(format!(
                "WebSocket URL must start with ws:// or wss://, got '{}'",
                self.websocket_url
            )));
        }

        if self.reconnect_interval_ms == 0 {
            return Err(AdapterError::Configuration(
                "reconnect_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.ping_interval_ms == 0 {
            return Err(AdapterError::Configuration(
                "ping_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(AdapterError::Configuration(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
