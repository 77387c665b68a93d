//! Crossover signals and the composite keys of the per-pair tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a confirmed EMA crossover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Short EMA crossed above the long EMA with price above the long EMA
    Bullish,
    /// Short EMA crossed below the long EMA with price below the long EMA
    Bearish,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Bullish => "bullish",
            SignalType::Bearish => "bearish",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crossover event handed from the detector to the dedup filter and the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub symbol: String,
    pub interval: String,
    /// Price of the tick that produced the crossover
    pub price: f64,
    /// Projected (uncommitted) short EMA at that tick
    pub short_ema: f64,
    /// Projected (uncommitted) long EMA at that tick
    pub long_ema: f64,
    /// Wall-clock time of detection
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            signal_type: self.signal_type,
        }
    }
}

/// (symbol, interval) key of per-pair indicator state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub symbol: String,
    pub interval: String,
}

impl PairKey {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.interval)
    }
}

/// (symbol, interval, signal type) key of the duplicate-suppression table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub symbol: String,
    pub interval: String,
    pub signal_type: SignalType,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.interval, self.signal_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_separates_signal_types() {
        let bull = DedupKey {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            signal_type: SignalType::Bullish,
        };
        let bear = DedupKey {
            signal_type: SignalType::Bearish,
            ..bull.clone()
        };
        assert_ne!(bull, bear);
        assert_eq!(bull.to_string(), "BTCUSDT/1m/bullish");
    }
}
