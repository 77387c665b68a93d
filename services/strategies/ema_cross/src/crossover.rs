//! EMA crossover classification

use serde::{Deserialize, Serialize};
use types::SignalType;

/// Result of comparing two EMA snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crossover {
    None,
    Bullish,
    Bearish,
}

impl Crossover {
    pub fn signal_type(self) -> Option<SignalType> {
        match self {
            Crossover::None => None,
            Crossover::Bullish => Some(SignalType::Bullish),
            Crossover::Bearish => Some(SignalType::Bearish),
        }
    }
}

/// Classify the move from `(prev_short, prev_long)` to `(curr_short, curr_long)`.
///
/// All comparisons are strict and the price must sit on the breakout side of the
/// current long EMA.
pub fn cross(
    prev_short: f64,
    prev_long: f64,
    curr_short: f64,
    curr_long: f64,
    price: f64,
) -> Crossover {
    if prev_short < prev_long && curr_short > curr_long && price > curr_long {
        Crossover::Bullish
    } else if prev_short > prev_long && curr_short < curr_long && price < curr_long {
        Crossover::Bearish
    } else {
        Crossover::None
    }
}
