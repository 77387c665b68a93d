//! Error types for the EMA crossover strategy

use thiserror::Error;
use types::PriceParseError;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] PriceParseError),

    #[error("Feed error: {0}")]
    Feed(#[from] feed_adapter::AdapterError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Webhook delivery failed for {url}: {message}")]
    Delivery { url: String, message: String },
}

impl StrategyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        StrategyError::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrategyError>;
