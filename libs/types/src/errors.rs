//! Error types for value conversion

use thiserror::Error;

/// The close price of a candle could not be turned into a usable number
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceParseError {
    /// Not a decimal number at all
    #[error("Invalid close price '{raw}' for {symbol}/{interval}")]
    Malformed {
        symbol: String,
        interval: String,
        raw: String,
    },

    /// Parsed, but NaN or infinite
    #[error("Close price '{raw}' for {symbol}/{interval} is not finite")]
    NotFinite {
        symbol: String,
        interval: String,
        raw: String,
    },
}
