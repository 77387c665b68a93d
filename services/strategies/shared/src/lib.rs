//! Shared Service Framework
//!
//! Common utilities for monitor services: TOML config loading with environment
//! helpers, tracing setup, and the atomic counters the pipeline reports through.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::*;
pub use logging::*;
pub use metrics::*;
