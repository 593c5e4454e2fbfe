//! Shared types, error model, and configuration for ScoutAI.
//!
//! This crate is the foundation depended on by all other ScoutAI crates.
//! It provides:
//! - [`ScoutError`]: the unified error type
//! - Domain types ([`RawResponse`], [`Document`], [`ForecastSeries`], [`Message`])
//! - Configuration ([`AppConfig`], [`NormalizeOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, NormalizeOptions, NormalizerConfig, RenderConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{Result, ScoutError};
pub use types::{Document, Forecast, ForecastPoint, ForecastSeries, Message, RawResponse, Role};
