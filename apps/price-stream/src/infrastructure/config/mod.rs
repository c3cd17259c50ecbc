//! Configuration Module
//!
//! Configuration loading for the price stream service.

mod settings;

pub use settings::{AppConfig, BroadcastSettings, ConfigError, FeedSettings, ServerSettings};
