//! Service Configuration Settings
//!
//! Configuration types for the price stream, loaded from environment
//! variables. Feed behavior (symbol, thresholds, offsets, timing, retry
//! budget) is fixed and not part of this surface.

use crate::infrastructure::broadcast::DEFAULT_CAPACITY;
use crate::infrastructure::generator::BATCH_SIZE;

/// HTTP server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// HTTP port for `/stream`, `/price`, health and metrics routes.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Items a subscriber may fall behind before it starts skipping.
    pub capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Feed pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    /// Run the asynchronous enrichment step after the synchronous transform.
    pub enrichment: bool,
    /// Maximum concurrent enrichments.
    pub enrichment_concurrency: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            enrichment: false,
            enrichment_concurrency: BATCH_SIZE,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Server settings.
    pub server: ServerSettings,
    /// Broadcast hub settings.
    pub broadcast: BroadcastSettings,
    /// Feed pipeline settings.
    pub feed: FeedSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a setting has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults; values that parse
    /// but are out of range are rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if a capacity or concurrency setting is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server = ServerSettings {
            http_port: parse_or(&lookup, "PRICE_STREAM_HTTP_PORT", defaults.server.http_port),
        };

        let broadcast = BroadcastSettings {
            capacity: parse_or(
                &lookup,
                "PRICE_STREAM_BROADCAST_CAPACITY",
                defaults.broadcast.capacity,
            ),
        };
        if broadcast.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PRICE_STREAM_BROADCAST_CAPACITY".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let feed = FeedSettings {
            enrichment: lookup("PRICE_STREAM_ENRICHMENT")
                .map_or(defaults.feed.enrichment, |v| parse_bool(&v)),
            enrichment_concurrency: parse_or(
                &lookup,
                "PRICE_STREAM_ENRICHMENT_CONCURRENCY",
                defaults.feed.enrichment_concurrency,
            ),
        };
        if feed.enrichment_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PRICE_STREAM_ENRICHMENT_CONCURRENCY".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            server,
            broadcast,
            feed,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has a value outside its valid range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.broadcast.capacity, 1024);
        assert!(!config.feed.enrichment);
        assert_eq!(config.feed.enrichment_concurrency, 5);
    }

    #[test]
    fn reads_all_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PRICE_STREAM_HTTP_PORT", "9000"),
            ("PRICE_STREAM_BROADCAST_CAPACITY", "16"),
            ("PRICE_STREAM_ENRICHMENT", "TRUE"),
            ("PRICE_STREAM_ENRICHMENT_CONCURRENCY", "2"),
        ]))
        .unwrap();

        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.broadcast.capacity, 16);
        assert!(config.feed.enrichment);
        assert_eq!(config.feed.enrichment_concurrency, 2);
    }

    #[test]
    fn unparseable_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PRICE_STREAM_HTTP_PORT", "not-a-port"),
            ("PRICE_STREAM_BROADCAST_CAPACITY", "-3"),
            ("PRICE_STREAM_ENRICHMENT", "maybe"),
        ]))
        .unwrap();

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err =
            AppConfig::from_lookup(lookup_from(&[("PRICE_STREAM_BROADCAST_CAPACITY", "0")]))
                .unwrap_err();
        assert!(err.to_string().contains("PRICE_STREAM_BROADCAST_CAPACITY"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "PRICE_STREAM_ENRICHMENT_CONCURRENCY",
            "0",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PRICE_STREAM_ENRICHMENT_CONCURRENCY"));
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" On "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }
}
