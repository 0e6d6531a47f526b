//! Application configuration model.
//!
//! All fields are serde-defaulted so a partial YAML file or a bare
//! environment override merges cleanly over the programmatic defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub delivery: DeliveryConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".hearth/hearth.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error.
    pub level: String,
    /// One of: json, pretty.
    pub format: String,
    /// Optional directory for daily-rotated JSON log files.
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Seconds between delivery ticks.
    pub interval_secs: u64,
    /// Maximum nudges delivered per tick.
    pub batch_size: usize,
    /// Hours of the per-kind enqueue throttle window.
    pub throttle_window_hours: i64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            batch_size: 10,
            throttle_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Seconds between idle-bucket sweeps.
    pub cleanup_interval_secs: u64,
    /// Seconds a bucket may sit idle before being swept.
    pub idle_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 300,
            idle_window_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.delivery.interval_secs, 3600);
        assert_eq!(config.delivery.batch_size, 10);
        assert_eq!(config.delivery.throttle_window_hours, 24);
        assert_eq!(config.rate_limit.idle_window_secs, 1800);
        assert_eq!(config.logging.level, "info");
    }
}
