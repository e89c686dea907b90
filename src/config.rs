//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::executor::ExecutorConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of independently locked cache shards
    pub stripe_count: usize,
    /// Total cache capacity in bytes, split evenly between shards
    pub max_size: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Workers kept alive when idle
    pub low_watermark: usize,
    /// Maximum number of workers
    pub high_watermark: usize,
    /// Pending requests accepted before new ones are rejected
    pub max_queue_size: usize,
    /// Idle time in milliseconds before a surplus worker retires
    pub idle_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STRIPE_COUNT` - Number of cache shards (default: 4)
    /// - `MAX_SIZE` - Total cache size in bytes (default: 64 MiB)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `LOW_WATERMARK` - Minimum worker threads (default: 2)
    /// - `HIGH_WATERMARK` - Maximum worker threads (default: 8)
    /// - `MAX_QUEUE_SIZE` - Maximum pending requests (default: 256)
    /// - `IDLE_TIMEOUT_MS` - Worker idle timeout in ms (default: 5000)
    ///
    /// Unset or unparsable variables fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stripe_count: env_or("STRIPE_COUNT", defaults.stripe_count),
            max_size: env_or("MAX_SIZE", defaults.max_size),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            low_watermark: env_or("LOW_WATERMARK", defaults.low_watermark),
            high_watermark: env_or("HIGH_WATERMARK", defaults.high_watermark),
            max_queue_size: env_or("MAX_QUEUE_SIZE", defaults.max_queue_size),
            idle_timeout_ms: env_or("IDLE_TIMEOUT_MS", defaults.idle_timeout_ms),
        }
    }

    /// Thread pool settings derived from this configuration.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            name: "cache-worker".to_string(),
            low_watermark: self.low_watermark,
            high_watermark: self.high_watermark,
            max_queue_size: self.max_queue_size,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stripe_count: 4,
            max_size: 64 * 1024 * 1024,
            server_port: 3000,
            low_watermark: 2,
            high_watermark: 8,
            max_queue_size: 256,
            idle_timeout_ms: 5000,
        }
    }
}
