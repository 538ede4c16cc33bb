//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::store::RetryPolicy;

/// HTTP port; fixed, not read from the environment
pub const SERVER_PORT: u16 = 3000;

// == Store Backend ==
/// Which store implementation the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Remote Redis server at `redis_url`
    #[default]
    Redis,
    /// In-process map, lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "Unknown store backend: {}. Valid backends: redis, memory",
                other
            )),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string of the Redis server
    pub redis_url: String,
    /// Store implementation to use
    pub backend: StoreBackend,
    /// Directory holding `favicon.ico` and `counter.js`
    pub static_dir: PathBuf,
    /// Reconnection policy for the store connection
    pub retry: RetryPolicy,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Store connection string (default: redis://localhost:6379)
    /// - `STORE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `STATIC_DIR` - Static asset directory (default: views)
    /// - `REDIS_RETRY_REFUSED_DELAY_MS` - Delay after a refused connection (default: 5000)
    /// - `REDIS_RETRY_STEP_MS` - Per-attempt backoff step (default: 100)
    /// - `REDIS_RETRY_MAX_DELAY_MS` - Backoff cap (default: 3000)
    /// - `REDIS_RETRY_MAX_TOTAL_MS` - Give up after this much retrying (default: 3600000)
    /// - `REDIS_RETRY_MAX_ATTEMPTS` - Give up after this many attempts (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryPolicy {
            refused_delay: env_millis("REDIS_RETRY_REFUSED_DELAY_MS")
                .unwrap_or(defaults.retry.refused_delay),
            step: env_millis("REDIS_RETRY_STEP_MS").unwrap_or(defaults.retry.step),
            max_delay: env_millis("REDIS_RETRY_MAX_DELAY_MS").unwrap_or(defaults.retry.max_delay),
            max_total: env_millis("REDIS_RETRY_MAX_TOTAL_MS").unwrap_or(defaults.retry.max_total),
            max_attempts: env_parse("REDIS_RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry.max_attempts),
        };

        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            backend: env_parse("STORE_BACKEND").unwrap_or(defaults.backend),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            retry,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            backend: StoreBackend::Redis,
            static_dir: PathBuf::from("views"),
            retry: RetryPolicy::default(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}
