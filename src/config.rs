//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds used when callers do not pass one
    pub default_ttl: u64,
    /// Expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Background event drain interval in seconds, None = drain only on demand
    pub event_drain_interval: Option<u64>,
    /// Maximum events inspected per background drain
    pub event_drain_batch: usize,
    /// Failed deliveries before an event is dead-lettered, None = retry forever
    pub max_event_attempts: Option<u32>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 3600)
    /// - `EVENT_DRAIN_INTERVAL` - Background drain frequency in seconds, 0 disables (default: 0)
    /// - `EVENT_DRAIN_BATCH` - Events per background drain (default: 100)
    /// - `MAX_EVENT_ATTEMPTS` - Deliveries before dead-lettering, 0 = unlimited (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval).max(1),
            event_drain_interval: Some(env_or("EVENT_DRAIN_INTERVAL", 0u64)).filter(|&s| s > 0),
            event_drain_batch: env_or("EVENT_DRAIN_BATCH", defaults.event_drain_batch),
            max_event_attempts: Some(env_or("MAX_EVENT_ATTEMPTS", 5u32)).filter(|&n| n > 0),
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
            default_ttl: 3600,
            sweep_interval: 3600,
            event_drain_interval: None,
            event_drain_batch: 100,
            max_event_attempts: Some(5),
        }
    }
}
