//! Environment-driven configuration loading shared by every crate that
//! needs it, following the `config` crate + serde-default pattern used
//! throughout this workspace.

use serde::de::DeserializeOwned;

/// Build a `T` from environment variables (`config::Environment::default()`),
/// the same loader shape used by every per-crate `*Config::from_env()`.
pub fn load_from_env<T: DeserializeOwned>() -> Result<T, config::ConfigError> {
    let cfg = config::Config::builder()
        .add_source(config::Environment::default())
        .build()?;
    cfg.try_deserialize()
}

/// Shared retry/backoff parameters for the one external-fetch path in the
/// system (liquidity provider inventory refresh). Exponential backoff with a
/// multiplicative jitter ceiling, mirroring this workspace's existing
/// Horizon-client retry policy.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (0-indexed), capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let scaled = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay_ms as f64);
        std::time::Duration::from_millis(capped as u64)
    }

    /// Whether an HTTP status code is worth retrying: `408, 425, 429, 5xx`.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 425 | 429) || (500..600).contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(retry.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(retry.delay_for_attempt(2).as_millis(), 400);
        assert_eq!(retry.delay_for_attempt(10).as_millis(), 1_000);
    }

    #[test]
    fn retryable_status_matches_spec_set() {
        assert!(RetryConfig::is_retryable_status(429));
        assert!(RetryConfig::is_retryable_status(503));
        assert!(!RetryConfig::is_retryable_status(404));
        assert!(!RetryConfig::is_retryable_status(400));
    }
}
