//! Rate Limiting Infrastructure
//!
//! Common rate limiting abstractions shared by storage backends.
//! Limits are enforced over fixed windows: every request lands in the
//! window containing its timestamp, and the counter resets when the
//! next window begins.

use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

/// Truncate a timestamp to the start of its fixed window
pub fn window_start(now_ms: i64, window_ms: i64) -> i64 {
    (now_ms / window_ms) * window_ms
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Check and increment rate limit counter
    /// Returns (allowed, remaining_requests)
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_window_ms() {
        let config = RateLimitConfig::new(5, 60);
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.window_ms(), 60_000);
    }

    #[test]
    fn test_window_start_truncation() {
        assert_eq!(window_start(0, 60_000), 0);
        assert_eq!(window_start(59_999, 60_000), 0);
        assert_eq!(window_start(60_000, 60_000), 60_000);
        assert_eq!(window_start(125_000, 60_000), 120_000);
    }

    #[test]
    fn test_requests_in_same_window_share_a_start() {
        let window_ms = 3_600_000;
        let a = window_start(1_700_000_123_456, window_ms);
        let b = window_start(1_700_000_999_999, window_ms);
        assert_eq!(a, b);
    }
}
