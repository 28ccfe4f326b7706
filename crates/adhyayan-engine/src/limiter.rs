//! Per-provider request throttling.
//!
//! Fixed-window counter: each provider key gets a window of `window_secs`
//! during which at most `max_requests_per_window` requests are admitted.
//! Bursts straddling a window boundary are accepted behavior of this scheme,
//! not something the limiter tries to smooth out.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::RateConfig;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    started_at: Instant,
}

pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            limit: config.max_requests_per_window,
            window: Duration::from_secs(config.window_secs),
            clock,
        }
    }

    /// Admit one request for `provider` if its window has budget left.
    /// A window whose duration has fully elapsed is reset before counting.
    pub fn try_consume(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let mut entry = self
            .windows
            .entry(provider.to_string())
            .or_insert(RateWindow {
                count: 0,
                started_at: now,
            });

        if now.duration_since(entry.started_at) >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        if entry.count < self.limit {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Requests left in the provider's current window.
    pub fn remaining(&self, provider: &str) -> u32 {
        let now = self.clock.now();
        match self.windows.get(provider) {
            Some(entry) if now.duration_since(entry.started_at) < self.window => {
                self.limit.saturating_sub(entry.count)
            }
            _ => self.limit,
        }
    }

    /// Time until the provider's current window rolls over.
    pub fn retry_after(&self, provider: &str) -> Duration {
        let now = self.clock.now();
        match self.windows.get(provider) {
            Some(entry) => {
                let elapsed = now.duration_since(entry.started_at);
                self.window.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    /// Number of tracked provider windows (for monitoring).
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32, clock: Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(
            &RateConfig {
                window_secs: 60,
                max_requests_per_window: limit,
            },
            clock,
        )
    }

    #[test]
    fn test_allows_up_to_limit() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(3, clock);

        assert!(limiter.try_consume("gemini"));
        assert!(limiter.try_consume("gemini"));
        assert!(limiter.try_consume("gemini"));
        assert!(!limiter.try_consume("gemini"));
    }

    #[test]
    fn test_window_reset_readmits() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(2, clock.clone());

        assert!(limiter.try_consume("gemini"));
        assert!(limiter.try_consume("gemini"));
        assert!(!limiter.try_consume("gemini"));

        clock.advance(Duration::from_secs(60));
        assert!(limiter.try_consume("gemini"));
    }

    #[test]
    fn test_providers_have_independent_windows() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(1, clock);

        assert!(limiter.try_consume("gemini"));
        assert!(!limiter.try_consume("gemini"));
        assert!(limiter.try_consume("openrouter"));
        assert_eq!(limiter.window_count(), 2);
    }

    #[test]
    fn test_remaining_reflects_consumption() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(5, clock.clone());

        assert_eq!(limiter.remaining("gemini"), 5);
        limiter.try_consume("gemini");
        limiter.try_consume("gemini");
        assert_eq!(limiter.remaining("gemini"), 3);

        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.remaining("gemini"), 5);
    }

    #[test]
    fn test_retry_after_shrinks_as_window_ages() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(1, clock.clone());

        limiter.try_consume("gemini");
        assert_eq!(limiter.retry_after("gemini"), Duration::from_secs(60));

        clock.advance(Duration::from_secs(45));
        assert_eq!(limiter.retry_after("gemini"), Duration::from_secs(15));
    }
}
