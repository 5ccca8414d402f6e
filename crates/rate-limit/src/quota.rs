//! Sliding-window request quota, keyed per provider (spec §5 "Concurrency
//! & Resource Model").

use std::num::NonZeroU32;
use std::time::Duration;

use config::SlidingWindowConfig;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Wraps a GCRA rate limiter approximating "at most `max_requests` per
/// `window_secs`" per key. `None` when quota enforcement is disabled.
pub struct QuotaLimiter {
    limiter: Option<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>,
}

impl QuotaLimiter {
    pub fn new(config: &SlidingWindowConfig) -> Self {
        if !config.enabled || config.max_requests == 0 {
            return Self { limiter: None };
        }

        let window = Duration::from_secs(config.window_secs.max(1));
        let period = window / config.max_requests;
        let quota = Quota::with_period(period)
            .expect("non-zero period")
            .allow_burst(NonZeroU32::new(config.max_requests).expect("max_requests checked non-zero above"));

        Self {
            limiter: Some(RateLimiter::keyed(quota)),
        }
    }

    /// Returns `true` if the request for `key` is within quota (and
    /// consumes one unit of it), `false` if it should be rejected.
    pub fn check(&self, key: &str) -> bool {
        match &self.limiter {
            None => true,
            Some(limiter) => limiter.check_key(&key.to_string()).is_ok(),
        }
    }
}
