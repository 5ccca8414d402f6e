//! Per-target failure tracking and cooldown (spec §3 "Target Health",
//! §4.5 candidate filtering).

use std::time::{Duration, Instant};

use config::HealthConfig;
use dashmap::DashMap;

/// Identifies a single routable target for health-tracking purposes.
/// Deliberately coarser than a provider target descriptor (no `key_id`):
/// a failing key usually means the whole provider/model pair is down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub provider_id: String,
    pub model_id: String,
}

impl TargetKey {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    consecutive_failures: u32,
    unhealthy_until: Option<Instant>,
}

/// Tracks consecutive-failure counts per target and puts a target into a
/// cooldown window once `failure_threshold` consecutive failures are
/// observed. A target is probed again (half-open) as soon as the
/// cooldown elapses; a fresh failure immediately re-arms the cooldown.
#[derive(Debug)]
pub struct HealthTracker {
    config: HealthConfig,
    entries: DashMap<TargetKey, Entry>,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// `true` when the target currently has no active cooldown.
    pub fn is_healthy(&self, key: &TargetKey) -> bool {
        match self.entries.get(key) {
            Some(entry) => match entry.unhealthy_until {
                Some(until) => Instant::now() >= until,
                None => true,
            },
            None => true,
        }
    }

    pub fn record_success(&self, key: &TargetKey) {
        self.entries.remove(key);
    }

    pub fn record_failure(&self, key: &TargetKey) {
        let mut entry = self.entries.entry(key.clone()).or_default();
        entry.consecutive_failures += 1;

        if entry.consecutive_failures >= self.config.failure_threshold {
            entry.unhealthy_until = Some(Instant::now() + Duration::from_millis(self.config.cooldown_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, cooldown_ms: u64) -> HealthConfig {
        HealthConfig {
            failure_threshold: threshold,
            cooldown_ms,
        }
    }

    #[test]
    fn healthy_until_threshold_reached() {
        let tracker = HealthTracker::new(config(3, 30_000));
        let key = TargetKey::new("openai", "gpt-4");

        assert!(tracker.is_healthy(&key));
        tracker.record_failure(&key);
        tracker.record_failure(&key);
        assert!(tracker.is_healthy(&key), "below threshold should stay healthy");

        tracker.record_failure(&key);
        assert!(!tracker.is_healthy(&key), "threshold reached should open cooldown");
    }

    #[test]
    fn success_clears_failure_count() {
        let tracker = HealthTracker::new(config(3, 30_000));
        let key = TargetKey::new("openai", "gpt-4");

        tracker.record_failure(&key);
        tracker.record_failure(&key);
        tracker.record_success(&key);
        tracker.record_failure(&key);
        tracker.record_failure(&key);
        assert!(tracker.is_healthy(&key), "success should have reset the streak");
    }

    #[test]
    fn cooldown_expires_immediately_with_zero_duration() {
        let tracker = HealthTracker::new(config(1, 0));
        let key = TargetKey::new("openai", "gpt-4");

        tracker.record_failure(&key);
        assert!(tracker.is_healthy(&key), "zero-length cooldown should already be over");
    }
}
