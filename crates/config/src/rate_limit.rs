//! Target health / cooldown and per-key sliding-window rate accounting
//! (spec §3 "Target Health", §5 "Rate/quota policy").

use serde::Deserialize;

/// Consecutive-failure cooldown policy for a target (spec §3 "Target
/// Health").
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Consecutive failures before a target enters cooldown.
    pub failure_threshold: u32,
    /// Cooldown duration in milliseconds once `failure_threshold` is hit.
    pub cooldown_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 30_000,
        }
    }
}

/// Sliding-window request quota for a target or key (spec §5: "exceeding
/// the window marks the target as temporarily unhealthy without
/// incrementing the hard-failure counter").
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlidingWindowConfig {
    /// Whether quota enforcement is enabled at all.
    pub enabled: bool,
    /// Window width in seconds.
    pub window_secs: u64,
    /// Maximum requests permitted per key within the window.
    pub max_requests: u32,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: 60,
            max_requests: 600,
        }
    }
}

/// Top-level rate/health configuration.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Health/cooldown policy applied to every target.
    pub health: HealthConfig,
    /// Sliding-window quota policy applied per key.
    pub quota: SlidingWindowConfig,
}
