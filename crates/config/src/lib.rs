//! RouteCodex configuration structures mapping `config.json`/`config.toml`
//! (spec §6 "On-disk state layout"). Every provider quirk lives in data
//! here, not in branching code downstream (spec §9 "Configuration-first
//! discipline").

#![deny(missing_docs)]

mod error;
mod headers;
mod loader;
mod oauth;
mod providers;
mod rate_limit;
mod routing;
mod server;
mod telemetry;

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

pub use error::Error;
pub use headers::{
    HeaderForward, HeaderInsert, HeaderRemove, HeaderRenameDuplicate, HeaderRule, NameOrPattern, NamePattern,
};
pub use oauth::{OAuthManagerConfig, OAuthProviderConfig};
pub use providers::{ApiKeyConfig, AuthConfig, ModelEntryConfig, ProviderConfig, ProviderType, DEFAULT_MAX_CONTEXT_TOKENS};
pub use rate_limit::{HealthConfig, RateLimitConfig, SlidingWindowConfig};
pub use routing::{DirectivePrecedence, RouteCategory, RoutePoolConfig, RoutingConfig};
pub use server::ServerConfig;
pub use telemetry::LoggingConfig;

/// Top-level RouteCodex configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration (spec §6 inbound endpoints).
    pub server: ServerConfig,
    /// Configured upstream providers, keyed by provider id.
    pub providers: IndexMap<String, ProviderConfig>,
    /// Virtual router configuration (spec §4.5).
    pub routing: RoutingConfig,
    /// OAuth lifecycle manager configuration (spec §4.4).
    pub oauth: OAuthManagerConfig,
    /// Per-target rate accounting / health cooldown configuration (spec §5).
    pub rate_limit: RateLimitConfig,
    /// Structured logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file path, expanding `${ENV}` references
    /// and validating cross-field invariants.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validate that the configuration has at least one usable provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_has_providers(self)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config.providers, @"{}");
        assert_eq!(config.routing.long_context_threshold_tokens, 180_000);
        assert_eq!(config.oauth.portal_port, 8080);
    }
}
