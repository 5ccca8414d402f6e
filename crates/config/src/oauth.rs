//! OAuth lifecycle manager configuration (spec §4.4, §6 "On-disk state
//! layout").

use std::path::PathBuf;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

/// Device-code flow endpoints and client identity for one provider type
/// that supports OAuth.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthProviderConfig {
    /// RFC 8628 device authorization endpoint.
    pub device_authorization_url: String,
    /// Token endpoint used for both the device-code exchange and refresh.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret, if the provider requires one.
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    /// Requested scope string.
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth lifecycle manager configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthManagerConfig {
    /// Directory token files are persisted under (spec §6, default
    /// `~/.routecodex/auth`).
    pub token_dir: PathBuf,
    /// Port the ephemeral OAuth callback listener binds to (spec §4.4,
    /// default 8080).
    pub portal_port: u16,
    /// Path of the callback listener (spec §4.4, default
    /// `/oauth2callback`).
    pub callback_path: String,
    /// Device-code-pending timeout in seconds before the record moves to
    /// `REVOKED` (spec §4.4, default 600 = 10 minutes).
    pub device_code_timeout_secs: u64,
    /// Readiness-probe polling interval in milliseconds and max attempts
    /// before prompting the user (spec §4.4: `poll ≤ 15×200ms = 3s`).
    pub portal_readiness_poll_ms: u64,
    /// Max readiness-probe attempts.
    pub portal_readiness_max_polls: u32,
    /// Per-provider-type OAuth endpoints and client identity.
    pub providers: IndexMap<String, OAuthProviderConfig>,
}

impl Default for OAuthManagerConfig {
    fn default() -> Self {
        Self {
            token_dir: default_token_dir(),
            portal_port: 8080,
            callback_path: "/oauth2callback".to_string(),
            device_code_timeout_secs: 600,
            portal_readiness_poll_ms: 200,
            portal_readiness_max_polls: 15,
            providers: IndexMap::new(),
        }
    }
}

fn default_token_dir() -> PathBuf {
    dirs_home().join(".routecodex").join("auth")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}
