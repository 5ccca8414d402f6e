//! HTTP server configuration (spec §6 "External Interfaces").

use std::net::SocketAddr;

use serde::Deserialize;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on. Defaults to
    /// `0.0.0.0:8000`; overridable by the `PORT`/`HOST` environment
    /// variables at the binary layer (spec §6).
    pub listen_address: Option<SocketAddr>,
    /// Path of the liveness endpoint (spec §6, default `/health`).
    pub health_path: String,
    /// Path of the operational-counters endpoint (spec §6, default
    /// `/status`).
    pub status_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            health_path: "/health".to_string(),
            status_path: "/status".to_string(),
        }
    }
}
