use http::HeaderMap;
use secrecy::SecretString;

use crate::client_identity::ClientIdentity;

/// Header carrying the inbound bearer credential (spec §6).
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header overriding the monitor-configured upstream credential for this
/// request only (spec §6).
pub const UPSTREAM_AUTHORIZATION_OVERRIDE_HEADER: &str = "x-rcc-upstream-authorization";

/// Inbound authentication material extracted from request headers.
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    /// Bearer token from `Authorization`, if present.
    pub bearer_token: Option<SecretString>,
    /// Per-request upstream credential override.
    pub upstream_override: Option<SecretString>,
    /// Derived client identity, used for rate accounting.
    pub client_identity: Option<ClientIdentity>,
}

/// Extract [`Authentication`] from inbound request headers.
pub fn extract(headers: &HeaderMap) -> Authentication {
    let bearer_token = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| SecretString::from(token.to_string()));

    let upstream_override = headers
        .get(UPSTREAM_AUTHORIZATION_OVERRIDE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| SecretString::from(value.to_string()));

    let client_identity = bearer_token.as_ref().map(|token| ClientIdentity {
        client_id: fingerprint(token),
    });

    Authentication {
        bearer_token,
        upstream_override,
        client_identity,
    }
}

/// A stable, non-reversible identifier for a credential, safe to log.
fn fingerprint(token: &SecretString) -> String {
    use secrecy::ExposeSecret;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    token.expose_secret().hash(&mut hasher);
    format!("client-{:016x}", hasher.finish())
}
