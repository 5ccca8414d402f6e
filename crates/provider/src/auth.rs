//! Auth header material handed to a transport by the orchestrator, and the
//! refresh hook that lets a transport recover from a 401/403 against an
//! OAuth-backed target without knowing anything about OAuth itself (spec
//! §4.2: "one forced token refresh ... and one retry").

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::TransportError;

/// The exact header set a target's auth descriptor prescribes (spec §4.2
/// "bearer API key, or bearer OAuth access token, or provider-specific
/// composite headers").
#[derive(Clone, Default)]
pub struct AuthHeaders {
    /// Sent as `Authorization: Bearer {token}` when present.
    pub bearer: Option<SecretString>,
    /// Additional fixed headers a provider profile requires (e.g. Qwen
    /// OAuth's `User-Agent`/`X-Goog-Api-Client`/`Client-Metadata` trio).
    pub extra: Vec<(String, String)>,
}

impl AuthHeaders {
    pub fn bearer(token: SecretString) -> Self {
        Self { bearer: Some(token), extra: Vec::new() }
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }
}

/// Lets a transport force a credential refresh after a 401/403 against an
/// OAuth-backed target, without depending on the `oauth` crate. The
/// pipeline orchestrator supplies the concrete implementation, backed by
/// the OAuth lifecycle manager's `getToken(forceRefresh: true)`.
#[async_trait]
pub trait AuthRefresher: Send + Sync {
    async fn refresh(&self) -> Result<AuthHeaders, TransportError>;
}

/// A refresher for targets with no refresh path (static API keys): the
/// forced-refresh-then-retry step is a no-op and the original 401/403
/// surfaces immediately as `AuthFailure`.
pub struct NoRefresh;

#[async_trait]
impl AuthRefresher for NoRefresh {
    async fn refresh(&self) -> Result<AuthHeaders, TransportError> {
        Err(TransportError::AuthFailure {
            detail: "target has no refresh path".to_string(),
        })
    }
}
