//! OAuth error taxonomy (spec §4.4, §7 `AuthFailure`).

use thiserror::Error;

/// Failure modes the lifecycle manager can surface from [`crate::OAuthManager::get_token`],
/// [`crate::OAuthManager::invalidate`], and [`crate::OAuthManager::revoke`].
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No token file exists for a `static` alias; static tokens are loaded
    /// once at startup and never acquired interactively (spec §4.4 "Alias
    /// semantics").
    #[error("no token file for static alias {0:?}")]
    NoStaticToken(String),
    /// A token file exists but failed to parse against the schema in spec
    /// §6 "OAuth token file schema".
    #[error("invalid token file {path}: {detail}")]
    InvalidTokenFile { path: String, detail: String },
    /// Filesystem error reading, writing, or renaming a token file.
    #[error("token file io error: {0}")]
    Io(#[from] std::io::Error),
    /// The device-authorization or token endpoint returned a transport-level
    /// failure (connection refused, timeout, non-JSON body).
    #[error("oauth http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The token endpoint rejected the refresh or code exchange with an
    /// OAuth `error` field (e.g. `invalid_grant`).
    #[error("refresh failed: {0}")]
    RefreshFailed(String),
    /// A cached token expired and no refresh token is on file, but the
    /// caller has not allowed an interactive flow to start.
    #[error("no interactive flow allowed and no refresh token available")]
    NoInteractiveStartAllowed,
    /// The user never completed the portal/callback round trip within the
    /// 10-minute window (spec §4.4 "Device-code portal coordination").
    #[error("device code flow timed out")]
    DeviceCodeTimedOut,
    /// The upstream authorization server reported the flow as denied or
    /// expired before the callback arrived.
    #[error("device code flow failed: {0}")]
    DeviceCodeFailed(String),
    /// The record was explicitly revoked and has no path back to VALID
    /// without a fresh interactive flow.
    #[error("token record revoked")]
    Revoked,
}
