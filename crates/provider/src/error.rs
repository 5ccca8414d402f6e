//! Transport error taxonomy (spec §4.2 "Retry & error classification").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// 401/403 from an OAuth-backed target, after one forced refresh and
    /// retry still failed (or no refresh token was available).
    #[error("auth failure: {detail}")]
    AuthFailure { detail: String },
    /// Any other non-retryable 4xx.
    #[error("upstream rejected ({status}): {body}")]
    UpstreamRejected { status: u16, body: String },
    /// Retryable classes (429/5xx/network/timeout) exhausted `maxRetries`.
    #[error("upstream unreachable: {detail}")]
    UpstreamUnreachable { detail: String },
    /// A stream failed after at least one chunk was already forwarded.
    #[error("stream interrupted: {detail}")]
    StreamInterrupted { detail: String },
    /// The caller's cancellation signal fired mid-request.
    #[error("cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether this class of failure is retried by [`crate::retry::execute`]
    /// (spec §4.2: 429/5xx and network/timeout are retryable; everything
    /// else is fatal for the attempt that produced it).
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::UpstreamUnreachable { .. })
    }
}

/// Lets [`crate::retry::execute`] stay generic over the error type while
/// still asking "should this attempt be retried?".
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        TransportError::is_retryable(self)
    }
}

/// Classifies an HTTP status code into the retry/fatal buckets spec §4.2
/// defines, given the response body already read to a string.
pub fn classify_status(status: u16, body: String) -> TransportError {
    match status {
        429 | 500..=599 => TransportError::UpstreamUnreachable {
            detail: format!("status {status}: {body}"),
        },
        401 | 403 => TransportError::AuthFailure { detail: body },
        _ => TransportError::UpstreamRejected { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_classify_as_retryable_unreachable() {
        let err = classify_status(503, "overloaded".to_string());
        assert!(err.is_retryable());
        assert!(matches!(err, TransportError::UpstreamUnreachable { .. }));
    }

    #[test]
    fn too_many_requests_is_retryable() {
        assert!(classify_status(429, String::new()).is_retryable());
    }

    #[test]
    fn unauthorized_is_auth_failure_not_retryable() {
        let err = classify_status(401, "bad key".to_string());
        assert!(!err.is_retryable());
        assert!(matches!(err, TransportError::AuthFailure { .. }));
    }

    #[test]
    fn other_client_errors_are_fatal_upstream_rejected() {
        let err = classify_status(400, "bad request".to_string());
        assert!(!err.is_retryable());
        assert!(matches!(err, TransportError::UpstreamRejected { status: 400, .. }));
    }
}
