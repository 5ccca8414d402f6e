//! Pipeline error taxonomy (spec §7 "Error handling design") and its
//! mapping onto HTTP status and the inbound protocol's error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::{DecodeError, WireProtocol};
use provider::TransportError;
use router::RouterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed inbound payload: {0}")]
    Decode(#[from] DecodeError),
    #[error("unsupported: {0}")]
    UnsupportedFeature(String),
    #[error("no route available")]
    NoRouteAvailable,
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("upstream rejected ({status}): {body}")]
    UpstreamRejected { status: u16, body: String },
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RouterError> for PipelineError {
    fn from(_: RouterError) -> Self {
        PipelineError::NoRouteAvailable
    }
}

/// Maps the terminal [`TransportError`] from the last attempted candidate
/// onto a [`PipelineError`] (spec §4.6 step 5: "exhausted all candidates
/// → return `ServiceUnavailable` with the last classified error").
impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::AuthFailure { detail } => PipelineError::AuthFailure(detail),
            TransportError::UpstreamRejected { status, body } => PipelineError::UpstreamRejected { status, body },
            TransportError::UpstreamUnreachable { detail } => PipelineError::UpstreamUnreachable(detail),
            TransportError::StreamInterrupted { detail } => PipelineError::StreamInterrupted(detail),
            TransportError::Cancelled => PipelineError::Cancelled,
        }
    }
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Decode(_) => StatusCode::BAD_REQUEST,
            PipelineError::UnsupportedFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::NoRouteAvailable => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            PipelineError::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            PipelineError::UpstreamUnreachable(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::StreamInterrupted(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode_error",
            PipelineError::UnsupportedFeature(_) => "unsupported_feature",
            PipelineError::NoRouteAvailable => "no_route_available",
            PipelineError::AuthFailure(_) => "auth_failure",
            PipelineError::UpstreamRejected { .. } => "upstream_rejected",
            PipelineError::UpstreamUnreachable(_) => "upstream_unreachable",
            PipelineError::StreamInterrupted(_) => "stream_interrupted",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Internal(_) => "internal_error",
        }
    }
}

/// Wraps a [`PipelineError`] with the inbound protocol it must be
/// rendered into (spec §7 "errors are serialized in the inbound
/// protocol's error envelope"). No internal detail beyond the error's own
/// display message leaks into the response body.
pub struct PipelineErrorResponse {
    pub protocol: WireProtocol,
    pub error: PipelineError,
}

impl PipelineErrorResponse {
    pub fn new(protocol: WireProtocol, error: PipelineError) -> Self {
        Self { protocol, error }
    }
}

impl IntoResponse for PipelineErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let message = self.error.to_string();

        let body = match self.protocol {
            WireProtocol::AnthropicMessages => serde_json::json!({
                "type": "error",
                "error": {"type": self.error.code(), "message": message},
            }),
            WireProtocol::OpenAiChat | WireProtocol::OpenAiResponses => serde_json::json!({
                "error": {"message": message, "type": self.error.code(), "code": status.as_u16()},
            }),
        };

        (status, Json(body)).into_response()
    }
}
