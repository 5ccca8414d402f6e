//! The per-request envelope threaded through the pipeline (spec §3
//! "Request Context"): owned exclusively by the orchestrator for the
//! request's duration, carrying identity, routing decisions, and the
//! cancellation signal.

pub mod authentication;
pub mod client_identity;

use config::RouteCategory;
use jiff::Timestamp;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use authentication::{AUTHORIZATION_HEADER, Authentication, UPSTREAM_AUTHORIZATION_OVERRIDE_HEADER, extract};
pub use client_identity::ClientIdentity;

/// Which wire protocol the inbound request arrived on, and therefore which
/// protocol the final response must be encoded back into (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundProtocol {
    OpenAiChat,
    OpenAiResponses,
    AnthropicMessages,
}

/// `{requestId, inboundProtocol, startTime, routeCategory, selectedTarget,
/// attempt, cancellationSignal}` (spec §3). Mutable fields are only ever
/// touched by the orchestrator that owns this context; nothing else holds
/// a reference to it.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub inbound_protocol: InboundProtocol,
    pub start_time: Timestamp,
    pub client_identity: Option<ClientIdentity>,
    pub route_category: Option<RouteCategory>,
    pub selected_target: Option<String>,
    pub attempt: u32,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(inbound_protocol: InboundProtocol, client_identity: Option<ClientIdentity>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            inbound_protocol,
            start_time: Timestamp::now(),
            client_identity,
            route_category: None,
            selected_target: None,
            attempt: 0,
            cancellation: CancellationToken::new(),
        }
    }

    /// Elapsed wall-clock time since this context was created, for request
    /// duration logging.
    pub fn elapsed_ms(&self) -> i64 {
        Timestamp::now().since(self.start_time).map(|span| span.get_milliseconds()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_starts_at_attempt_zero_with_no_target() {
        let ctx = RequestContext::new(InboundProtocol::OpenAiChat, None);
        assert_eq!(ctx.attempt, 0);
        assert!(ctx.selected_target.is_none());
        assert!(!ctx.cancellation.is_cancelled());
    }

    #[test]
    fn elapsed_ms_is_non_negative_immediately_after_creation() {
        let ctx = RequestContext::new(InboundProtocol::AnthropicMessages, None);
        assert!(ctx.elapsed_ms() >= 0);
    }
}
