//! Outbound HTTP transport (spec §4.2): one generic transport configured
//! per call by endpoint and auth, owning retry/backoff and the one-shot
//! forced-refresh-then-retry loop on 401/403 against OAuth-backed targets.

mod auth;
mod client;
mod error;
mod retry;
mod transport;

pub use auth::{AuthHeaders, AuthRefresher, NoRefresh};
pub use error::{IsRetryable, TransportError, classify_status};
pub use retry::execute as execute_with_retry;
pub use transport::{HttpTransport, TransportRequest, UpstreamBody, endpoint_suffix};
