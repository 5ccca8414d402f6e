//! Shared `reqwest::Client` construction (spec §4.2 "Timeouts are
//! per-call... with explicit cancellation propagated").
//!
//! Grounded on the teacher's `provider/http_client.rs`: same pool-idle
//! timeout tradeoff (DNS changes surface despite no connection actually
//! going idle within that window), same `tcp_nodelay`/keepalive choices.
//! One client is built per configured provider rather than shared
//! globally, since each carries its own default headers.

use std::time::Duration;

use http::HeaderMap;
use reqwest::Client;

pub fn build(mut default_headers: HeaderMap, timeout: Duration) -> reqwest::Result<Client> {
    default_headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(default_headers)
        .build()
}
