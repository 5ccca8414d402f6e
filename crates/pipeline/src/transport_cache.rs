//! Per-provider transport cache (spec §5 "shared resources: a read-mostly
//! pipeline-instance cache keyed by target"). `HttpTransport` construction
//! is synchronous and only builds a `reqwest::Client`, so `DashMap::entry`
//! alone gives single-flight-equivalent insertion without a dedicated
//! async guard.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::HeaderMap;
use provider::HttpTransport;

pub struct TransportCache {
    transports: DashMap<String, Arc<HttpTransport>>,
}

impl TransportCache {
    pub fn new() -> Self {
        Self { transports: DashMap::new() }
    }

    pub fn get_or_create(&self, provider_id: &str, timeout_ms: u64) -> Arc<HttpTransport> {
        self.transports
            .entry(provider_id.to_string())
            .or_insert_with(|| {
                Arc::new(
                    HttpTransport::new(HeaderMap::new(), Duration::from_millis(timeout_ms))
                        .expect("default transport configuration is always valid"),
                )
            })
            .clone()
    }
}

impl Default for TransportCache {
    fn default() -> Self {
        Self::new()
    }
}
