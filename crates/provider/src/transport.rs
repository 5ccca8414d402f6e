//! A single generic HTTP transport, configured per call by endpoint and
//! auth rather than branching per provider family (spec §4.2:
//! "Provider-specific obligations encoded as configuration, not branching
//! in the generic transport").
//!
//! Grounded on the teacher's `provider/openai.rs` `chat_completion`/
//! `chat_completion_stream` pair: same status-code branching, same
//! bytes_stream→eventsource bridging for streaming responses.

use std::pin::Pin;
use std::time::Duration;

use config::HeaderRule;
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use http::HeaderMap;
use reqwest::{Client, Method, Response};

use crate::auth::{AuthHeaders, AuthRefresher};
use crate::error::{TransportError, classify_status};
use crate::retry;

/// An upstream's response body, shaped after the fact rather than by what
/// the outbound request asked for (spec §4.6: a client's `stream` request
/// and a provider's actual response shape are independent facts the
/// orchestrator must reconcile). Determined by sniffing the response
/// `Content-Type` once the status has been classified as a success.
pub enum UpstreamBody {
    /// A complete, non-streamed response body.
    Bytes(Vec<u8>),
    /// A live `text/event-stream` response, parsed into [`Event`]s.
    Events(Pin<Box<dyn Stream<Item = Result<Event, TransportError>> + Send>>),
}

/// Resolves a provider family to its request path suffix (spec §4.2:
/// "route URLs from the target's base URL plus a family-specific endpoint
/// suffix"). Gemini/Antigravity speak an OpenAI-compatible chat-completions
/// shape once the compatibility layer (C3) has applied its field mappings,
/// so it shares the same suffix as `OpenAiCompatible`.
pub fn endpoint_suffix(provider_type: config::ProviderType) -> &'static str {
    match provider_type {
        config::ProviderType::OpenAiCompatible | config::ProviderType::Gemini => "/chat/completions",
        config::ProviderType::Anthropic => "/messages",
    }
}

fn to_event_stream(response: Response) -> impl Stream<Item = Result<Event, TransportError>> {
    response
        .bytes_stream()
        .eventsource()
        .map(|event| event.map_err(|e| TransportError::StreamInterrupted { detail: e.to_string() }))
}

pub struct TransportRequest<'a> {
    pub base_url: &'a str,
    pub endpoint_suffix: &'a str,
    pub body: Vec<u8>,
    pub auth: &'a AuthHeaders,
    pub header_rules: &'a [HeaderRule],
    pub inbound_headers: &'a HeaderMap,
    pub max_retries: u32,
    pub timeout: Duration,
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(default_headers: HeaderMap, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: crate::client::build(default_headers, timeout)?,
        })
    }

    /// Sends `request`, retrying per spec §4.2 classification and
    /// performing the one-shot forced-refresh-then-retry on 401/403
    /// against an OAuth-backed target.
    pub async fn send(
        &self,
        request: TransportRequest<'_>,
        refresher: &dyn AuthRefresher,
    ) -> Result<Vec<u8>, TransportError> {
        let response = self.establish(&request, refresher).await?;
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| TransportError::UpstreamUnreachable { detail: e.to_string() })
    }

    /// Opens a streaming call and bridges the SSE byte stream into parsed
    /// [`Event`]s. Only the initial connect/HTTP-status phase is retried
    /// per spec §4.2; once streaming has begun, a mid-stream failure is
    /// surfaced as `StreamInterrupted` rather than retried silently.
    pub async fn send_stream(
        &self,
        request: TransportRequest<'_>,
        refresher: &dyn AuthRefresher,
    ) -> Result<impl Stream<Item = Result<Event, TransportError>>, TransportError> {
        let response = self.establish(&request, refresher).await?;
        Ok(to_event_stream(response))
    }

    /// Sends `request` and sniffs the actual response shape rather than
    /// assuming it from whether the outbound body asked for `stream:true`
    /// (spec §4.6: the client's preference and the provider's behavior are
    /// independent — a provider may ignore `stream` and return one JSON
    /// body, or stream unconditionally).
    pub async fn send_adaptive(
        &self,
        request: TransportRequest<'_>,
        refresher: &dyn AuthRefresher,
    ) -> Result<UpstreamBody, TransportError> {
        let response = self.establish(&request, refresher).await?;

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        if is_event_stream {
            Ok(UpstreamBody::Events(Box::pin(to_event_stream(response))))
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::UpstreamUnreachable { detail: e.to_string() })?;
            Ok(UpstreamBody::Bytes(bytes.to_vec()))
        }
    }

    /// Retries the initial connect/HTTP-status phase per spec §4.2,
    /// including the one-shot forced-refresh-then-retry on 401/403, and
    /// returns the raw successful [`Response`] for the caller to consume
    /// either as bytes or as an event stream.
    async fn establish(&self, request: &TransportRequest<'_>, refresher: &dyn AuthRefresher) -> Result<Response, TransportError> {
        let mut auth = request.auth.clone();
        let mut refreshed_once = false;

        loop {
            let outcome = retry::execute(request.max_retries, |_attempt| self.connect_once(request, &auth)).await;

            match outcome {
                Ok(response) => return Ok(response),
                Err(TransportError::AuthFailure { detail }) if !refreshed_once => {
                    refreshed_once = true;
                    match refresher.refresh().await {
                        Ok(fresh) => auth = fresh,
                        Err(_) => return Err(TransportError::AuthFailure { detail }),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn connect_once(&self, request: &TransportRequest<'_>, auth: &AuthHeaders) -> Result<Response, TransportError> {
        let url = format!("{}{}", request.base_url, request.endpoint_suffix);
        let builder = self.build_request(Method::POST, &url, request, auth);

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| TransportError::UpstreamUnreachable { detail: e.to_string() })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(classify_status(status.as_u16(), body))
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        request: &TransportRequest<'_>,
        auth: &AuthHeaders,
    ) -> reqwest::RequestBuilder {
        use secrecy::ExposeSecret;

        let mut builder = self.client.request(method, url).header("content-type", "application/json");

        if let Some(token) = &auth.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        for (name, value) in &auth.extra {
            builder = builder.header(name, value);
        }

        header_rules::apply(request.header_rules, request.inbound_headers, builder)
    }
}
