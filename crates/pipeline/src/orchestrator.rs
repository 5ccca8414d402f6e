//! Per-request pipeline orchestrator (spec §4.6): route → for each
//! candidate target, resolve credentials → apply compat → encode →
//! invoke transport → on failure advance to the next candidate; on
//! success, the caller bridges the canonical response back into the
//! inbound protocol.

use std::sync::Arc;
use std::time::Duration;

use config::{Config, ProviderConfig};
use context::{Authentication, RequestContext};
use futures::future;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::HeaderMap;
use oauth::OAuthManager;
use protocol::{CanonicalChatRequest, CanonicalChatResponse, WireProtocol};
use provider::{AuthHeaders, NoRefresh, UpstreamBody};
use rate_limit::{HealthTracker, QuotaLimiter, TargetKey};
use router::{ResolvedTarget, Router};
use serde_json::Value;

use crate::credentials;
use crate::error::PipelineError;
use crate::stream_bridge::{self, StreamDelta};
use crate::transport_cache::TransportCache;
use crate::wire;
use telemetry::attributes;

/// Upper bound on distinct targets tried for one request (spec §4.6
/// "advance to next candidate" has to terminate somewhere; the router
/// already orders candidates best-first, so trying more than a handful
/// buys little beyond latency).
const MAX_ATTEMPTS: usize = 3;

/// What one successfully dispatched request produced: a response already
/// fully materialized, or a live stream of deltas still to be rendered
/// into the inbound wire protocol's shape (spec §4.6 streaming bridge).
pub enum DispatchOutcome {
    Complete(CanonicalChatResponse, ResolvedTarget),
    Streaming {
        target: ResolvedTarget,
        target_wire: WireProtocol,
        id: String,
        model: String,
        deltas: BoxStream<'static, Result<StreamDelta, PipelineError>>,
    },
}

/// A provider whose compat profile needs the full accumulated text before
/// its transforms can run (tool calls harvested from prose, a reasoning
/// tag stripped out, mixed content flattened, or a finish-reason string
/// substituted) can't be bridged delta-by-delta: those steps see each
/// chunk in isolation and would either miss matches split across chunk
/// boundaries or never see the raw finish-reason string at all. Such a
/// provider's stream is buffered and aggregated instead of forwarded
/// incrementally.
fn requires_full_text_compat(provider: &ProviderConfig) -> bool {
    provider.harvest_inline_tool_calls
        || provider.reasoning_tag.is_some()
        || provider.flatten_mixed_content
        || !provider.finish_reason_overrides.is_empty()
}

pub struct Orchestrator {
    config: Config,
    router: Router,
    oauth_manager: Arc<OAuthManager>,
    transports: TransportCache,
    quota: QuotaLimiter,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let health = Arc::new(HealthTracker::new(config.rate_limit.health));
        let router = Router::new(config.providers.clone(), config.routing.clone(), health);
        let oauth_manager = Arc::new(OAuthManager::new(config.oauth.clone()));
        let quota = QuotaLimiter::new(&config.rate_limit.quota);
        Self { config, router, oauth_manager, transports: TransportCache::new(), quota }
    }

    pub fn oauth_manager(&self) -> &Arc<OAuthManager> {
        &self.oauth_manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forwards an OpenAI-compatible embeddings body to whichever
    /// provider its `model` field names, rewriting only the upstream
    /// model name (spec §6 `/v1/embeddings` "pass-through where
    /// supported"). No canonical request/response model exists for
    /// embeddings, so this bypasses C1/C3 entirely and reuses only the
    /// credential resolution and transport this orchestrator already
    /// owns.
    pub async fn dispatch_embeddings(
        &self,
        mut body: Value,
        auth: &Authentication,
        inbound_headers: &HeaderMap,
    ) -> Result<Vec<u8>, PipelineError> {
        let requested_model = body.get("model").and_then(Value::as_str).unwrap_or_default().to_string();

        let (provider_id, model_id) = match protocol::split_provider_prefix(&requested_model) {
            Some((prefix, rest)) if self.config.providers.contains_key(prefix) => (prefix.to_string(), rest.to_string()),
            _ => {
                let fallback = self
                    .config
                    .providers
                    .keys()
                    .next()
                    .cloned()
                    .ok_or(PipelineError::NoRouteAvailable)?;
                (fallback, requested_model.clone())
            }
        };

        let provider = self
            .config
            .providers
            .get(&provider_id)
            .ok_or(PipelineError::NoRouteAvailable)?;

        let target = ResolvedTarget {
            provider_id: provider_id.clone(),
            model_id: model_id.clone(),
            key_id: None,
            max_context_tokens: provider.max_context_tokens,
        };

        let (auth_headers, refresher) = match &auth.upstream_override {
            Some(override_token) => (AuthHeaders::bearer(override_token.clone()), Arc::new(NoRefresh) as Arc<dyn provider::AuthRefresher>),
            None => credentials::resolve_auth(provider, &provider_id, &target, &self.oauth_manager).await?,
        };

        if let Some(object) = body.as_object_mut() {
            object.insert("model".to_string(), Value::String(provider.upstream_model_name(&model_id).to_string()));
        }
        let body_bytes = serde_json::to_vec(&body).map_err(|err| PipelineError::Internal(err.to_string()))?;

        let transport = self.transports.get_or_create(&provider_id, provider.timeout_ms);
        let transport_request = provider::TransportRequest {
            base_url: &provider.base_url,
            endpoint_suffix: "/embeddings",
            body: body_bytes,
            auth: &auth_headers,
            header_rules: &provider.headers,
            inbound_headers,
            max_retries: provider.max_retries,
            timeout: Duration::from_millis(provider.timeout_ms),
        };

        let response = transport.send(transport_request, refresher.as_ref()).await?;
        Ok(response)
    }

    /// Handles one already-decoded canonical request (spec §4.6 steps
    /// 2-5). Returns the canonical response plus the target that served
    /// it, or the last classified error once every candidate is
    /// exhausted (spec §4.6 step 5: "return `ServiceUnavailable` with the
    /// last classified error").
    pub async fn dispatch(
        &self,
        request: CanonicalChatRequest,
        ctx: &mut RequestContext,
        auth: &Authentication,
        inbound_headers: &HeaderMap,
    ) -> Result<DispatchOutcome, PipelineError> {
        let route = self.router.route(&request)?;
        ctx.route_category = Some(route.category);

        let mut last_error: Option<PipelineError> = None;

        for target in route.candidates.iter().take(MAX_ATTEMPTS) {
            ctx.selected_target = Some(format!("{}.{}", target.provider_id, target.model_id));
            ctx.attempt += 1;

            if !self.quota.check(&target.provider_id) {
                log::warn!(
                    "{}={} {}=pipeline {}={} {}={} {}={}: quota exhausted, skipping candidate",
                    attributes::REQUEST_ID,
                    ctx.request_id,
                    attributes::COMPONENT,
                    attributes::PROVIDER_ID,
                    target.provider_id,
                    attributes::MODEL_ID,
                    target.model_id,
                    attributes::ATTEMPT,
                    ctx.attempt,
                );
                last_error = Some(PipelineError::NoRouteAvailable);
                continue;
            }

            match self.attempt_target(&request, target, ctx, auth, inbound_headers).await {
                Ok(outcome) => {
                    self.router.health().record_success(&TargetKey::new(&target.provider_id, &target.model_id));
                    return Ok(outcome);
                }
                Err(err) => {
                    log::error!(
                        "{}={} {}=pipeline {}={} {}={} {}={}: {err}",
                        attributes::REQUEST_ID,
                        ctx.request_id,
                        attributes::COMPONENT,
                        attributes::PROVIDER_ID,
                        target.provider_id,
                        attributes::MODEL_ID,
                        target.model_id,
                        attributes::ATTEMPT,
                        ctx.attempt,
                    );
                    self.router.health().record_failure(&TargetKey::new(&target.provider_id, &target.model_id));
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or(PipelineError::NoRouteAvailable);
        log::error!(
            "{}={} {}=pipeline: all candidates exhausted, returning {err}",
            attributes::REQUEST_ID,
            ctx.request_id,
            attributes::COMPONENT,
        );
        Err(err)
    }

    async fn attempt_target(
        &self,
        request: &CanonicalChatRequest,
        target: &ResolvedTarget,
        ctx: &RequestContext,
        auth: &Authentication,
        inbound_headers: &HeaderMap,
    ) -> Result<DispatchOutcome, PipelineError> {
        let provider = self
            .config
            .providers
            .get(&target.provider_id)
            .ok_or_else(|| PipelineError::Internal(format!("router selected unconfigured provider {}", target.provider_id)))?;

        let (auth_headers, refresher) = match &auth.upstream_override {
            // A per-request override replaces the configured credential
            // outright and carries no refresh path of its own (spec §6
            // "per-request upstream credential override").
            Some(override_token) => (AuthHeaders::bearer(override_token.clone()), Arc::new(NoRefresh) as Arc<dyn provider::AuthRefresher>),
            None => credentials::resolve_auth(provider, &target.provider_id, target, &self.oauth_manager).await?,
        };

        let mut canonical_request = request.clone();
        canonical_request.model = provider.upstream_model_name(&target.model_id).to_string();
        compat::filter_canonical_tools(provider, &mut canonical_request.tools);

        let target_wire = wire::target_wire_protocol(provider.provider_type);
        let mut wire_body = target_wire.encode_request(&canonical_request);
        compat::preprocess_wire_body(provider, &mut wire_body);

        let body_bytes = serde_json::to_vec(&wire_body).map_err(|err| PipelineError::Internal(err.to_string()))?;

        let transport = self.transports.get_or_create(&target.provider_id, provider.timeout_ms);
        let endpoint_suffix = provider::endpoint_suffix(provider.provider_type);

        let transport_request = provider::TransportRequest {
            base_url: &provider.base_url,
            endpoint_suffix,
            body: body_bytes,
            auth: &auth_headers,
            header_rules: &provider.headers,
            inbound_headers,
            max_retries: provider.max_retries,
            timeout: Duration::from_millis(provider.timeout_ms),
        };

        let upstream_body = tokio::select! {
            result = transport.send_adaptive(transport_request, refresher.as_ref()) => result?,
            () = ctx.cancellation.cancelled() => return Err(PipelineError::Cancelled),
        };

        match upstream_body {
            UpstreamBody::Bytes(response_bytes) => {
                let mut response_json: Value =
                    serde_json::from_slice(&response_bytes).map_err(|err| PipelineError::Internal(err.to_string()))?;
                compat::rewrite_finish_reason_json(provider, &mut response_json, target_wire);
                let rewritten_bytes = serde_json::to_vec(&response_json).map_err(|err| PipelineError::Internal(err.to_string()))?;

                let mut canonical_response = target_wire.decode_response(&rewritten_bytes)?;
                compat::apply_response(provider, &mut canonical_response);

                Ok(DispatchOutcome::Complete(canonical_response, target.clone()))
            }
            UpstreamBody::Events(events) => {
                let model = canonical_request.model.clone();

                if requires_full_text_compat(provider) {
                    let deltas: Vec<StreamDelta> = events
                        .filter_map(|event| future::ready(event.ok().and_then(|event| stream_bridge::parse_upstream_event(target_wire, &event))))
                        .collect()
                        .await;

                    let mut canonical_response = stream_bridge::aggregate(&ctx.request_id.to_string(), &model, &deltas);
                    compat::apply_response(provider, &mut canonical_response);

                    Ok(DispatchOutcome::Complete(canonical_response, target.clone()))
                } else {
                    let deltas = events
                        .filter_map(move |event| {
                            future::ready(match event {
                                Ok(event) => stream_bridge::parse_upstream_event(target_wire, &event).map(Ok),
                                Err(err) => Some(Err(PipelineError::from(err))),
                            })
                        })
                        .boxed();

                    Ok(DispatchOutcome::Streaming {
                        target: target.clone(),
                        target_wire,
                        id: ctx.request_id.to_string(),
                        model,
                        deltas,
                    })
                }
            }
        }
    }
}
