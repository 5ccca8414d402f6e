//! Inbound HTTP endpoints (spec §6 "External interfaces").

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use context::{InboundProtocol, RequestContext};
use pipeline::{PipelineErrorResponse, into_response};
use protocol::WireProtocol;
use serde_json::{json, Value};
use telemetry::attributes;

use crate::state::AppState;

/// `POST /v1/chat/completions`: OpenAI Chat shape by convention, but the
/// handler sniffs the body for an Anthropic or Responses shape and
/// normalizes rather than rejecting it (spec §6: "handler auto-detects
/// and normalizes Anthropic or Responses shapes when detected").
pub async fn chat_completions(state: State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (inbound, wire) = detect_shape(&body);
    dispatch_request(state, headers, inbound, wire, body).await
}

/// `POST /v1/responses`: OpenAI Responses.
pub async fn responses(state: State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    dispatch_request(state, headers, InboundProtocol::OpenAiResponses, WireProtocol::OpenAiResponses, body).await
}

/// `POST /v1/messages`: Anthropic Messages.
pub async fn messages(state: State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    dispatch_request(state, headers, InboundProtocol::AnthropicMessages, WireProtocol::AnthropicMessages, body).await
}

/// Looks for the fields that only one inbound shape carries: a top-level
/// `input` array is Responses-only; a top-level `max_tokens` alongside a
/// string `system` (rather than an array of role/content messages that
/// happen to include a `system` role) is Anthropic's tell. Anything else
/// is treated as OpenAI Chat, the endpoint's namesake shape.
fn detect_shape(body: &[u8]) -> (InboundProtocol, WireProtocol) {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return (InboundProtocol::OpenAiChat, WireProtocol::OpenAiChat);
    };

    if value.get("input").is_some() {
        return (InboundProtocol::OpenAiResponses, WireProtocol::OpenAiResponses);
    }

    let looks_anthropic = matches!(value.get("system"), Some(Value::String(_))) && value.get("max_tokens").is_some();
    if looks_anthropic {
        return (InboundProtocol::AnthropicMessages, WireProtocol::AnthropicMessages);
    }

    (InboundProtocol::OpenAiChat, WireProtocol::OpenAiChat)
}

async fn dispatch_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    inbound_protocol: InboundProtocol,
    wire: WireProtocol,
    body: Bytes,
) -> Response {
    let auth = context::extract(&headers);
    let mut ctx = RequestContext::new(inbound_protocol, auth.client_identity.clone());

    let directive_precedence = state.orchestrator.config().routing.directive_precedence;
    let request = match wire.decode_request(&body, directive_precedence) {
        Ok(request) => request,
        Err(err) => {
            log::error!(
                "{}={} {}=protocol: {err}",
                attributes::REQUEST_ID,
                ctx.request_id,
                attributes::COMPONENT,
            );
            return PipelineErrorResponse::new(wire, err.into()).into_response();
        }
    };
    let client_wants_stream = request.stream;

    match state.orchestrator.dispatch(request, &mut ctx, &auth, &headers).await {
        Ok(outcome) => into_response(outcome, wire, client_wants_stream).await,
        Err(err) => PipelineErrorResponse::new(wire, err).into_response(),
    }
}

/// `POST /v1/embeddings`: forwarded as-is to whichever provider the
/// `model` field names (spec §6 "pass-through where supported").
pub async fn embeddings(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let auth = context::extract(&headers);
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return PipelineErrorResponse::new(WireProtocol::OpenAiChat, protocol::DecodeError::from_serde_json(err).into())
                .into_response();
        }
    };

    match state.orchestrator.dispatch_embeddings(value, &auth, &headers).await {
        Ok(response_bytes) => {
            let value: Value = serde_json::from_slice(&response_bytes).unwrap_or(Value::Null);
            Json(value).into_response()
        }
        Err(err) => PipelineErrorResponse::new(WireProtocol::OpenAiChat, err).into_response(),
    }
}

/// `GET /v1/models`: every configured model id across every enabled
/// provider, in the OpenAI `list` envelope shape every client already
/// understands.
pub async fn list_models(State(state): State<AppState>) -> Response {
    let config = state.orchestrator.config();

    let data: Vec<Value> = config
        .providers
        .iter()
        .flat_map(|(provider_id, provider)| {
            provider.models.keys().map(move |model_id| {
                json!({
                    "id": format!("{provider_id}.{model_id}"),
                    "object": "model",
                    "owned_by": provider_id,
                })
            })
        })
        .collect();

    Json(json!({ "object": "list", "data": data })).into_response()
}

/// `GET /health`: liveness only, never depends on provider reachability.
pub async fn health() -> Response {
    Json(json!({ "status": "ready" })).into_response()
}

/// `GET /status`: coarse operational counters (spec §6). RouteCodex keeps
/// no external metrics backend, so this reports what the process itself
/// knows rather than a time series.
pub async fn status(State(state): State<AppState>) -> Response {
    let config = state.orchestrator.config();
    let uptime_seconds = jiff::Timestamp::now().since(state.started_at).map(|span| span.get_seconds()).unwrap_or(0);

    Json(json!({
        "status": "ready",
        "uptime_seconds": uptime_seconds,
        "providers_configured": config.providers.len(),
        "route_categories_configured": config.routing.categories.len(),
    }))
    .into_response()
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": { "message": "no such route", "type": "not_found" } })))
}
