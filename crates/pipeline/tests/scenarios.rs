//! End-to-end scenario tests: a real `Orchestrator` dispatching against
//! local mock upstream servers, grounded on the same
//! `TcpListener::bind("127.0.0.1:0")` + `axum::serve` idiom as
//! `llm/src/provider/anthropic.rs`'s test module.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use config::{
    ApiKeyConfig, AuthConfig, Config, DirectivePrecedence, HealthConfig, ProviderConfig, ProviderType, RateLimitConfig,
    RouteCategory, RoutePoolConfig, RoutingConfig,
};
use context::{Authentication, InboundProtocol, RequestContext};
use indexmap::IndexMap;
use pipeline::{DispatchOutcome, Orchestrator};
use protocol::{CanonicalChatRequest, CanonicalMessage, ContentPart, MessageContent, Role, ToolDef, WireProtocol};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

fn provider(provider_type: ProviderType, base_url: String) -> ProviderConfig {
    ProviderConfig {
        provider_type,
        base_url,
        auth: AuthConfig::ApiKey(ApiKeyConfig { keys: vec![SecretString::from("k0".to_string())] }),
        timeout_ms: 5_000,
        max_retries: 3,
        max_context_tokens: 128_000,
        models: IndexMap::new(),
        headers: Vec::new(),
        allowed_tool_names: Vec::new(),
        finish_reason_overrides: IndexMap::new(),
        requires_agent_request_type: false,
        harvest_inline_tool_calls: false,
        reasoning_tag: None,
        flatten_mixed_content: false,
    }
}

fn pool(id: &str, priority: i32, backup: bool, targets: &[&str]) -> RoutePoolConfig {
    RoutePoolConfig { id: id.to_string(), priority, backup, targets: targets.iter().map(|t| t.to_string()).collect() }
}

fn default_category_routing(targets: &[&str]) -> RoutingConfig {
    let mut routing = RoutingConfig::default();
    routing.categories.insert(RouteCategory::Default, vec![pool("primary", 0, false, targets)]);
    routing
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

type Capture = Arc<Mutex<Option<Value>>>;

/// Serves `response` for every call to `/chat/completions`, recording the
/// last request body into `capture`.
async fn spawn_capturing_chat(capture: Capture, response: Value) -> SocketAddr {
    let app = Router::new().route(
        "/chat/completions",
        post(move |Json(body): Json<Value>| {
            let capture = capture.clone();
            let response = response.clone();
            async move {
                *capture.lock().await = Some(body);
                Json(response)
            }
        }),
    );
    spawn(app).await
}

/// Always answers `status` with an empty body, counting calls in `calls`.
async fn spawn_failing_chat(status: u16, calls: Arc<AtomicU32>) -> SocketAddr {
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                StatusCode::from_u16(status).unwrap()
            }
        }),
    );
    spawn(app).await
}

async fn spawn_succeeding_chat(response: Value, calls: Arc<AtomicU32>) -> SocketAddr {
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let calls = calls.clone();
            let response = response.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(response)
            }
        }),
    );
    spawn(app).await
}

fn openai_tool_call_response() -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "t1",
                    "type": "function",
                    "function": {"name": "read_file", "arguments": "{\"path\":\"README.md\"}"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

fn openai_plain_response(text: &str) -> Value {
    json!({
        "id": "chatcmpl-ok",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}

/// S1 — Anthropic tool-use round-trip via OpenAI upstream, non-stream.
#[tokio::test]
async fn s1_anthropic_tool_use_round_trip_via_openai_upstream() {
    let base_url = format!("http://{}", spawn_capturing_chat(Arc::new(Mutex::new(None)), openai_tool_call_response()).await);

    let mut providers = IndexMap::new();
    providers.insert("openai".to_string(), provider(ProviderType::OpenAiCompatible, base_url));

    let config = Config {
        providers,
        routing: default_category_routing(&["openai.gpt-4"]),
        rate_limit: RateLimitConfig { health: HealthConfig { failure_threshold: 3, cooldown_ms: 30_000 }, ..Default::default() },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config);

    let input = json!({
        "model": "openai.gpt-4",
        "messages": [{"role": "user", "content": "Read README.md"}],
        "tools": [{
            "name": "read_file",
            "description": "read a file",
            "input_schema": {"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}
        }],
        "stream": false
    });
    let request = WireProtocol::AnthropicMessages.decode_request(input.to_string().as_bytes(), DirectivePrecedence::default()).unwrap();

    let mut ctx = RequestContext::new(InboundProtocol::AnthropicMessages, None);
    let auth = Authentication::default();
    let outcome = orchestrator.dispatch(request, &mut ctx, &auth, &HeaderMap::new()).await.unwrap();

    let DispatchOutcome::Complete(response, target) = outcome else {
        panic!("expected a complete (non-streaming) outcome");
    };
    assert_eq!(target.provider_id, "openai");

    let anthropic = WireProtocol::AnthropicMessages.encode_response(&response);
    assert_eq!(anthropic["stop_reason"], "tool_use");
    let block = &anthropic["content"][0];
    assert_eq!(block["type"], "tool_use");
    assert_eq!(block["id"], "t1");
    assert_eq!(block["name"], "read_file");
    assert_eq!(block["input"]["path"], "README.md");
}

/// S4 — Priority pool fallback on 5xx: target A fails every call, the
/// backup pool's target B succeeds, and A's health cooldown then keeps
/// later requests off it entirely.
#[tokio::test]
async fn s4_priority_pool_falls_back_to_backup_after_target_health_cools_down() {
    let calls_a = Arc::new(AtomicU32::new(0));
    let calls_b = Arc::new(AtomicU32::new(0));
    let base_a = format!("http://{}", spawn_failing_chat(503, calls_a.clone()).await);
    let base_b = format!("http://{}", spawn_succeeding_chat(openai_plain_response("fallback ok"), calls_b.clone()).await);

    let mut providers = IndexMap::new();
    let mut a = provider(ProviderType::OpenAiCompatible, base_a);
    a.max_retries = 2; // 3 total attempts: the initial call plus 2 retries.
    providers.insert("a".to_string(), a);
    providers.insert("b".to_string(), provider(ProviderType::OpenAiCompatible, base_b));

    let mut routing = RoutingConfig::default();
    routing.categories.insert(
        RouteCategory::Default,
        vec![pool("p1", 200, false, &["a.model"]), pool("p2", 0, true, &["b.model"])],
    );

    let config = Config {
        providers,
        routing,
        rate_limit: RateLimitConfig { health: HealthConfig { failure_threshold: 1, cooldown_ms: 30_000 }, ..Default::default() },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config);

    let request = CanonicalChatRequest {
        model: "gpt-4".to_string(),
        messages: vec![CanonicalMessage::text(Role::User, "hello")],
        ..Default::default()
    };

    let mut ctx = RequestContext::new(InboundProtocol::OpenAiChat, None);
    let auth = Authentication::default();
    let outcome = orchestrator.dispatch(request.clone(), &mut ctx, &auth, &HeaderMap::new()).await.unwrap();

    let DispatchOutcome::Complete(_, target) = outcome else {
        panic!("expected a complete outcome from the backup target");
    };
    assert_eq!(target.provider_id, "b");
    assert_eq!(calls_a.load(Ordering::SeqCst), 3);
    assert_eq!(calls_b.load(Ordering::SeqCst), 1);

    // A is now in cooldown: a second request never calls it again, only B.
    let mut ctx2 = RequestContext::new(InboundProtocol::OpenAiChat, None);
    orchestrator.dispatch(request, &mut ctx2, &auth, &HeaderMap::new()).await.unwrap();
    assert_eq!(calls_a.load(Ordering::SeqCst), 3);
    assert_eq!(calls_b.load(Ordering::SeqCst), 2);
}

/// S5 — Inline routing directive overrides the `model` field and strips
/// its own marker text before forwarding, still classified `default`.
#[tokio::test]
async fn s5_inline_routing_directive_overrides_model_field() {
    let capture: Capture = Arc::new(Mutex::new(None));
    let base_url = format!("http://{}", spawn_capturing_chat(capture.clone(), openai_plain_response("ok")).await);

    let mut providers = IndexMap::new();
    providers.insert("iflow".to_string(), provider(ProviderType::OpenAiCompatible, base_url));
    // No pools configured at all: the directive bypasses category pools
    // entirely, so only provider resolution matters here.
    let config = Config { providers, routing: RoutingConfig::default(), ..Default::default() };
    let orchestrator = Orchestrator::new(config);

    let input = json!({
        "model": "gpt-4",
        "messages": [{"role": "user", "content": "please summarize <**iflow.glm-4.7**> this document"}],
    });
    let request = WireProtocol::OpenAiChat.decode_request(input.to_string().as_bytes(), DirectivePrecedence::default()).unwrap();
    assert_eq!(request.routing_directive.as_ref().unwrap().provider_id, "iflow");

    let mut ctx = RequestContext::new(InboundProtocol::OpenAiChat, None);
    let auth = Authentication::default();
    let outcome = orchestrator.dispatch(request, &mut ctx, &auth, &HeaderMap::new()).await.unwrap();

    let DispatchOutcome::Complete(_, target) = outcome else {
        panic!("expected a complete outcome");
    };
    assert_eq!(target.provider_id, "iflow");
    assert_eq!(target.model_id, "glm-4.7");
    assert_eq!(ctx.route_category, Some(RouteCategory::Default));

    let sent = capture.lock().await.clone().unwrap();
    let sent_text = sent["messages"][0]["content"].as_str().unwrap();
    assert!(!sent_text.contains("<**"));
    assert!(sent_text.contains("this document"));
}

/// S6 — Antigravity/Gemini tool filtering: only `googleSearch` survives,
/// `requestType:"agent"` is injected, and no `session_id` reaches the
/// wire body.
#[tokio::test]
async fn s6_antigravity_filters_tools_and_injects_agent_request_type() {
    let capture: Capture = Arc::new(Mutex::new(None));
    let base_url = format!("http://{}", spawn_capturing_chat(capture.clone(), openai_plain_response("ok")).await);

    let mut antigravity = provider(ProviderType::Gemini, base_url);
    antigravity.allowed_tool_names = vec!["googleSearch".to_string()];
    antigravity.requires_agent_request_type = true;

    let mut providers = IndexMap::new();
    providers.insert("antigravity".to_string(), antigravity);

    let config = Config { providers, routing: default_category_routing(&["antigravity.gemini-pro"]), ..Default::default() };
    let orchestrator = Orchestrator::new(config);

    let request = CanonicalChatRequest {
        model: "gemini-pro".to_string(),
        messages: vec![CanonicalMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![ContentPart::Text { text: "search for rust release notes".to_string() }]),
            tool_call_id: None,
        }],
        tools: vec![
            ToolDef { name: "mcp__chrome_click".to_string(), description: String::new(), parameters: json!({}) },
            ToolDef { name: "googleSearch".to_string(), description: String::new(), parameters: json!({}) },
        ],
        ..Default::default()
    };

    let mut ctx = RequestContext::new(InboundProtocol::OpenAiChat, None);
    let auth = Authentication::default();
    let outcome = orchestrator.dispatch(request, &mut ctx, &auth, &HeaderMap::new()).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Complete(..)));

    let sent = capture.lock().await.clone().unwrap();
    assert_eq!(sent["requestType"], "agent");
    assert!(sent.get("session_id").is_none());
    assert_eq!(sent["tools"], json!([{"googleSearch": {}}]));
}
