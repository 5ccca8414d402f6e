//! Structured-logging field names emitted across the request pipeline
//! (spec §7 "All errors must be logged with `requestId` and the
//! component-of-origin"). Kept as constants so every component spells a
//! given field identically, the way the teacher keeps GenAI semantic
//! attribute names centralized.

/// The per-request identifier assigned by the orchestrator (spec §3
/// "Request Context").
pub const REQUEST_ID: &str = "request_id";

/// The component that produced a log record or error (`codec`,
/// `transport`, `compat`, `oauth`, `router`, `pipeline`).
pub const COMPONENT: &str = "component";

/// The route category a request was classified into (spec §4.5).
pub const ROUTE_CATEGORY: &str = "route_category";

/// The selected provider id for the current attempt.
pub const PROVIDER_ID: &str = "provider_id";

/// The selected model id for the current attempt.
pub const MODEL_ID: &str = "model_id";

/// The selected key id for the current attempt, if the provider has more
/// than one configured key.
pub const KEY_ID: &str = "key_id";

/// Attempt number within the orchestrator's candidate loop (spec §4.6,
/// 1-based).
pub const ATTEMPT: &str = "attempt";

/// Model name as requested by the inbound client, before routing
/// resolves a concrete target.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// Canonical finish reason of the response (spec §4.1 finish-reason
/// table).
pub const GEN_AI_RESPONSE_FINISH_REASONS: &str = "gen_ai.response.finish_reasons";

/// Estimated or reported input token count.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// Estimated or reported output token count.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
