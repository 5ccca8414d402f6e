//! Upstream provider configuration (spec §3 "Provider Target", §4.3
//! "Profile per provider"). Everything a concrete `(providerId, modelId,
//! keyId)` target needs is data here; the compatibility and transport
//! layers only iterate it.

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

use crate::headers::HeaderRule;

/// Default context window, used when a provider/model does not override it
/// (spec §3 "Provider Target").
pub const DEFAULT_MAX_CONTEXT_TOKENS: u64 = 200_000;

/// Protocol family spoken by an upstream provider, selecting which
/// transport (C2) and compatibility profile (C3) apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// Any OpenAI Chat Completions-compatible HTTP API (OpenAI itself, GLM,
    /// Qwen, iFlow, LM Studio).
    OpenAiCompatible,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini / Antigravity (`requestType: "agent"`, search-only
    /// tools, composite headers).
    Gemini,
}

/// Authentication descriptor for a provider (spec §3 "each target has an
/// associated ... auth descriptor").
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum AuthConfig {
    /// Static bearer API key(s); multiple keys rotate round-robin when a
    /// route target omits an explicit `keyId` (spec §6 route pool schema).
    ApiKey(ApiKeyConfig),
    /// An OAuth-backed credential, resolved through the OAuth lifecycle
    /// manager (C4) by `(providerType, alias)`.
    #[serde(rename = "oauth")]
    OAuth {
        /// Alias identifying the token record. `static` tokens are loaded
        /// once at startup and never refreshed (spec §4.4).
        alias: String,
    },
}

/// One or more static API keys for a provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    /// The keys, in configured order; requests without an explicit `keyId`
    /// rotate round-robin across this list.
    pub keys: Vec<SecretString>,
}

/// Per-model overrides within a provider.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ModelEntryConfig {
    /// Upstream model name to substitute, if different from the configured
    /// key (spec §4.2 "default model substitution").
    pub rename: Option<String>,
    /// Context window override for this specific model.
    pub max_context_tokens: Option<u64>,
}

/// Configuration for one upstream provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Protocol family / transport + compatibility profile selector.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Base URL for the provider's API.
    pub base_url: String,
    /// Authentication descriptor.
    pub auth: AuthConfig,
    /// Per-call timeout in milliseconds (spec §4.2, default 60s).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum retry attempts for retryable errors (spec §4.2, default 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Default context window for models of this provider that don't
    /// override it.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u64,
    /// Explicitly configured models, keyed by model id.
    #[serde(default)]
    pub models: IndexMap<String, ModelEntryConfig>,
    /// Header transformation rules applied to outbound requests for this
    /// provider (spec §4.3 "Header overrides").
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
    /// Restrict outbound tool schemas to these names only; empty means no
    /// restriction. Used for Gemini/Antigravity's `googleSearch`-only rule
    /// (spec §4.3 "Tool schema restrictions").
    #[serde(default)]
    pub allowed_tool_names: Vec<String>,
    /// Upstream finish-reason strings this provider emits beyond the
    /// universal set, mapped to one of the canonical spelling (`stop`,
    /// `length`, `tool_call`, `filtered`) before the codec's table lookup
    /// runs (spec §4.3 "Finish-reason value substitutions").
    #[serde(default)]
    pub finish_reason_overrides: IndexMap<String, String>,
    /// This provider's wire body needs `requestType: "agent"` injected and
    /// any `session_id` field stripped (spec §4.2 Gemini/Antigravity
    /// obligation).
    #[serde(default)]
    pub requires_agent_request_type: bool,
    /// Content arrives with tool-calls embedded as inline text (fenced
    /// JSON/XML markers, e.g. `<tool_calls>...</tool_calls>`) that must be
    /// promoted to structured tool-call entries (spec §4.3 "Tool-call
    /// post-processing hooks").
    #[serde(default)]
    pub harvest_inline_tool_calls: bool,
    /// Reasoning content is wrapped in `<reasoning>...</reasoning>` (or an
    /// equivalent marker) and must be extracted into the canonical
    /// reasoning part (spec §4.3 "Reasoning extraction").
    #[serde(default)]
    pub reasoning_tag: Option<String>,
    /// Collapse a mixed content-part array down to plain text once tool
    /// calls and reasoning have been pulled out, for providers whose wire
    /// shape can't carry a structured array (spec §4.3 "Content array
    /// flattening rules").
    #[serde(default)]
    pub flatten_mixed_content: bool,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_context_tokens() -> u64 {
    DEFAULT_MAX_CONTEXT_TOKENS
}

impl ProviderConfig {
    /// Effective context window for `model_id`.
    pub fn max_context_tokens_for(&self, model_id: &str) -> u64 {
        self.models
            .get(model_id)
            .and_then(|model| model.max_context_tokens)
            .unwrap_or(self.max_context_tokens)
    }

    /// Upstream model name to send, honoring a configured rename.
    pub fn upstream_model_name<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.models
            .get(model_id)
            .and_then(|model| model.rename.as_deref())
            .unwrap_or(model_id)
    }
}
