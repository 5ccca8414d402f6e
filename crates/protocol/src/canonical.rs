//! Protocol-agnostic canonical chat representation (spec §3 "Data Model").
//!
//! Every wire protocol (OpenAI Chat, OpenAI Responses, Anthropic Messages)
//! converts to and from this representation; providers and the
//! compatibility layer only ever see canonical types. Tagged enums
//! discriminate content parts the way the teacher discriminates
//! `UnifiedContent`; untagged enums model the string-or-structured unions
//! that differ by protocol (plain text vs. content blocks, stringified vs.
//! parsed tool arguments).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sender role (spec §3 Canonical Chat Message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single canonical chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Set on `Role::Tool` messages to correlate with the originating
    /// `ToolUseRequest.id` (OpenAI's flat `tool_call_id` field).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
}

impl CanonicalMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_call_id: None,
        }
    }

    /// All `ContentPart::ToolUseRequest` parts in this message, in order.
    pub fn tool_use_requests(&self) -> Vec<&ContentPart> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ToolUseRequest { .. }))
                .collect(),
        }
    }

    /// Concatenation of every `Text`/`Reasoning`-excluded text part, or the
    /// whole string for `MessageContent::Text`. Used by the router's
    /// keyword classification (spec §4.5) and by compat's tool-call text
    /// harvesting (spec §4.3).
    pub fn flatten_text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Message content: either a bare string (the common case) or an ordered
/// list of typed parts. Untagged so plain-string messages round-trip as
/// plain JSON strings on the wire, matching the teacher's
/// `UnifiedContentContainer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a structured message (spec §3: text, image-reference,
/// tool-use-request, tool-use-result, reasoning).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageReference {
        source: ImageSource,
    },
    ToolUseRequest {
        id: String,
        name: String,
        /// Always structured internally; stringified only at the OpenAI
        /// wire-encoding step (spec §4.1 tool-argument normalization).
        input: Value,
    },
    ToolUseResult {
        tool_use_id: String,
        content: ToolResultContent,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        is_error: Option<bool>,
    },
    /// Internal chain-of-thought text, absent from the teacher's
    /// `UnifiedContent` — added per spec §3/§4.3's reasoning-extraction
    /// requirement.
    Reasoning {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Multiple(Vec<String>),
}

impl ToolResultContent {
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text(s) => s.clone(),
            ToolResultContent::Multiple(parts) => parts.join("\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// A tool/function schema offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema object describing the tool's parameters. Kept as a
    /// bare `Value` rather than a typed schema struct: RouteCodex never
    /// validates against it, only forwards/filters it (spec §4.3 tool
    /// schema restrictions).
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Named { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    None,
    Auto,
    #[serde(alias = "any")]
    Required,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Sampling {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_tokens: Option<u32>,
}

/// An explicit `provider.model` routing target, whether from the `model`
/// field's `provider.model` prefix or an inline `<**provider.model**>`
/// directive in user text (spec §4.5 rule 1, §9 Open Question 1/2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDirective {
    pub provider_id: String,
    pub model_id: String,
}

/// The canonical request every protocol decodes into and every provider
/// transport consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalChatRequest {
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub sampling: Sampling,
    /// Populated by the codec from an inline `<**provider.model**>`
    /// marker, or by the router from a `provider.model`-prefixed `model`
    /// field; cleared of its source text before forwarding upstream.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routing_directive: Option<RoutingDirective>,
}

impl CanonicalChatRequest {
    /// Concatenation of every user/assistant message's flattened text,
    /// used by the router's keyword classifiers (spec §4.5 rules 4-7).
    pub fn flatten_user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(CanonicalMessage::flatten_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image_part(&self) -> bool {
        self.messages.iter().any(|m| match &m.content {
            MessageContent::Parts(parts) => parts.iter().any(|p| matches!(p, ContentPart::ImageReference { .. })),
            MessageContent::Text(_) => false,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Canonical finish-reason set (spec §4.1 finish-reason table). A total,
/// invertible mapping exists to/from every supported protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCall,
    Filtered,
}

impl FinishReason {
    pub fn to_openai(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCall => "tool_calls",
            FinishReason::Filtered => "content_filter",
        }
    }

    pub fn from_openai(value: &str) -> Option<Self> {
        match value {
            "stop" => Some(FinishReason::Stop),
            "length" => Some(FinishReason::Length),
            "tool_calls" => Some(FinishReason::ToolCall),
            "content_filter" => Some(FinishReason::Filtered),
            _ => None,
        }
    }

    pub fn to_anthropic(self) -> &'static str {
        match self {
            FinishReason::Stop => "end_turn",
            FinishReason::Length => "max_tokens",
            FinishReason::ToolCall => "tool_use",
            FinishReason::Filtered => "stop_sequence",
        }
    }

    pub fn from_anthropic(value: &str) -> Option<Self> {
        match value {
            "end_turn" => Some(FinishReason::Stop),
            "max_tokens" => Some(FinishReason::Length),
            "tool_use" => Some(FinishReason::ToolCall),
            "stop_sequence" => Some(FinishReason::Filtered),
            _ => None,
        }
    }

    /// Responses uses `status`/`incomplete_details.reason` rather than a
    /// single string; this returns the `(status, incomplete_reason)` pair.
    pub fn to_responses(self) -> (&'static str, Option<&'static str>) {
        match self {
            FinishReason::Stop => ("completed", None),
            FinishReason::Length => ("incomplete", Some("max_output_tokens")),
            FinishReason::ToolCall => ("requires_action", None),
            FinishReason::Filtered => ("incomplete", Some("content_filter")),
        }
    }

    pub fn from_responses(status: &str, incomplete_reason: Option<&str>) -> Option<Self> {
        match (status, incomplete_reason) {
            ("completed", _) => Some(FinishReason::Stop),
            ("requires_action", _) => Some(FinishReason::ToolCall),
            ("incomplete", Some("max_output_tokens")) => Some(FinishReason::Length),
            ("incomplete", Some("content_filter")) => Some(FinishReason::Filtered),
            _ => None,
        }
    }
}

/// The canonical response every provider transport produces and every
/// protocol encodes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalChatResponse {
    pub id: String,
    pub model: String,
    pub message: CanonicalMessage,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub usage: Usage,
}

/// Arbitrary provider metadata preserved across the round trip without
/// being interpreted (e.g. OpenAI `system_fingerprint`). Kept as an
/// ordered map so log/debug output is deterministic.
pub type ExtraFields = IndexMap<String, Value>;
