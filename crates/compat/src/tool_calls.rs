//! Tool-call text harvesting (spec §4.3 "Tool-call post-processing
//! hooks"): some providers (GLM, Qwen, iFlow) emit tool calls as inline
//! text rather than a structured field, wrapped in a `<tool_calls>...
//! </tool_calls>` marker carrying a JSON array, or as a fenced ```json
//! code block carrying the same shape. Both are promoted to structured
//! `ToolUseRequest` parts here, in the order they're found, so ordering
//! stays deterministic (spec §4.3 "Contract").

use config::ProviderConfig;
use protocol::{CanonicalChatResponse, ContentPart, MessageContent};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_calls>(.*?)</tool_calls>").expect("valid regex"));
static FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\[.*?\]|\{.*?\})\s*```").expect("valid regex"));

#[derive(Deserialize)]
struct InlineCall {
    name: String,
    #[serde(default, alias = "parameters")]
    arguments: Value,
}

/// Scans `response.message`'s text content for inline tool-call markers
/// and, if any are found, replaces the content with any leftover text
/// followed by one `ToolUseRequest` part per call, in the order matched.
/// A no-op when `profile.harvest_inline_tool_calls` is false or no marker
/// is present.
pub fn harvest_inline_tool_calls(profile: &ProviderConfig, response: &mut CanonicalChatResponse) {
    if !profile.harvest_inline_tool_calls {
        return;
    }

    let text = match &response.message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(_) => return,
    };

    let Some((calls, remainder)) = extract_calls(&text) else {
        return;
    };
    if calls.is_empty() {
        return;
    }

    let mut parts = Vec::new();
    let trimmed = remainder.trim();
    if !trimmed.is_empty() {
        parts.push(ContentPart::Text { text: trimmed.to_string() });
    }
    for (index, call) in calls.into_iter().enumerate() {
        parts.push(ContentPart::ToolUseRequest {
            id: format!("call_{index}"),
            name: call.name,
            input: call.arguments,
        });
    }

    response.message.content = MessageContent::Parts(parts);
}

fn extract_calls(text: &str) -> Option<(Vec<InlineCall>, String)> {
    if let Some(m) = TAG_PATTERN.find(text) {
        let calls = parse_calls_json(&m.as_str()[12..m.as_str().len() - 13]);
        let remainder = format!("{}{}", &text[..m.start()], &text[m.end()..]);
        return calls.map(|calls| (calls, remainder));
    }

    if let Some(m) = FENCE_PATTERN.captures(text) {
        let whole = m.get(0).expect("group 0 always present");
        let calls = parse_calls_json(&m[1]);
        let remainder = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        return calls.map(|calls| (calls, remainder));
    }

    None
}

fn parse_calls_json(json: &str) -> Option<Vec<InlineCall>> {
    if let Ok(calls) = serde_json::from_str::<Vec<InlineCall>>(json.trim()) {
        return Some(calls);
    }
    serde_json::from_str::<InlineCall>(json.trim()).ok().map(|call| vec![call])
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ApiKeyConfig, AuthConfig, ProviderType};
    use indexmap::IndexMap;
    use protocol::{CanonicalMessage, FinishReason, Role, Usage};

    fn harvesting_profile() -> ProviderConfig {
        ProviderConfig {
            provider_type: ProviderType::OpenAiCompatible,
            base_url: "https://example.test".to_string(),
            auth: AuthConfig::ApiKey(ApiKeyConfig { keys: vec!["k".into()] }),
            timeout_ms: 60_000,
            max_retries: 3,
            max_context_tokens: 200_000,
            models: IndexMap::new(),
            headers: Vec::new(),
            allowed_tool_names: Vec::new(),
            finish_reason_overrides: IndexMap::new(),
            requires_agent_request_type: false,
            harvest_inline_tool_calls: true,
            reasoning_tag: None,
            flatten_mixed_content: false,
        }
    }

    fn response(text: &str) -> CanonicalChatResponse {
        CanonicalChatResponse {
            id: "r1".to_string(),
            model: "glm-4.7".to_string(),
            message: CanonicalMessage::text(Role::Assistant, text),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    #[test]
    fn promotes_tagged_tool_call_to_structured_part() {
        let profile = harvesting_profile();
        let mut response = response(
            r#"Let me check that file.<tool_calls>[{"name":"read_file","arguments":{"path":"README.md"}}]</tool_calls>"#,
        );

        harvest_inline_tool_calls(&profile, &mut response);

        let MessageContent::Parts(parts) = &response.message.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], ContentPart::Text { text } if text == "Let me check that file."));
        let ContentPart::ToolUseRequest { id, name, input } = &parts[1] else {
            panic!("expected tool use request");
        };
        assert_eq!(id, "call_0");
        assert_eq!(name, "read_file");
        assert_eq!(input["path"], "README.md");
    }

    #[test]
    fn promotes_fenced_json_tool_call() {
        let profile = harvesting_profile();
        let mut response = response("```json\n{\"name\": \"read_file\", \"parameters\": {\"path\": \"a.txt\"}}\n```");

        harvest_inline_tool_calls(&profile, &mut response);

        let MessageContent::Parts(parts) = &response.message.content else {
            panic!("expected parts");
        };
        let ContentPart::ToolUseRequest { name, input, .. } = &parts[0] else {
            panic!("expected tool use request");
        };
        assert_eq!(name, "read_file");
        assert_eq!(input["path"], "a.txt");
    }

    #[test]
    fn leaves_plain_text_untouched_when_no_marker_present() {
        let profile = harvesting_profile();
        let mut response = response("just a plain answer");

        harvest_inline_tool_calls(&profile, &mut response);

        assert!(matches!(&response.message.content, MessageContent::Text(text) if text == "just a plain answer"));
    }

    #[test]
    fn disabled_profile_is_a_no_op() {
        let mut profile = harvesting_profile();
        profile.harvest_inline_tool_calls = false;
        let mut response = response(r#"<tool_calls>[{"name":"x","arguments":{}}]</tool_calls>"#);

        harvest_inline_tool_calls(&profile, &mut response);

        assert!(matches!(&response.message.content, MessageContent::Text(_)));
    }
}
