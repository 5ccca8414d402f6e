//! Reasoning extraction (spec §4.3 "Reasoning extraction"): some
//! providers interleave a chain-of-thought block inside the visible
//! content, wrapped in a configurable tag (`<reasoning>...</reasoning>`
//! is a common choice, but nothing fires unless a provider profile names
//! one). This pulls it out into its own canonical `Reasoning` part, ahead
//! of the remaining visible text.

use config::ProviderConfig;
use protocol::{CanonicalChatResponse, ContentPart, MessageContent};
use regex::Regex;

/// Extracts the first `<tag>...</tag>` block from `response.message`'s
/// text content into a leading `ContentPart::Reasoning`, leaving any
/// remaining text in a trailing `ContentPart::Text`. No-op if
/// `profile.reasoning_tag` names no tag, or the tag isn't present, matching
/// every other opt-in `ProviderConfig` knob.
pub fn extract_reasoning(profile: &ProviderConfig, response: &mut CanonicalChatResponse) {
    let Some(tag) = profile.reasoning_tag.as_deref() else {
        return;
    };

    let text = match &response.message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => {
            // Only single leading text parts are scanned; a response already
            // carrying structured tool-call parts has nothing left to scan.
            match parts.as_slice() {
                [ContentPart::Text { text }] => text.clone(),
                _ => return,
            }
        }
    };

    let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>");
    let Ok(regex) = Regex::new(&pattern) else { return };
    let Some(captures) = regex.captures(&text) else {
        return;
    };

    let reasoning_text = captures[1].trim().to_string();
    let whole = captures.get(0).expect("group 0 always present");
    let remainder = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
    let remainder = remainder.trim();

    let mut parts = vec![ContentPart::Reasoning { text: reasoning_text }];
    if !remainder.is_empty() {
        parts.push(ContentPart::Text { text: remainder.to_string() });
    }

    response.message.content = MessageContent::Parts(parts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ApiKeyConfig, AuthConfig, ProviderType};
    use indexmap::IndexMap;
    use protocol::{CanonicalMessage, FinishReason, Role, Usage};

    fn profile_with_tag(tag: Option<&str>) -> ProviderConfig {
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
            harvest_inline_tool_calls: false,
            reasoning_tag: tag.map(str::to_string),
            flatten_mixed_content: false,
        }
    }

    fn response(text: &str) -> CanonicalChatResponse {
        CanonicalChatResponse {
            id: "r1".to_string(),
            model: "qwen-plus".to_string(),
            message: CanonicalMessage::text(Role::Assistant, text),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    #[test]
    fn extracts_reasoning_tag_when_configured() {
        let profile = profile_with_tag(Some("reasoning"));
        let mut response = response("<reasoning>first think about X</reasoning>then the answer");

        extract_reasoning(&profile, &mut response);

        let MessageContent::Parts(parts) = &response.message.content else {
            panic!("expected parts");
        };
        assert!(matches!(&parts[0], ContentPart::Reasoning { text } if text == "first think about X"));
        assert!(matches!(&parts[1], ContentPart::Text { text } if text == "then the answer"));
    }

    #[test]
    fn leaves_text_untouched_when_no_tag_configured() {
        let profile = profile_with_tag(None);
        let mut response = response("<reasoning>first think about X</reasoning>then the answer");

        extract_reasoning(&profile, &mut response);

        assert!(matches!(&response.message.content, MessageContent::Text(_)));
    }

    #[test]
    fn uses_configured_tag_name() {
        let profile = profile_with_tag(Some("think"));
        let mut response = response("<think>scratch work</think>final");

        extract_reasoning(&profile, &mut response);

        let MessageContent::Parts(parts) = &response.message.content else {
            panic!("expected parts");
        };
        assert!(matches!(&parts[0], ContentPart::Reasoning { text } if text == "scratch work"));
    }

    #[test]
    fn leaves_text_without_tag_untouched() {
        let profile = profile_with_tag(None);
        let mut response = response("no reasoning block here");

        extract_reasoning(&profile, &mut response);

        assert!(matches!(&response.message.content, MessageContent::Text(_)));
    }
}
