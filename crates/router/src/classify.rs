//! Route category classification (spec §4.5 "Classification rules;
//! applied in order; first match wins").

use config::{RouteCategory, RoutingConfig};
use protocol::CanonicalChatRequest;

/// Classifies `request` into a route category, given its already-estimated
/// prompt token count and the resolved target's context window (needed
/// for the long-context `warnRatio` leg of rule 3). Rule 1 (explicit
/// directive) is handled by the caller before this runs, since a
/// directive bypasses classification entirely rather than selecting a
/// category (spec §4.5 rule 1).
pub fn classify(request: &CanonicalChatRequest, config: &RoutingConfig, estimated_tokens: u32, max_context_tokens: u64) -> RouteCategory {
    if request.has_image_part() {
        return RouteCategory::Vision;
    }

    let warn_threshold = (max_context_tokens as f64 * config.warn_ratio) as u64;
    if u64::from(estimated_tokens) >= config.long_context_threshold_tokens || u64::from(estimated_tokens) >= warn_threshold {
        return RouteCategory::LongContext;
    }

    let user_text = request.flatten_user_text();
    let lower_text = user_text.to_ascii_lowercase();

    let tool_names_match_coding = request.tools.iter().any(|tool| config.coding_keywords.iter().any(|kw| tool.name.contains(kw.as_str())));
    if tool_names_match_coding || contains_any(&lower_text, &config.coding_keywords) {
        return RouteCategory::Coding;
    }

    if contains_any(&lower_text, &config.thinking_keywords) {
        return RouteCategory::Thinking;
    }

    if !request.tools.is_empty() {
        return RouteCategory::Tools;
    }

    if contains_any(&lower_text, &config.search_keywords) {
        return RouteCategory::WebSearch;
    }

    RouteCategory::Default
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{CanonicalMessage, ContentPart, ImageSource, MessageContent, Role, ToolDef};
    use serde_json::Value;

    fn request_with_text(text: &str) -> CanonicalChatRequest {
        CanonicalChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![CanonicalMessage::text(Role::User, text)],
            ..Default::default()
        }
    }

    #[test]
    fn vision_wins_when_an_image_part_is_present() {
        let mut request = request_with_text("describe this");
        request.messages[0].content = MessageContent::Parts(vec![ContentPart::ImageReference {
            source: ImageSource::Url { url: "https://example.test/x.png".to_string() },
        }]);

        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::Vision);
    }

    #[test]
    fn long_context_wins_over_keyword_categories() {
        let request = request_with_text("please apply_patch to this file");
        let category = classify(&request, &RoutingConfig::default(), 200_000, 200_000);
        assert_eq!(category, RouteCategory::LongContext);
    }

    #[test]
    fn warn_ratio_of_target_window_also_triggers_long_context() {
        let request = request_with_text("short");
        // 95% of a 1000-token window is within the default 0.9 warn ratio.
        let category = classify(&request, &RoutingConfig::default(), 950, 1_000);
        assert_eq!(category, RouteCategory::LongContext);
    }

    #[test]
    fn coding_keyword_in_user_text_wins_over_tools() {
        let mut request = request_with_text("please apply_patch here");
        request.tools.push(ToolDef { name: "search".to_string(), description: String::new(), parameters: Value::Null });

        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::Coding);
    }

    #[test]
    fn thinking_keyword_wins_over_tools() {
        let mut request = request_with_text("think step by step about this");
        request.tools.push(ToolDef { name: "search".to_string(), description: String::new(), parameters: Value::Null });

        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::Thinking);
    }

    #[test]
    fn non_empty_tools_with_no_keyword_match_is_tools() {
        let mut request = request_with_text("plain request");
        request.tools.push(ToolDef { name: "lookup".to_string(), description: String::new(), parameters: Value::Null });

        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::Tools);
    }

    #[test]
    fn search_keyword_wins_when_no_tools_present() {
        let request = request_with_text("please search the web for this");
        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::WebSearch);
    }

    #[test]
    fn plain_request_falls_back_to_default() {
        let request = request_with_text("hello there");
        let category = classify(&request, &RoutingConfig::default(), 10, 200_000);
        assert_eq!(category, RouteCategory::Default);
    }
}
