//! Tool-schema restriction (spec §4.3 "Tool schema restrictions") and the
//! Gemini/Antigravity wire-body preprocessors (spec §4.2 Common contract,
//! scenario S6).

use config::ProviderConfig;
use protocol::{CanonicalMessage, ContentPart, MessageContent, ToolDef};
use serde_json::Value;

/// Drops every tool whose name isn't in `profile.allowed_tool_names`
/// (spec §4.3 rule 1, step "tool-schema filtering"). A provider with no
/// restriction configured passes every tool through unchanged.
pub fn filter_canonical_tools(profile: &ProviderConfig, tools: &mut Vec<ToolDef>) {
    if profile.allowed_tool_names.is_empty() {
        return;
    }
    tools.retain(|tool| profile.allowed_tool_names.iter().any(|allowed| allowed == &tool.name));
}

/// Applies the provider-specific preprocessors step (spec §4.3, run after
/// field mapping, just before send) directly to the encoded wire body.
/// Only meaningful for providers whose wire shape needs something the
/// canonical model can't express: Gemini/Antigravity's `requestType`
/// field, dropped `session_id`, and bare-marker tools (S6).
pub fn preprocess_wire_body(profile: &ProviderConfig, body: &mut Value) {
    let Value::Object(map) = body else { return };

    if profile.requires_agent_request_type {
        map.insert("requestType".to_string(), Value::String("agent".to_string()));
        map.remove("session_id");
    }

    if !profile.allowed_tool_names.is_empty() {
        rewrite_tools_to_bare_markers(profile, map);
    }
}

/// Replaces an OpenAI-shaped `tools:[{type:"function",function:{name,...}}]`
/// array with Gemini's bare-marker shape (`[{"googleSearch": {}}]`),
/// keeping only names the profile allows and dropping the field entirely
/// once nothing remains (spec §4.3: "if zero remain after filtering, the
/// tools field is removed").
fn rewrite_tools_to_bare_markers(profile: &ProviderConfig, map: &mut serde_json::Map<String, Value>) {
    let Some(tools) = map.get("tools").and_then(Value::as_array) else {
        return;
    };

    let rewritten: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let name = tool
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .or_else(|| tool.get("name").and_then(Value::as_str))?;

            profile
                .allowed_tool_names
                .iter()
                .any(|allowed| allowed == name)
                .then(|| serde_json::json!({ name: {} }))
        })
        .collect();

    if rewritten.is_empty() {
        map.remove("tools");
    } else {
        map.insert("tools".to_string(), Value::Array(rewritten));
    }
}

/// Collapses a mixed content-part array down to plain text once tool
/// calls and reasoning have already been pulled out by the earlier
/// steps, for providers whose wire shape can't carry a structured array
/// (spec §4.3 "Content array flattening rules").
pub fn flatten_mixed_content(message: &mut CanonicalMessage) {
    let MessageContent::Parts(parts) = &message.content else {
        return;
    };

    if parts.iter().any(|p| matches!(p, ContentPart::ToolUseRequest { .. } | ContentPart::ToolUseResult { .. })) {
        return;
    }

    let flattened = parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    message.content = MessageContent::Text(flattened);
}
