//! Provider-specific finish-reason substitutions (spec §4.3
//! "Finish-reason value substitutions beyond the canonical set"),
//! applied to the raw wire JSON before the codec decodes it — the codec
//! only recognizes the universal spellings in spec §4.1's table, so a
//! provider emitting something else must be rewritten first or decoding
//! fails outright.

use config::ProviderConfig;
use protocol::WireProtocol;
use serde_json::Value;

/// Rewrites every `finish_reason`/`stop_reason`/`status` occurrence in
/// `body` that matches a key in `profile.finish_reason_overrides` to its
/// configured canonical-spelling replacement, in place.
pub fn rewrite_finish_reason_json(profile: &ProviderConfig, body: &mut Value, wire: WireProtocol) {
    if profile.finish_reason_overrides.is_empty() {
        return;
    }

    match wire {
        WireProtocol::OpenAiChat => {
            if let Some(choices) = body.get_mut("choices").and_then(Value::as_array_mut) {
                for choice in choices {
                    rewrite_field(profile, choice, "finish_reason");
                }
            }
        }
        WireProtocol::AnthropicMessages => {
            rewrite_field(profile, body, "stop_reason");
        }
        WireProtocol::OpenAiResponses => {
            rewrite_field(profile, body, "status");
        }
    }
}

fn rewrite_field(profile: &ProviderConfig, value: &mut Value, field: &str) {
    let Some(raw) = value.get(field).and_then(Value::as_str) else {
        return;
    };
    if let Some(mapped) = profile.finish_reason_overrides.get(raw) {
        value[field] = Value::String(mapped.clone());
    }
}
