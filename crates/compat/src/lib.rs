//! Compatibility layer (spec §4.3): per-provider request/response
//! adjustments the codec (C1) alone can't express. Pure — no I/O, no
//! side effects besides logging — so identical input and profile always
//! produce identical output (spec §4.3 "Contract").
//!
//! Every provider quirk here is read out of [`config::ProviderConfig`]
//! rather than branched on `ProviderType` in code (spec §9
//! "Configuration-first discipline"); the one exception is Gemini's
//! bare-marker tool shape (`{"googleSearch": {}}`), which has no
//! equivalent in the canonical function-tool model and so is translated
//! generically for any tool name the profile allows through, grounded on
//! the teacher's `llm/src/provider/google.rs` request-shape conversion.

mod finish_reason;
mod reasoning;
mod tool_calls;
mod tools;

pub use finish_reason::rewrite_finish_reason_json;
pub use reasoning::extract_reasoning;
pub use tool_calls::harvest_inline_tool_calls;
pub use tools::{filter_canonical_tools, preprocess_wire_body};

use config::ProviderConfig;
use protocol::CanonicalChatResponse;

/// Runs every pure per-response compat step in the processing order spec
/// §4.3 mandates for everything that operates on the already-decoded
/// canonical form: tool-call harvesting from text, then reasoning
/// extraction, then (if configured) content-array flattening.
///
/// Finish-reason normalization is deliberately not part of this
/// function: the codec's `decode_response` must already see a
/// recognized finish-reason string to produce a `CanonicalChatResponse`
/// at all, so that substitution has to run on the raw wire JSON via
/// [`rewrite_finish_reason_json`] *before* decoding, not after. The
/// processing order in §4.3 describes the conceptual pipeline; this is
/// the one step whose implementation necessarily runs earlier than its
/// position in that list, and it is taken from the raw `finish_reason`/
/// `stop_reason` field rather than the canonical one, so the ordering
/// constraint between the other three steps is unaffected.
pub fn apply_response(profile: &ProviderConfig, response: &mut CanonicalChatResponse) {
    harvest_inline_tool_calls(profile, response);
    extract_reasoning(profile, response);
    if profile.flatten_mixed_content {
        tools::flatten_mixed_content(&mut response.message);
    }
}
