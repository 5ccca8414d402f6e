//! Inline `<**provider.model**>` routing directive extraction (spec §3,
//! §4.5 rule 1, §9 Open Question 1 decision).
//!
//! Grammar (decided per the Open Question — recorded in DESIGN.md): a
//! directive starts at `<**`, then a greedy match of one-or-more
//! characters that are not `*`, up to the first `**>`. Anything that
//! doesn't close before end-of-text, or contains no characters between
//! the markers, is left as literal text rather than stripped.

use config::DirectivePrecedence;

use crate::canonical::RoutingDirective;

/// Finds the first well-formed directive in `text` and returns it along
/// with `text` with the directive (and exactly the matched markers)
/// removed. Returns `None` (unchanged text implied by the caller) if no
/// well-formed directive is present.
pub fn extract_directive(text: &str) -> (Option<RoutingDirective>, String) {
    let Some(start) = text.find("<**") else {
        return (None, text.to_string());
    };

    let after_open = &text[start + 3..];
    let Some(close_rel) = after_open.find("**>") else {
        return (None, text.to_string());
    };

    let body = &after_open[..close_rel];
    if body.is_empty() || body.contains('*') {
        return (None, text.to_string());
    }

    let Some((provider_id, model_id)) = body.split_once('.') else {
        return (None, text.to_string());
    };

    if provider_id.is_empty() || model_id.is_empty() {
        return (None, text.to_string());
    }

    let end = start + 3 + close_rel + 3;
    let mut stripped = String::with_capacity(text.len() - (end - start));
    stripped.push_str(&text[..start]);
    stripped.push_str(&text[end..]);

    (
        Some(RoutingDirective {
            provider_id: provider_id.to_string(),
            model_id: model_id.to_string(),
        }),
        stripped,
    )
}

/// Parses an explicit `provider.model` prefix out of a bare model field
/// (spec §3 Canonical Chat Request, `model`). Only splits on the first
/// `.`; a model id may itself contain dots (e.g. `gpt-4.1` has none, but
/// `glm-4.7` does) — callers should prefer this only when the caller
/// knows the prefix names a configured provider, otherwise treat the
/// whole string as a bare model id.
pub fn split_provider_prefix(model: &str) -> Option<(&str, &str)> {
    model.split_once('.')
}

/// Resolves the final routing directive for a request from its two
/// possible sources (spec §9 Open Question 2): an inline `<**...**>`
/// marker already extracted from message text, and an explicit
/// `provider.model` prefix on the wire request's `model` field. When
/// both are present, `precedence` decides which one wins; when only one
/// is present (or neither), that is the result.
pub fn resolve_directive(inline: Option<RoutingDirective>, model_field: &str, precedence: DirectivePrecedence) -> Option<RoutingDirective> {
    let from_model_field = split_provider_prefix(model_field).map(|(provider_id, model_id)| RoutingDirective {
        provider_id: provider_id.to_string(),
        model_id: model_id.to_string(),
    });

    match (inline, from_model_field) {
        (Some(inline), Some(from_model_field)) => Some(match precedence {
            DirectivePrecedence::InlineFirst => inline,
            DirectivePrecedence::ModelFieldFirst => from_model_field,
        }),
        (Some(inline), None) => Some(inline),
        (None, Some(from_model_field)) => Some(from_model_field),
        (None, None) => None,
    }
}
