//! Prompt token estimation (spec §4.5 "Token estimation"): a default
//! 4-characters-per-token heuristic with a CJK lookup, and a pluggable
//! exact path backed by `tiktoken-rs` for model families it recognizes.

use protocol::CanonicalChatRequest;

const ASCII_CHARS_PER_TOKEN: f64 = 4.0;
/// CJK text tokenizes far denser than the ASCII heuristic assumes; these
/// code point ranges (CJK Unified Ideographs, Hiragana/Katakana, Hangul
/// Syllables) are counted roughly one token per character instead.
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3
    )
}

/// Estimates the token count of `text` using the spec's default
/// heuristic: CJK code points count as one token each, everything else
/// is counted at `ASCII_CHARS_PER_TOKEN` characters per token.
fn heuristic_estimate(text: &str) -> u32 {
    let mut cjk_chars = 0u32;
    let mut other_chars = 0u32;
    for c in text.chars() {
        if is_cjk(c) {
            cjk_chars += 1;
        } else {
            other_chars += 1;
        }
    }
    let ascii_tokens = (f64::from(other_chars) / ASCII_CHARS_PER_TOKEN).ceil();
    cjk_chars + ascii_tokens as u32
}

/// Resolves a tiktoken-rs encoding for a model family, when one is known.
/// Unrecognized model names fall back to the heuristic rather than
/// erroring, since nothing upstream guarantees the model name matches any
/// OpenAI family.
fn exact_encoding_for_model(model: &str) -> Option<&'static tiktoken_rs::CoreBPE> {
    let lower = model.to_ascii_lowercase();
    if lower.starts_with("gpt-4o") || lower.starts_with("o1") || lower.starts_with("o3") {
        return Some(tiktoken_rs::o200k_base_singleton());
    }
    if lower.starts_with("gpt-4") || lower.starts_with("gpt-3.5") {
        return Some(tiktoken_rs::cl100k_base_singleton());
    }
    None
}

/// Estimates the total prompt token count for `request`: system prompt,
/// every message's flattened text, and tool definitions' JSON-serialized
/// size (counted under the same heuristic, since tool schemas ride along
/// in the prompt budget).
pub fn estimate_prompt_tokens(request: &CanonicalChatRequest) -> u32 {
    let encoding = exact_encoding_for_model(&request.model);

    let mut total = 0u32;
    if let Some(system) = &request.system {
        total += count(system, encoding);
    }
    for message in &request.messages {
        total += count(&message.flatten_text(), encoding);
    }
    for tool in &request.tools {
        total += count(&tool.name, encoding);
        total += count(&tool.description, encoding);
        total += count(&tool.parameters.to_string(), encoding);
    }
    total
}

fn count(text: &str, encoding: Option<&tiktoken_rs::CoreBPE>) -> u32 {
    match encoding {
        Some(bpe) => bpe.encode_ordinary(text).len() as u32,
        None => heuristic_estimate(text),
    }
}
