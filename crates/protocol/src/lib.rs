//! Protocol codecs (spec §4.1): decode/encode between each wire protocol
//! RouteCodex speaks and the canonical representation every other
//! component operates on.

pub mod anthropic;
pub mod canonical;
pub mod directive;
pub mod error;
pub mod openai;
pub mod responses;
pub mod sse;

pub use canonical::{
    CanonicalChatRequest, CanonicalChatResponse, CanonicalMessage, ContentPart, ExtraFields, FinishReason,
    ImageSource, MessageContent, Role, RoutingDirective, Sampling, ToolChoice, ToolChoiceMode, ToolDef,
    ToolResultContent, Usage,
};
pub use directive::{extract_directive, split_provider_prefix};
pub use error::DecodeError;

/// The wire protocol a request was decoded from / a response should be
/// encoded back into (spec §4.1, §6 per-endpoint dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    OpenAiChat,
    OpenAiResponses,
    AnthropicMessages,
}

impl WireProtocol {
    /// Decodes a wire request into canonical form, resolving the final
    /// routing directive from whichever of the inline `<**...**>` marker
    /// and the `model` field's `provider.model` prefix are present, per
    /// `directive_precedence` when both are (spec §9 Open Question 2).
    pub fn decode_request(self, payload: &[u8], directive_precedence: config::DirectivePrecedence) -> Result<CanonicalChatRequest, DecodeError> {
        match self {
            WireProtocol::OpenAiChat => openai::decode_request(payload, directive_precedence),
            WireProtocol::OpenAiResponses => responses::decode_request(payload, directive_precedence),
            WireProtocol::AnthropicMessages => anthropic::decode_request(payload, directive_precedence),
        }
    }

    pub fn encode_response(self, canonical: &CanonicalChatResponse) -> serde_json::Value {
        match self {
            WireProtocol::OpenAiChat => serde_json::to_value(openai::encode_response(canonical)),
            WireProtocol::OpenAiResponses => serde_json::to_value(responses::encode_response(canonical)),
            WireProtocol::AnthropicMessages => serde_json::to_value(anthropic::encode_response(canonical)),
        }
        .unwrap_or(serde_json::Value::Null)
    }

    /// Encodes a canonical request into this protocol's wire shape, for
    /// forwarding to a target that speaks it (spec §4.1 `encodeRequest`).
    pub fn encode_request(self, canonical: &CanonicalChatRequest) -> serde_json::Value {
        match self {
            WireProtocol::OpenAiChat => serde_json::to_value(openai::encode_request(canonical)),
            WireProtocol::OpenAiResponses => serde_json::to_value(responses::encode_request(canonical)),
            WireProtocol::AnthropicMessages => serde_json::to_value(anthropic::encode_request(canonical)),
        }
        .unwrap_or(serde_json::Value::Null)
    }

    /// Decodes a target's response payload into canonical form (spec
    /// §4.1 `decodeResponse`).
    pub fn decode_response(self, payload: &[u8]) -> Result<CanonicalChatResponse, DecodeError> {
        match self {
            WireProtocol::OpenAiChat => openai::decode_response(payload),
            WireProtocol::OpenAiResponses => responses::decode_response(payload),
            WireProtocol::AnthropicMessages => anthropic::decode_response(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_protocol_dispatches_decode_to_the_right_codec() {
        let payload = serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}]
        });

        let request = WireProtocol::OpenAiChat
            .decode_request(payload.to_string().as_bytes(), config::DirectivePrecedence::default())
            .unwrap();
        assert_eq!(request.model, "gpt-4");
    }
}
