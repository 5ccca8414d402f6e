//! Bridges `context::InboundProtocol` (what a client connected with) to
//! `protocol::WireProtocol` (what a codec speaks), and resolves which wire
//! protocol a target itself speaks.

use config::ProviderType;
use context::InboundProtocol;
use protocol::WireProtocol;

pub fn inbound_to_wire(inbound: InboundProtocol) -> WireProtocol {
    match inbound {
        InboundProtocol::OpenAiChat => WireProtocol::OpenAiChat,
        InboundProtocol::OpenAiResponses => WireProtocol::OpenAiResponses,
        InboundProtocol::AnthropicMessages => WireProtocol::AnthropicMessages,
    }
}

/// The wire protocol a target speaks, mirroring `provider::endpoint_suffix`'s
/// family grouping: Gemini/Antigravity speak an OpenAI-compatible
/// chat-completions shape once compat (C3) has applied its field mappings.
pub fn target_wire_protocol(provider_type: ProviderType) -> WireProtocol {
    match provider_type {
        ProviderType::OpenAiCompatible | ProviderType::Gemini => WireProtocol::OpenAiChat,
        ProviderType::Anthropic => WireProtocol::AnthropicMessages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_shares_openai_chat_wire_shape_with_openai_compatible() {
        assert_eq!(target_wire_protocol(ProviderType::Gemini), WireProtocol::OpenAiChat);
        assert_eq!(target_wire_protocol(ProviderType::OpenAiCompatible), WireProtocol::OpenAiChat);
    }

    #[test]
    fn anthropic_targets_speak_anthropic_messages() {
        assert_eq!(target_wire_protocol(ProviderType::Anthropic), WireProtocol::AnthropicMessages);
    }

    #[test]
    fn inbound_protocol_maps_one_to_one_onto_wire_protocol() {
        assert_eq!(inbound_to_wire(InboundProtocol::OpenAiChat), WireProtocol::OpenAiChat);
        assert_eq!(inbound_to_wire(InboundProtocol::OpenAiResponses), WireProtocol::OpenAiResponses);
        assert_eq!(inbound_to_wire(InboundProtocol::AnthropicMessages), WireProtocol::AnthropicMessages);
    }
}
