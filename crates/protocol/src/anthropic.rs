//! Anthropic Messages wire protocol (spec §4.1, §6 `POST /v1/messages`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{
    CanonicalChatRequest, CanonicalChatResponse, CanonicalMessage, ContentPart, FinishReason, ImageSource,
    MessageContent, Role, Sampling, ToolChoice, ToolChoiceMode, ToolDef, ToolResultContent, Usage,
};
use crate::directive::extract_directive;
use crate::error::DecodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessagesRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system: Option<AnthropicSystem>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_choice: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicSystem {
    Text(String),
    Blocks(Vec<AnthropicSystemBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicSystemBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: AnthropicContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Image {
        source: AnthropicImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        content: Option<AnthropicToolResultContent>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicToolResultContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessageResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop_sequence: Option<String>,
    pub usage: AnthropicUsage,
}

pub fn decode_request(payload: &[u8], directive_precedence: config::DirectivePrecedence) -> Result<CanonicalChatRequest, DecodeError> {
    let wire: AnthropicMessagesRequest = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;

    let system = wire.system.map(|s| match s {
        AnthropicSystem::Text(t) => t,
        AnthropicSystem::Blocks(blocks) => blocks.into_iter().map(|b| b.text).collect::<Vec<_>>().join("\n"),
    });

    let mut messages = Vec::with_capacity(wire.messages.len());
    let mut routing_directive = None;

    for msg in wire.messages {
        let role = match msg.role {
            AnthropicRole::User => Role::User,
            AnthropicRole::Assistant => Role::Assistant,
        };

        let mut content = match msg.content {
            AnthropicContent::Text(text) => MessageContent::Text(text),
            AnthropicContent::Blocks(blocks) => {
                MessageContent::Parts(blocks.into_iter().map(decode_content_block).collect::<Result<_, _>>()?)
            }
        };

        if role == Role::User
            && let MessageContent::Text(text) = &content
        {
            let (directive, stripped) = extract_directive(text);
            if let Some(directive) = directive {
                routing_directive = Some(directive);
                content = MessageContent::Text(stripped);
            }
        }

        messages.push(CanonicalMessage {
            role,
            content,
            tool_call_id: None,
        });
    }

    let tools = wire
        .tools
        .unwrap_or_default()
        .into_iter()
        .map(|t| ToolDef {
            name: t.name,
            description: t.description,
            parameters: t.input_schema,
        })
        .collect();

    let tool_choice = wire.tool_choice.map(decode_tool_choice).transpose()?;
    let routing_directive = crate::directive::resolve_directive(routing_directive, &wire.model, directive_precedence);

    Ok(CanonicalChatRequest {
        model: wire.model,
        messages,
        system,
        tools,
        tool_choice,
        stream: wire.stream,
        sampling: Sampling {
            temperature: wire.temperature,
            top_p: wire.top_p,
            max_tokens: Some(wire.max_tokens),
        },
        routing_directive,
    })
}

fn decode_content_block(block: AnthropicContentBlock) -> Result<ContentPart, DecodeError> {
    Ok(match block {
        AnthropicContentBlock::Text { text } => ContentPart::Text { text },
        AnthropicContentBlock::Image { source } => ContentPart::ImageReference {
            source: match source {
                AnthropicImageSource::Base64 { media_type, data } => ImageSource::Base64 { media_type, data },
                AnthropicImageSource::Url { url } => ImageSource::Url { url },
            },
        },
        AnthropicContentBlock::ToolUse { id, name, input } => ContentPart::ToolUseRequest { id, name, input },
        AnthropicContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => ContentPart::ToolUseResult {
            tool_use_id,
            content: match content {
                Some(AnthropicToolResultContent::Text(t)) => ToolResultContent::Text(t),
                Some(AnthropicToolResultContent::Blocks(blocks)) => ToolResultContent::Multiple(
                    blocks
                        .into_iter()
                        .filter_map(|b| match b {
                            AnthropicContentBlock::Text { text } => Some(text),
                            _ => None,
                        })
                        .collect(),
                ),
                None => ToolResultContent::Text(String::new()),
            },
            is_error,
        },
    })
}

fn decode_tool_choice(value: Value) -> Result<ToolChoice, DecodeError> {
    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        name: Option<String>,
    }

    let wrapper: Wrapper = serde_json::from_value(value).map_err(DecodeError::from_serde_json)?;
    match wrapper.kind.as_str() {
        "auto" => Ok(ToolChoice::Mode(ToolChoiceMode::Auto)),
        "any" => Ok(ToolChoice::Mode(ToolChoiceMode::Required)),
        "none" => Ok(ToolChoice::Mode(ToolChoiceMode::None)),
        "tool" => Ok(ToolChoice::Named {
            name: wrapper.name.ok_or_else(|| DecodeError::malformed("tool_choice.name", "missing"))?,
        }),
        other => Err(DecodeError::unsupported(format!("unknown tool_choice type '{other}'"))),
    }
}

pub fn encode_request(canonical: &CanonicalChatRequest) -> AnthropicMessagesRequest {
    AnthropicMessagesRequest {
        model: canonical.model.clone(),
        messages: canonical.messages.iter().map(encode_message).collect(),
        max_tokens: canonical.sampling.max_tokens.unwrap_or(4096),
        system: canonical.system.clone().map(AnthropicSystem::Text),
        temperature: canonical.sampling.temperature,
        top_p: canonical.sampling.top_p,
        top_k: None,
        stop_sequences: None,
        stream: canonical.stream,
        tools: (!canonical.tools.is_empty()).then(|| {
            canonical
                .tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect()
        }),
        tool_choice: canonical.tool_choice.as_ref().map(encode_tool_choice),
    }
}

fn encode_message(msg: &CanonicalMessage) -> AnthropicMessage {
    let role = match msg.role {
        Role::Assistant => AnthropicRole::Assistant,
        _ => AnthropicRole::User,
    };

    let content = match &msg.content {
        MessageContent::Text(text) => AnthropicContent::Text(text.clone()),
        MessageContent::Parts(parts) => {
            let blocks = parts
                .iter()
                .filter_map(|part| encode_content_part(part, msg.tool_call_id.as_deref()))
                .collect();
            AnthropicContent::Blocks(blocks)
        }
    };

    AnthropicMessage { role, content }
}

fn encode_content_part(part: &ContentPart, tool_call_id: Option<&str>) -> Option<AnthropicContentBlock> {
    Some(match part {
        ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentPart::ImageReference { source } => AnthropicContentBlock::Image {
            source: match source {
                ImageSource::Base64 { media_type, data } => AnthropicImageSource::Base64 {
                    media_type: media_type.clone(),
                    data: data.clone(),
                },
                ImageSource::Url { url } => AnthropicImageSource::Url { url: url.clone() },
            },
        },
        ContentPart::ToolUseRequest { id, name, input } => AnthropicContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentPart::ToolUseResult {
            tool_use_id,
            content,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id: if tool_use_id.is_empty() {
                tool_call_id.unwrap_or_default().to_string()
            } else {
                tool_use_id.clone()
            },
            content: Some(AnthropicToolResultContent::Text(content.as_text())),
            is_error: *is_error,
        },
        ContentPart::Reasoning { .. } => return None,
    })
}

fn encode_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => serde_json::json!({"type": "auto"}),
        ToolChoice::Mode(ToolChoiceMode::Required) => serde_json::json!({"type": "any"}),
        ToolChoice::Mode(ToolChoiceMode::None) => serde_json::json!({"type": "none"}),
        ToolChoice::Named { name } => serde_json::json!({"type": "tool", "name": name}),
    }
}

pub fn decode_response(payload: &[u8]) -> Result<CanonicalChatResponse, DecodeError> {
    let wire: AnthropicMessageResponse = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;

    let finish_reason = wire
        .stop_reason
        .as_deref()
        .and_then(FinishReason::from_anthropic)
        .ok_or_else(|| DecodeError::unsupported(format!("unknown stop_reason '{:?}'", wire.stop_reason)))?;

    let parts: Vec<ContentPart> = wire
        .content
        .into_iter()
        .map(|block| decode_content_block(block))
        .collect::<Result<_, _>>()?;

    let content = if parts.len() == 1
        && let ContentPart::Text { text } = &parts[0]
    {
        MessageContent::Text(text.clone())
    } else {
        MessageContent::Parts(parts)
    };

    Ok(CanonicalChatResponse {
        id: wire.id,
        model: wire.model,
        message: CanonicalMessage {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason,
        usage: Usage {
            input_tokens: wire.usage.input_tokens,
            output_tokens: wire.usage.output_tokens,
        },
    })
}

pub fn encode_response(canonical: &CanonicalChatResponse) -> AnthropicMessageResponse {
    let content = match &canonical.message.content {
        MessageContent::Text(text) => vec![AnthropicContentBlock::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| encode_content_part(p, canonical.message.tool_call_id.as_deref()))
            .collect(),
    };

    AnthropicMessageResponse {
        id: canonical.id.clone(),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: canonical.model.clone(),
        stop_reason: Some(canonical.finish_reason.to_anthropic().to_string()),
        stop_sequence: None,
        usage: AnthropicUsage {
            input_tokens: canonical.usage.input_tokens,
            output_tokens: canonical.usage.output_tokens,
        },
    }
}
