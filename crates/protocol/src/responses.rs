//! OpenAI Responses protocol (spec §4.1 SUPPLEMENT, §6 `POST /v1/responses`).
//!
//! No teacher precedent for this wire shape (the teacher only speaks Chat
//! Completions and Anthropic Messages); authored from the Responses
//! `input[]`/`output[]` item-array shape documented in spec.md, following
//! the same tagged-enum-per-item-type idiom `canonical.rs` uses for
//! `ContentPart`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{
    CanonicalChatRequest, CanonicalChatResponse, CanonicalMessage, ContentPart, FinishReason, MessageContent, Role,
    Sampling, ToolDef, Usage,
};
use crate::directive::extract_directive;
use crate::error::DecodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: ResponsesInput,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Vec<ResponsesTool>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Items(Vec<ResponsesItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesItem {
    Message {
        role: String,
        content: ResponsesMessageContent,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesMessageContent {
    Text(String),
    Parts(Vec<ResponsesContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContentPart {
    InputText { text: String },
    OutputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,
    pub model: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub incomplete_details: Option<ResponsesIncompleteDetails>,
    pub output: Vec<ResponsesItem>,
    pub usage: ResponsesUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesIncompleteDetails {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponsesUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub fn decode_request(payload: &[u8], directive_precedence: config::DirectivePrecedence) -> Result<CanonicalChatRequest, DecodeError> {
    let wire: ResponsesRequest = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;

    let mut messages = Vec::new();
    let mut routing_directive = None;

    match wire.input {
        ResponsesInput::Text(text) => {
            let (directive, stripped) = extract_directive(&text);
            routing_directive = directive;
            messages.push(CanonicalMessage::text(Role::User, stripped));
        }
        ResponsesInput::Items(items) => {
            for item in items {
                match item {
                    ResponsesItem::Message { role, content } => {
                        let role = match role.as_str() {
                            "system" | "developer" => Role::System,
                            "assistant" => Role::Assistant,
                            _ => Role::User,
                        };
                        let mut text = decode_message_content(content);
                        if role == Role::User {
                            let (directive, stripped) = extract_directive(&text);
                            if let Some(directive) = directive {
                                routing_directive = Some(directive);
                                text = stripped;
                            }
                        }
                        messages.push(CanonicalMessage::text(role, text));
                    }
                    ResponsesItem::FunctionCall { call_id, name, arguments } => {
                        let input: Value = serde_json::from_str(&arguments).unwrap_or(Value::Null);
                        messages.push(CanonicalMessage {
                            role: Role::Assistant,
                            content: MessageContent::Parts(vec![ContentPart::ToolUseRequest {
                                id: call_id,
                                name,
                                input,
                            }]),
                            tool_call_id: None,
                        });
                    }
                    ResponsesItem::FunctionCallOutput { call_id, output } => {
                        messages.push(CanonicalMessage {
                            role: Role::Tool,
                            content: MessageContent::Parts(vec![ContentPart::ToolUseResult {
                                tool_use_id: call_id,
                                content: crate::canonical::ToolResultContent::Text(output),
                                is_error: None,
                            }]),
                            tool_call_id: None,
                        });
                    }
                }
            }
        }
    }

    let tools = wire
        .tools
        .into_iter()
        .map(|t| ToolDef {
            name: t.name,
            description: t.description,
            parameters: t.parameters,
        })
        .collect();

    let routing_directive = crate::directive::resolve_directive(routing_directive, &wire.model, directive_precedence);

    Ok(CanonicalChatRequest {
        model: wire.model,
        messages,
        system: wire.instructions,
        tools,
        tool_choice: None,
        stream: wire.stream,
        sampling: Sampling {
            temperature: wire.temperature,
            top_p: wire.top_p,
            max_tokens: wire.max_output_tokens,
        },
        routing_directive,
    })
}

fn decode_message_content(content: ResponsesMessageContent) -> String {
    match content {
        ResponsesMessageContent::Text(text) => text,
        ResponsesMessageContent::Parts(parts) => parts
            .into_iter()
            .filter_map(|p| match p {
                ResponsesContentPart::InputText { text } | ResponsesContentPart::OutputText { text } => Some(text),
                ResponsesContentPart::InputImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn encode_request(canonical: &CanonicalChatRequest) -> ResponsesRequest {
    let items = canonical
        .messages
        .iter()
        .map(|msg| ResponsesItem::Message {
            role: match msg.role {
                Role::System => "developer".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
                Role::Tool => "user".to_string(),
            },
            content: ResponsesMessageContent::Text(msg.flatten_text()),
        })
        .collect();

    ResponsesRequest {
        model: canonical.model.clone(),
        input: ResponsesInput::Items(items),
        instructions: canonical.system.clone(),
        temperature: canonical.sampling.temperature,
        top_p: canonical.sampling.top_p,
        max_output_tokens: canonical.sampling.max_tokens,
        tools: canonical
            .tools
            .iter()
            .map(|t| ResponsesTool {
                kind: "function".to_string(),
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
        stream: canonical.stream,
    }
}

pub fn decode_response(payload: &[u8]) -> Result<CanonicalChatResponse, DecodeError> {
    let wire: ResponsesResponse = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;

    let incomplete_reason = wire.incomplete_details.as_ref().map(|d| d.reason.as_str());
    let finish_reason = FinishReason::from_responses(&wire.status, incomplete_reason)
        .ok_or_else(|| DecodeError::unsupported(format!("unknown status '{}'", wire.status)))?;

    let mut parts = Vec::new();
    for item in wire.output {
        match item {
            ResponsesItem::Message { content, .. } => {
                parts.push(ContentPart::Text {
                    text: decode_message_content(content),
                });
            }
            ResponsesItem::FunctionCall { call_id, name, arguments } => {
                let input: Value = serde_json::from_str(&arguments).unwrap_or(Value::Null);
                parts.push(ContentPart::ToolUseRequest {
                    id: call_id,
                    name,
                    input,
                });
            }
            ResponsesItem::FunctionCallOutput { .. } => {}
        }
    }

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

pub fn encode_response(canonical: &CanonicalChatResponse) -> ResponsesResponse {
    let (status, incomplete_reason) = canonical.finish_reason.to_responses();

    let mut output = Vec::new();
    match &canonical.message.content {
        MessageContent::Text(text) => output.push(ResponsesItem::Message {
            role: "assistant".to_string(),
            content: ResponsesMessageContent::Text(text.clone()),
        }),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => output.push(ResponsesItem::Message {
                        role: "assistant".to_string(),
                        content: ResponsesMessageContent::Text(text.clone()),
                    }),
                    ContentPart::ToolUseRequest { id, name, input } => output.push(ResponsesItem::FunctionCall {
                        call_id: id.clone(),
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_default(),
                    }),
                    _ => {}
                }
            }
        }
    }

    ResponsesResponse {
        id: canonical.id.clone(),
        model: canonical.model.clone(),
        status: status.to_string(),
        incomplete_details: incomplete_reason.map(|r| ResponsesIncompleteDetails { reason: r.to_string() }),
        output,
        usage: ResponsesUsage {
            input_tokens: canonical.usage.input_tokens,
            output_tokens: canonical.usage.output_tokens,
        },
    }
}
