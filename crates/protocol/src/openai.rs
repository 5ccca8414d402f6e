//! OpenAI Chat Completions wire protocol (spec §4.1, §6 `POST
//! /v1/chat/completions`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{
    CanonicalChatRequest, CanonicalChatResponse, CanonicalMessage, ContentPart, FinishReason, MessageContent, Role,
    Sampling, ToolChoice, ToolChoiceMode, ToolDef, ToolResultContent, Usage,
};
use crate::directive::extract_directive;
use crate::error::DecodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<OpenAiContent>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,
    /// Always a JSON string on the wire (spec §4.1 tool-argument
    /// normalization); parsed to `Value` only when building canonical form.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OpenAiFunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAiChoice>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChoice {
    pub index: u32,
    pub message: OpenAiMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One SSE `data:` chunk of a streamed chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAiChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChunkChoice {
    pub index: u32,
    pub delta: OpenAiDelta,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiDelta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCallDelta {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiFunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arguments: Option<String>,
}

/// Decodes an OpenAI Chat Completions request body, resolving the
/// routing directive from the inline `<**...**>` marker in user text
/// and/or the `model` field's `provider.model` prefix.
pub fn decode_request(payload: &[u8], directive_precedence: config::DirectivePrecedence) -> Result<CanonicalChatRequest, DecodeError> {
    let wire: OpenAiChatRequest = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;

    let mut messages = Vec::with_capacity(wire.messages.len());
    let mut routing_directive = None;

    for msg in wire.messages {
        let role = match msg.role.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => return Err(DecodeError::unsupported(format!("unknown role '{other}'"))),
        };

        let mut content = match msg.content {
            Some(OpenAiContent::Text(text)) => MessageContent::Text(text),
            Some(OpenAiContent::Parts(parts)) => MessageContent::Parts(
                parts
                    .into_iter()
                    .map(|p| match p {
                        OpenAiContentPart::Text { text } => ContentPart::Text { text },
                        OpenAiContentPart::ImageUrl { image_url } => ContentPart::ImageReference {
                            source: crate::canonical::ImageSource::Url { url: image_url.url },
                        },
                    })
                    .collect(),
            ),
            None => MessageContent::Text(String::new()),
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

        let tool_call_id = msg.tool_call_id.clone();

        if role == Role::Tool {
            let text = match &content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::Parts(_) => String::new(),
            };
            messages.push(CanonicalMessage {
                role,
                content: MessageContent::Parts(vec![ContentPart::ToolUseResult {
                    tool_use_id: tool_call_id.clone().unwrap_or_default(),
                    content: ToolResultContent::Text(text),
                    is_error: None,
                }]),
                tool_call_id,
            });
            continue;
        }

        if let Some(tool_calls) = msg.tool_calls {
            let mut parts = match content {
                MessageContent::Text(text) if !text.is_empty() => vec![ContentPart::Text { text }],
                _ => Vec::new(),
            };

            for call in tool_calls {
                let input: Value = serde_json::from_str(&call.function.arguments)
                    .map_err(|e| DecodeError::malformed("tool_calls[].function.arguments", e.to_string()))?;
                parts.push(ContentPart::ToolUseRequest {
                    id: call.id,
                    name: call.function.name,
                    input,
                });
            }

            content = MessageContent::Parts(parts);
        }

        messages.push(CanonicalMessage {
            role,
            content,
            tool_call_id,
        });
    }

    let tools = wire
        .tools
        .unwrap_or_default()
        .into_iter()
        .map(|t| ToolDef {
            name: t.function.name,
            description: t.function.description,
            parameters: t.function.parameters,
        })
        .collect();

    let tool_choice = wire.tool_choice.map(decode_tool_choice).transpose()?;
    let routing_directive = crate::directive::resolve_directive(routing_directive, &wire.model, directive_precedence);

    Ok(CanonicalChatRequest {
        model: wire.model,
        messages,
        system: None,
        tools,
        tool_choice,
        stream: wire.stream,
        sampling: Sampling {
            temperature: wire.temperature,
            top_p: wire.top_p,
            max_tokens: wire.max_tokens,
        },
        routing_directive,
    })
}

fn decode_tool_choice(value: Value) -> Result<ToolChoice, DecodeError> {
    match value {
        Value::String(s) => match s.as_str() {
            "none" => Ok(ToolChoice::Mode(ToolChoiceMode::None)),
            "auto" => Ok(ToolChoice::Mode(ToolChoiceMode::Auto)),
            "required" => Ok(ToolChoice::Mode(ToolChoiceMode::Required)),
            other => Err(DecodeError::unsupported(format!("unknown tool_choice '{other}'"))),
        },
        Value::Object(_) => {
            #[derive(Deserialize)]
            struct Wrapper {
                function: NamedFunction,
            }
            #[derive(Deserialize)]
            struct NamedFunction {
                name: String,
            }

            let wrapper: Wrapper = serde_json::from_value(value).map_err(DecodeError::from_serde_json)?;
            Ok(ToolChoice::Named { name: wrapper.function.name })
        }
        other => Err(DecodeError::malformed("tool_choice", format!("unexpected shape: {other}"))),
    }
}

/// Encodes a canonical request to an OpenAI Chat Completions wire body.
pub fn encode_request(canonical: &CanonicalChatRequest) -> OpenAiChatRequest {
    let mut messages = Vec::with_capacity(canonical.messages.len() + 1);

    if let Some(system) = &canonical.system {
        messages.push(OpenAiMessage {
            role: "system".to_string(),
            content: Some(OpenAiContent::Text(system.clone())),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for msg in &canonical.messages {
        messages.push(encode_message(msg));
    }

    OpenAiChatRequest {
        model: canonical.model.clone(),
        messages,
        tools: (!canonical.tools.is_empty()).then(|| canonical.tools.iter().map(encode_tool).collect()),
        tool_choice: canonical.tool_choice.as_ref().map(encode_tool_choice),
        temperature: canonical.sampling.temperature,
        top_p: canonical.sampling.top_p,
        max_tokens: canonical.sampling.max_tokens,
        stop: None,
        stream: canonical.stream,
    }
}

fn encode_message(msg: &CanonicalMessage) -> OpenAiMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
    .to_string();

    match &msg.content {
        MessageContent::Text(text) => OpenAiMessage {
            role,
            content: Some(OpenAiContent::Text(text.clone())),
            tool_calls: None,
            tool_call_id: msg.tool_call_id.clone(),
        },
        MessageContent::Parts(parts) => {
            let mut text_parts = Vec::new();
            let mut tool_calls = Vec::new();
            let mut tool_result_text = None;

            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(OpenAiContentPart::Text { text: text.clone() }),
                    ContentPart::ImageReference { source } => {
                        if let crate::canonical::ImageSource::Url { url } = source {
                            text_parts.push(OpenAiContentPart::ImageUrl {
                                image_url: OpenAiImageUrl { url: url.clone() },
                            });
                        }
                    }
                    ContentPart::ToolUseRequest { id, name, input } => tool_calls.push(OpenAiToolCall {
                        id: id.clone(),
                        kind: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                        },
                    }),
                    ContentPart::ToolUseResult { content, .. } => {
                        tool_result_text = Some(content.as_text());
                    }
                    ContentPart::Reasoning { .. } => {}
                }
            }

            if let Some(text) = tool_result_text {
                return OpenAiMessage {
                    role,
                    content: Some(OpenAiContent::Text(text)),
                    tool_calls: None,
                    tool_call_id: msg.tool_call_id.clone(),
                };
            }

            OpenAiMessage {
                role,
                content: (!text_parts.is_empty()).then_some(OpenAiContent::Parts(text_parts)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: msg.tool_call_id.clone(),
            }
        }
    }
}

fn encode_tool(tool: &ToolDef) -> OpenAiTool {
    OpenAiTool {
        kind: "function".to_string(),
        function: OpenAiFunctionDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
            strict: None,
        },
    }
}

fn encode_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => Value::String("none".to_string()),
        ToolChoice::Mode(ToolChoiceMode::Auto) => Value::String("auto".to_string()),
        ToolChoice::Mode(ToolChoiceMode::Required) => Value::String("required".to_string()),
        ToolChoice::Named { name } => serde_json::json!({"type": "function", "function": {"name": name}}),
    }
}

/// Decodes an upstream OpenAI chat completion body into canonical form.
pub fn decode_response(payload: &[u8]) -> Result<CanonicalChatResponse, DecodeError> {
    let wire: OpenAiChatResponse = serde_json::from_slice(payload).map_err(DecodeError::from_serde_json)?;
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::malformed("choices", "empty choices array"))?;

    let finish_reason = choice
        .finish_reason
        .as_deref()
        .and_then(FinishReason::from_openai)
        .ok_or_else(|| {
            DecodeError::unsupported(format!("unknown finish_reason '{:?}'", choice.finish_reason))
        })?;

    let msg = choice.message;
    let mut parts = Vec::new();
    if let Some(OpenAiContent::Text(text)) = &msg.content
        && !text.is_empty()
    {
        parts.push(ContentPart::Text { text: text.clone() });
    }
    for call in msg.tool_calls.unwrap_or_default() {
        let input: Value = serde_json::from_str(&call.function.arguments)
            .map_err(|e| DecodeError::malformed("choices[0].message.tool_calls[].function.arguments", e.to_string()))?;
        parts.push(ContentPart::ToolUseRequest {
            id: call.id,
            name: call.function.name,
            input,
        });
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
        usage: wire
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
    })
}

/// Encodes a canonical response to an OpenAI chat completion body.
pub fn encode_response(canonical: &CanonicalChatResponse) -> OpenAiChatResponse {
    OpenAiChatResponse {
        id: canonical.id.clone(),
        object: "chat.completion".to_string(),
        created: 0,
        model: canonical.model.clone(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: encode_message(&canonical.message),
            finish_reason: Some(canonical.finish_reason.to_openai().to_string()),
        }],
        usage: Some(OpenAiUsage {
            prompt_tokens: canonical.usage.input_tokens,
            completion_tokens: canonical.usage.output_tokens,
            total_tokens: canonical.usage.input_tokens + canonical.usage.output_tokens,
        }),
    }
}
