//! SSE event framing for both protocols' streaming responses (spec §4.6
//! streaming bridge).
//!
//! OpenAI streams a flat sequence of `chat.completion.chunk` frames
//! terminated by a literal `[DONE]` frame; Anthropic streams a named
//! event sequence (`message_start` ... `message_stop`). The pipeline's
//! streaming bridge builds these directly rather than going through
//! `serde_json::to_string` + manual `data: ` framing at every call site.

use serde::Serialize;
use serde_json::Value;

use crate::openai::{OpenAiChatChunk, OpenAiChunkChoice, OpenAiDelta, OpenAiFunctionDelta, OpenAiToolCallDelta};

/// One `data: ...\n\n` frame, or the literal `[DONE]` terminator.
#[derive(Debug, Clone)]
pub enum SseFrame {
    Data(String),
    /// A fully pre-formatted frame body (e.g. Anthropic's `event: <name>`
    /// line followed by `data: <json>`), written as-is plus the trailing
    /// blank line.
    Raw(String),
    Done,
}

impl SseFrame {
    pub fn into_wire(self) -> String {
        match self {
            SseFrame::Data(payload) => format!("data: {payload}\n\n"),
            SseFrame::Raw(body) => format!("{body}\n\n"),
            SseFrame::Done => "data: [DONE]\n\n".to_string(),
        }
    }

    pub fn json(value: &impl Serialize) -> Self {
        SseFrame::Data(serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()))
    }
}

pub fn openai_chunk_frame(chunk: &OpenAiChatChunk) -> SseFrame {
    SseFrame::json(chunk)
}

pub fn openai_text_delta_chunk(id: &str, model: &str, created: i64, text: &str) -> OpenAiChatChunk {
    OpenAiChatChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![OpenAiChunkChoice {
            index: 0,
            delta: OpenAiDelta {
                role: None,
                content: Some(text.to_string()),
                tool_calls: None,
            },
            finish_reason: None,
        }],
    }
}

/// A tool-call argument delta chunk (spec §4.6 "tool-call arguments are
/// emitted as append-only JSON deltas"). `tool_id`/`name` are set on the
/// first delta for a given tool call index and omitted afterwards;
/// `arguments_delta` carries the next slice of the JSON-encoded argument
/// string.
pub fn openai_tool_call_delta_chunk(
    id: &str,
    model: &str,
    created: i64,
    tool_index: u32,
    tool_id: Option<&str>,
    name: Option<&str>,
    arguments_delta: &str,
) -> OpenAiChatChunk {
    OpenAiChatChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![OpenAiChunkChoice {
            index: 0,
            delta: OpenAiDelta {
                role: None,
                content: None,
                tool_calls: Some(vec![OpenAiToolCallDelta {
                    index: tool_index,
                    id: tool_id.map(str::to_string),
                    function: Some(OpenAiFunctionDelta {
                        name: name.map(str::to_string),
                        arguments: Some(arguments_delta.to_string()),
                    }),
                }]),
            },
            finish_reason: None,
        }],
    }
}

pub fn openai_finish_chunk(id: &str, model: &str, created: i64, finish_reason: &str) -> OpenAiChatChunk {
    OpenAiChatChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![OpenAiChunkChoice {
            index: 0,
            delta: OpenAiDelta::default(),
            finish_reason: Some(finish_reason.to_string()),
        }],
    }
}

/// A named Anthropic SSE event: `event: <name>\ndata: <json>\n\n`.
#[derive(Debug, Clone)]
pub struct AnthropicEvent {
    pub name: &'static str,
    pub data: Value,
}

impl AnthropicEvent {
    pub fn into_frame(self) -> SseFrame {
        let payload = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());
        SseFrame::Raw(format!("event: {}\ndata: {payload}", self.name))
    }

    pub fn message_start(id: &str, model: &str) -> Self {
        Self {
            name: "message_start",
            data: serde_json::json!({
                "type": "message_start",
                "message": {
                    "id": id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": model,
                    "usage": {"input_tokens": 0, "output_tokens": 0},
                },
            }),
        }
    }

    pub fn content_block_start(index: u32) -> Self {
        Self {
            name: "content_block_start",
            data: serde_json::json!({
                "type": "content_block_start",
                "index": index,
                "content_block": {"type": "text", "text": ""},
            }),
        }
    }

    pub fn content_block_delta(index: u32, text: &str) -> Self {
        Self {
            name: "content_block_delta",
            data: serde_json::json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "text_delta", "text": text},
            }),
        }
    }

    /// Opens a `tool_use` content block (spec §4.6 synthesized sequence:
    /// `content_block_start(tool_use, input:{})`).
    pub fn content_block_start_tool_use(index: u32, id: &str, name: &str) -> Self {
        Self {
            name: "content_block_start",
            data: serde_json::json!({
                "type": "content_block_start",
                "index": index,
                "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}},
            }),
        }
    }

    /// One bounded-size slice of a tool call's JSON-encoded input (spec
    /// §4.6: "Tool-call input is split into multiple deltas of bounded
    /// size").
    pub fn content_block_delta_input_json(index: u32, partial_json: &str) -> Self {
        Self {
            name: "content_block_delta",
            data: serde_json::json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "input_json_delta", "partial_json": partial_json},
            }),
        }
    }

    pub fn content_block_stop(index: u32) -> Self {
        Self {
            name: "content_block_stop",
            data: serde_json::json!({"type": "content_block_stop", "index": index}),
        }
    }

    pub fn message_delta(stop_reason: &str, output_tokens: u32) -> Self {
        Self {
            name: "message_delta",
            data: serde_json::json!({
                "type": "message_delta",
                "delta": {"stop_reason": stop_reason, "stop_sequence": Value::Null},
                "usage": {"output_tokens": output_tokens},
            }),
        }
    }

    pub fn message_stop() -> Self {
        Self {
            name: "message_stop",
            data: serde_json::json!({"type": "message_stop"}),
        }
    }
}
