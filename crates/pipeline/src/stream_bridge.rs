//! Streaming bridge (spec §4.6): forwards a provider's native stream
//! incrementally when the client also asked to stream, synthesizes a full
//! SSE sequence when a non-streaming provider must appear to stream, and
//! aggregates a streamed provider's events into one response when the
//! client asked for `stream:false`.

use std::collections::HashSet;

use eventsource_stream::Event;
use protocol::canonical::{CanonicalMessage, ContentPart, FinishReason, MessageContent, Role, Usage};
use protocol::sse::{self, AnthropicEvent, SseFrame};
use protocol::{CanonicalChatResponse, WireProtocol};
use serde_json::Value;

/// Upper bound on how many bytes of a tool call's JSON-encoded input are
/// carried in a single synthesized delta (spec §4.6 "bounded size").
const SYNTHETIC_ARG_CHUNK_BYTES: usize = 64;

/// One incremental unit parsed out of a provider's native stream,
/// independent of which protocol it was transported in.
#[derive(Debug, Clone, Default)]
pub struct StreamDelta {
    pub text: Option<String>,
    pub reasoning: Option<String>,
    pub tool_call: Option<ToolCallDelta>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_delta: String,
}

/// Parses one raw upstream SSE event into a [`StreamDelta`], interpreted
/// per the wire protocol the target itself speaks. Returns `None` for
/// events carrying nothing the bridge needs to relay (pings, the literal
/// `[DONE]` marker, a bare `content_block_stop`, ...).
pub fn parse_upstream_event(target_wire: WireProtocol, event: &Event) -> Option<StreamDelta> {
    match target_wire {
        WireProtocol::OpenAiChat | WireProtocol::OpenAiResponses => parse_openai_chunk(&event.data),
        WireProtocol::AnthropicMessages => parse_anthropic_event(&event.event, &event.data),
    }
}

fn parse_openai_chunk(data: &str) -> Option<StreamDelta> {
    if data.trim() == "[DONE]" {
        return None;
    }
    let chunk: Value = serde_json::from_str(data).ok()?;
    let choice = chunk.get("choices")?.as_array()?.first()?;
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    let mut out = StreamDelta { text: delta.get("content").and_then(Value::as_str).map(str::to_string), ..Default::default() };

    if let Some(first) = delta.get("tool_calls").and_then(Value::as_array).and_then(|calls| calls.first()) {
        let index = first.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
        let function = first.get("function");
        out.tool_call = Some(ToolCallDelta {
            index,
            id: first.get("id").and_then(Value::as_str).map(str::to_string),
            name: function.and_then(|f| f.get("name")).and_then(Value::as_str).map(str::to_string),
            arguments_delta: function.and_then(|f| f.get("arguments")).and_then(Value::as_str).unwrap_or("").to_string(),
        });
    }

    out.finish_reason = choice.get("finish_reason").and_then(Value::as_str).and_then(FinishReason::from_openai);
    out.usage = chunk.get("usage").map(|usage| Usage {
        input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        output_tokens: usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    });

    Some(out)
}

fn parse_anthropic_event(event_name: &str, data: &str) -> Option<StreamDelta> {
    let payload: Value = serde_json::from_str(data).ok()?;

    match event_name {
        "content_block_delta" => {
            let delta = payload.get("delta")?;
            match delta.get("type").and_then(Value::as_str)? {
                "text_delta" => Some(StreamDelta {
                    text: delta.get("text").and_then(Value::as_str).map(str::to_string),
                    ..Default::default()
                }),
                "input_json_delta" => Some(StreamDelta {
                    tool_call: Some(ToolCallDelta {
                        index: payload.get("index").and_then(Value::as_u64).unwrap_or(0) as u32,
                        id: None,
                        name: None,
                        arguments_delta: delta.get("partial_json").and_then(Value::as_str).unwrap_or("").to_string(),
                    }),
                    ..Default::default()
                }),
                _ => None,
            }
        }
        "content_block_start" => {
            let block = payload.get("content_block")?;
            if block.get("type").and_then(Value::as_str) != Some("tool_use") {
                return None;
            }
            Some(StreamDelta {
                tool_call: Some(ToolCallDelta {
                    index: payload.get("index").and_then(Value::as_u64).unwrap_or(0) as u32,
                    id: block.get("id").and_then(Value::as_str).map(str::to_string),
                    name: block.get("name").and_then(Value::as_str).map(str::to_string),
                    arguments_delta: String::new(),
                }),
                ..Default::default()
            })
        }
        "message_delta" => {
            let finish_reason =
                payload.get("delta").and_then(|d| d.get("stop_reason")).and_then(Value::as_str).and_then(FinishReason::from_anthropic);
            let usage = payload.get("usage").map(|u| Usage {
                input_tokens: 0,
                output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            });
            Some(StreamDelta { finish_reason, usage, ..Default::default() })
        }
        _ => None,
    }
}

/// Accumulates a provider's native stream into one aggregated response
/// (spec §4.6: `stream:false` client against a streamed provider).
pub fn aggregate(id: &str, model: &str, deltas: &[StreamDelta]) -> CanonicalChatResponse {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<(u32, Option<String>, Option<String>, String)> = Vec::new();
    let mut finish_reason = FinishReason::Stop;
    let mut usage = Usage::default();

    for delta in deltas {
        if let Some(chunk) = &delta.text {
            text.push_str(chunk);
        }
        if let Some(chunk) = &delta.reasoning {
            reasoning.push_str(chunk);
        }
        if let Some(tool_call) = &delta.tool_call {
            match tool_calls.iter_mut().find(|(index, ..)| *index == tool_call.index) {
                Some((_, id_slot, name_slot, args)) => {
                    if tool_call.id.is_some() {
                        *id_slot = tool_call.id.clone();
                    }
                    if tool_call.name.is_some() {
                        *name_slot = tool_call.name.clone();
                    }
                    args.push_str(&tool_call.arguments_delta);
                }
                None => tool_calls.push((tool_call.index, tool_call.id.clone(), tool_call.name.clone(), tool_call.arguments_delta.clone())),
            }
        }
        if let Some(reason) = delta.finish_reason {
            finish_reason = reason;
        }
        if let Some(delta_usage) = delta.usage {
            usage = delta_usage;
        }
    }

    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::Text { text });
    }
    if !reasoning.is_empty() {
        parts.push(ContentPart::Reasoning { text: reasoning });
    }
    for (_, tool_id, name, args) in tool_calls {
        let input = serde_json::from_str(&args).unwrap_or(Value::Object(Default::default()));
        parts.push(ContentPart::ToolUseRequest {
            id: tool_id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            input,
        });
    }

    let content = if parts.len() == 1 {
        match parts.into_iter().next().expect("len checked above") {
            ContentPart::Text { text } => MessageContent::Text(text),
            other => MessageContent::Parts(vec![other]),
        }
    } else {
        MessageContent::Parts(parts)
    };

    CanonicalChatResponse {
        id: id.to_string(),
        model: model.to_string(),
        message: CanonicalMessage { role: Role::Assistant, content, tool_call_id: None },
        finish_reason,
        usage,
    }
}

/// Incrementally renders upstream [`StreamDelta`]s into outbound SSE
/// frames in `inbound`'s shape, tracking just enough per-protocol framing
/// state (Anthropic's block-open bookkeeping; nothing for OpenAI, whose
/// chunks are self-contained).
pub struct StreamRenderer {
    inbound: WireProtocol,
    id: String,
    model: String,
    created: i64,
    message_started: bool,
    text_block_started: bool,
    tool_blocks_started: HashSet<u32>,
    last_finish_reason: Option<FinishReason>,
    last_usage: Usage,
}

impl StreamRenderer {
    pub fn new(inbound: WireProtocol, id: impl Into<String>, model: impl Into<String>, created: i64) -> Self {
        Self {
            inbound,
            id: id.into(),
            model: model.into(),
            created,
            message_started: false,
            text_block_started: false,
            tool_blocks_started: HashSet::new(),
            last_finish_reason: None,
            last_usage: Usage::default(),
        }
    }

    pub fn render(&mut self, delta: &StreamDelta) -> Vec<SseFrame> {
        if let Some(reason) = delta.finish_reason {
            self.last_finish_reason = Some(reason);
        }
        if let Some(usage) = delta.usage {
            self.last_usage = usage;
        }

        match self.inbound {
            WireProtocol::OpenAiChat | WireProtocol::OpenAiResponses => self.render_openai(delta),
            WireProtocol::AnthropicMessages => self.render_anthropic(delta),
        }
    }

    fn render_openai(&mut self, delta: &StreamDelta) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if let Some(text) = &delta.text {
            frames.push(sse::openai_chunk_frame(&sse::openai_text_delta_chunk(&self.id, &self.model, self.created, text)));
        }
        if let Some(tool_call) = &delta.tool_call {
            frames.push(sse::openai_chunk_frame(&sse::openai_tool_call_delta_chunk(
                &self.id,
                &self.model,
                self.created,
                tool_call.index,
                tool_call.id.as_deref(),
                tool_call.name.as_deref(),
                &tool_call.arguments_delta,
            )));
        }
        frames
    }

    fn render_anthropic(&mut self, delta: &StreamDelta) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if !self.message_started {
            frames.push(AnthropicEvent::message_start(&self.id, &self.model).into_frame());
            self.message_started = true;
        }

        if let Some(text) = &delta.text {
            if !self.text_block_started {
                frames.push(AnthropicEvent::content_block_start(0).into_frame());
                self.text_block_started = true;
            }
            frames.push(AnthropicEvent::content_block_delta(0, text).into_frame());
        }

        if let Some(tool_call) = &delta.tool_call {
            if self.tool_blocks_started.insert(tool_call.index) {
                frames.push(
                    AnthropicEvent::content_block_start_tool_use(
                        tool_call.index,
                        tool_call.id.as_deref().unwrap_or_default(),
                        tool_call.name.as_deref().unwrap_or_default(),
                    )
                    .into_frame(),
                );
            }
            if !tool_call.arguments_delta.is_empty() {
                frames.push(AnthropicEvent::content_block_delta_input_json(tool_call.index, &tool_call.arguments_delta).into_frame());
            }
        }

        frames
    }

    /// The terminal event sequence, emitted exactly once regardless of
    /// whether any content was ever observed (spec §4.6 "terminal event
    /// always emitted once, including empty content").
    pub fn terminal(mut self) -> Vec<SseFrame> {
        match self.inbound {
            WireProtocol::OpenAiChat | WireProtocol::OpenAiResponses => {
                let finish_reason = self.last_finish_reason.unwrap_or(FinishReason::Stop).to_openai();
                vec![
                    sse::openai_chunk_frame(&sse::openai_finish_chunk(&self.id, &self.model, self.created, finish_reason)),
                    SseFrame::Done,
                ]
            }
            WireProtocol::AnthropicMessages => {
                let mut frames = Vec::new();
                if !self.message_started {
                    frames.push(AnthropicEvent::message_start(&self.id, &self.model).into_frame());
                }

                if self.text_block_started {
                    frames.push(AnthropicEvent::content_block_stop(0).into_frame());
                }
                for index in &self.tool_blocks_started {
                    frames.push(AnthropicEvent::content_block_stop(*index).into_frame());
                }

                let finish_reason = self.last_finish_reason.unwrap_or(FinishReason::Stop).to_anthropic();
                frames.push(AnthropicEvent::message_delta(finish_reason, self.last_usage.output_tokens).into_frame());
                frames.push(AnthropicEvent::message_stop().into_frame());
                frames
            }
        }
    }
}

/// Synthesizes a full SSE sequence from an already-complete response,
/// for a non-streaming provider serving a client that asked to stream
/// (spec §4.6). Tool-call input is split into multiple bounded-size
/// deltas.
pub fn synthesize_from_response(inbound: WireProtocol, id: &str, created: i64, response: &CanonicalChatResponse) -> Vec<SseFrame> {
    let mut renderer = StreamRenderer::new(inbound, id, &response.model, created);
    let mut frames = Vec::new();
    let mut next_tool_index: u32 = 0;

    match &response.message.content {
        MessageContent::Text(text) => {
            if !text.is_empty() {
                frames.extend(renderer.render(&StreamDelta { text: Some(text.clone()), ..Default::default() }));
            }
        }
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => {
                        frames.extend(renderer.render(&StreamDelta { text: Some(text.clone()), ..Default::default() }));
                    }
                    ContentPart::Reasoning { text } => {
                        frames.extend(renderer.render(&StreamDelta { reasoning: Some(text.clone()), ..Default::default() }));
                    }
                    ContentPart::ToolUseRequest { id: tool_id, name, input } => {
                        let args = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string());
                        let index = next_tool_index;
                        next_tool_index += 1;
                        let mut first = true;
                        let chunks: Vec<&str> = if args.is_empty() {
                            vec![""]
                        } else {
                            args.as_bytes().chunks(SYNTHETIC_ARG_CHUNK_BYTES).map(|c| std::str::from_utf8(c).unwrap_or("")).collect()
                        };
                        for chunk in chunks {
                            let delta = ToolCallDelta {
                                index,
                                id: first.then(|| tool_id.clone()),
                                name: first.then(|| name.clone()),
                                arguments_delta: chunk.to_string(),
                            };
                            frames.extend(renderer.render(&StreamDelta { tool_call: Some(delta), ..Default::default() }));
                            first = false;
                        }
                    }
                    ContentPart::ImageReference { .. } | ContentPart::ToolUseResult { .. } => {}
                }
            }
        }
    }

    renderer.last_finish_reason = Some(response.finish_reason);
    renderer.last_usage = response.usage;
    frames.extend(renderer.terminal());
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, data: &str) -> Event {
        Event { event: name.to_string(), data: data.to_string(), id: String::new(), retry: None }
    }

    #[test]
    fn parses_openai_text_delta() {
        let raw = serde_json::json!({"choices": [{"delta": {"content": "hi"}}]}).to_string();
        let delta = parse_upstream_event(WireProtocol::OpenAiChat, &event("message", &raw)).unwrap();
        assert_eq!(delta.text.as_deref(), Some("hi"));
    }

    #[test]
    fn openai_done_marker_parses_to_none() {
        assert!(parse_upstream_event(WireProtocol::OpenAiChat, &event("message", "[DONE]")).is_none());
    }

    #[test]
    fn parses_anthropic_text_delta() {
        let raw = serde_json::json!({"index": 0, "delta": {"type": "text_delta", "text": "hi"}}).to_string();
        let delta = parse_upstream_event(WireProtocol::AnthropicMessages, &event("content_block_delta", &raw)).unwrap();
        assert_eq!(delta.text.as_deref(), Some("hi"));
    }

    #[test]
    fn aggregate_concatenates_text_deltas_across_events() {
        let deltas = vec![
            StreamDelta { text: Some("hel".to_string()), ..Default::default() },
            StreamDelta { text: Some("lo".to_string()), finish_reason: Some(FinishReason::Stop), ..Default::default() },
        ];
        let response = aggregate("id-1", "gpt-4", &deltas);
        assert_eq!(response.message.flatten_text(), "hello");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn terminal_is_emitted_even_with_no_content_observed() {
        let renderer = StreamRenderer::new(WireProtocol::OpenAiChat, "id-1", "gpt-4", 0);
        let frames = renderer.terminal();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn synthesized_sequence_from_a_full_response_ends_with_done() {
        let response = CanonicalChatResponse {
            id: "id-1".to_string(),
            model: "gpt-4".to_string(),
            message: CanonicalMessage::text(Role::Assistant, "hello"),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        };
        let frames = synthesize_from_response(WireProtocol::OpenAiChat, "id-1", 0, &response);
        assert!(matches!(frames.last(), Some(SseFrame::Done)));
    }

    /// A tool call's JSON-encoded input longer than the bounded chunk size
    /// is split across several deltas; concatenating `function.arguments`
    /// back together must reproduce the original input, and the sequence
    /// must still end in a `tool_calls` finish chunk followed by `[DONE]`.
    #[test]
    fn synthesized_tool_call_arguments_reassemble_across_bounded_deltas() {
        let input = serde_json::json!({"path": "a".repeat(100)});
        let response = CanonicalChatResponse {
            id: "id-1".to_string(),
            model: "gpt-4".to_string(),
            message: CanonicalMessage {
                role: Role::Assistant,
                content: MessageContent::Parts(vec![ContentPart::ToolUseRequest {
                    id: "call-1".to_string(),
                    name: "read_file".to_string(),
                    input: input.clone(),
                }]),
                tool_call_id: None,
            },
            finish_reason: FinishReason::ToolCall,
            usage: Usage::default(),
        };

        let frames = synthesize_from_response(WireProtocol::OpenAiChat, "id-1", 0, &response);

        let mut arg_deltas = 0;
        let mut reassembled = String::new();
        let mut saw_tool_calls_finish = false;
        for frame in &frames {
            let SseFrame::Data(payload) = frame else { continue };
            let value: Value = serde_json::from_str(payload).unwrap();
            let choice = &value["choices"][0];
            if let Some(args) = choice["delta"]["tool_calls"][0]["function"]["arguments"].as_str() {
                reassembled.push_str(args);
                arg_deltas += 1;
            }
            if choice["finish_reason"].as_str() == Some("tool_calls") {
                saw_tool_calls_finish = true;
            }
        }

        assert!(arg_deltas > 1, "expected the argument string to be split across more than one delta");
        let parsed: Value = serde_json::from_str(&reassembled).unwrap();
        assert_eq!(parsed, input);
        assert!(saw_tool_calls_finish);
        assert!(matches!(frames.last(), Some(SseFrame::Done)));
    }
}
