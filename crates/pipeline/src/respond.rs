//! Bridges a [`DispatchOutcome`] into the axum [`Response`] the inbound
//! protocol expects (spec §4.6): plain JSON, a synthesized SSE sequence,
//! genuinely incremental SSE forwarding, or an aggregated JSON response
//! built by draining a streamed upstream.
//!
//! SSE bodies are built from [`SseFrame::into_wire`] bytes directly rather
//! than through `axum::response::sse::Sse`: Anthropic's named events are
//! already fully framed (`event: ...\ndata: ...`) by the time they reach
//! here, so re-deriving an `axum::response::sse::Event` from that string
//! would just undo work `protocol::sse` already did.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, stream};
use jiff::Timestamp;
use protocol::sse::SseFrame;
use protocol::WireProtocol;

use crate::error::PipelineError;
use crate::orchestrator::DispatchOutcome;
use crate::stream_bridge::{self, StreamDelta, StreamRenderer};

/// Renders one dispatched outcome into a response shaped for `inbound`,
/// honoring `client_wants_stream` (the client's own `stream` field, which
/// is independent of whether the upstream happened to stream).
pub async fn into_response(outcome: DispatchOutcome, inbound: WireProtocol, client_wants_stream: bool) -> Response {
    match outcome {
        DispatchOutcome::Complete(response, _target) => {
            if client_wants_stream {
                let created = Timestamp::now().as_second();
                let id = response.id.clone();
                let frames = stream_bridge::synthesize_from_response(inbound, &id, created, &response);
                sse_response(stream::iter(frames.into_iter().map(|frame| Ok::<_, Infallible>(Bytes::from(frame.into_wire())))))
            } else {
                axum::Json(inbound.encode_response(&response)).into_response()
            }
        }
        DispatchOutcome::Streaming { id, model, deltas, .. } if client_wants_stream => {
            let created = Timestamp::now().as_second();
            let renderer = StreamRenderer::new(inbound, id, model, created);
            sse_response(render_incrementally(deltas, renderer, inbound))
        }
        DispatchOutcome::Streaming { id, model, deltas, .. } => {
            let deltas: Vec<StreamDelta> = match collect_or_bail(deltas, inbound).await {
                Ok(deltas) => deltas,
                Err(response) => return response,
            };
            let response = stream_bridge::aggregate(&id, &model, &deltas);
            axum::Json(inbound.encode_response(&response)).into_response()
        }
    }
}

async fn collect_or_bail(
    mut deltas: impl futures::Stream<Item = Result<StreamDelta, PipelineError>> + Unpin,
    inbound: WireProtocol,
) -> Result<Vec<StreamDelta>, Response> {
    let mut out = Vec::new();
    while let Some(item) = deltas.next().await {
        match item {
            Ok(delta) => out.push(delta),
            Err(err) => return Err(crate::error::PipelineErrorResponse::new(inbound, err).into_response()),
        }
    }
    Ok(out)
}

struct RenderState<S> {
    upstream: S,
    renderer: Option<StreamRenderer>,
    done: bool,
    inbound: WireProtocol,
}

/// Drives the upstream delta stream through a [`StreamRenderer`],
/// appending the terminal event sequence exactly once when the upstream
/// stream ends, and substituting a single `event: error` frame (then
/// stopping) if a delta comes back as an error — the 200 response and its
/// headers are already committed by the time a mid-stream error can
/// surface, so it has to be reported inside the body rather than as an
/// HTTP status.
fn render_incrementally(
    deltas: impl futures::Stream<Item = Result<StreamDelta, PipelineError>> + Unpin + Send + 'static,
    renderer: StreamRenderer,
    inbound: WireProtocol,
) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let initial = RenderState { upstream: deltas, renderer: Some(renderer), done: false, inbound };

    let frame_batches = stream::unfold(initial, |mut state| async move {
        if state.done {
            return None;
        }
        match state.upstream.next().await {
            Some(Ok(delta)) => {
                let frames = state.renderer.as_mut().expect("renderer present while streaming").render(&delta);
                Some((frames, state))
            }
            Some(Err(err)) => {
                state.done = true;
                Some((vec![error_frame(state.inbound, &err)], state))
            }
            None => {
                state.done = true;
                let renderer = state.renderer.take().expect("renderer present at stream end");
                Some((renderer.terminal(), state))
            }
        }
    });

    frame_batches.flat_map(|frames| stream::iter(frames.into_iter().map(|frame| Ok::<_, Infallible>(Bytes::from(frame.into_wire())))))
}

fn error_frame(inbound: WireProtocol, err: &PipelineError) -> SseFrame {
    let payload = match inbound {
        WireProtocol::AnthropicMessages => serde_json::json!({
            "type": "error",
            "error": {"type": err.code(), "message": err.to_string()},
        }),
        WireProtocol::OpenAiChat | WireProtocol::OpenAiResponses => serde_json::json!({
            "error": {"message": err.to_string(), "type": err.code()},
        }),
    };
    SseFrame::Raw(format!("event: error\ndata: {}", serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())))
}

fn sse_response(body: impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static) -> Response {
    let mut response = Response::new(Body::from_stream(body));
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
