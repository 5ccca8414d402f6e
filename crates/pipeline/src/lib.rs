//! Pipeline orchestrator (spec §4.6): wires routing (C5), credential
//! resolution and the OAuth refresh hook (C4), the compatibility layer
//! (C3) and provider transport (C2) together behind one per-request
//! `dispatch`/`respond` pair, and bridges the result back into whichever
//! wire protocol the client connected with, streaming or not.

mod credentials;
mod error;
mod orchestrator;
mod respond;
mod stream_bridge;
mod transport_cache;
mod wire;

pub use error::{PipelineError, PipelineErrorResponse};
pub use orchestrator::{DispatchOutcome, Orchestrator};
pub use respond::into_response;
pub use stream_bridge::{StreamDelta, ToolCallDelta};
