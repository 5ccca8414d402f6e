//! Shared state handed to every axum handler.

use std::sync::Arc;

use jiff::Timestamp;
use pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Timestamp,
}
