//! Assembles the axum router and runs it to completion (grounded on the
//! teacher's `server::serve`/`ServeConfig` pattern, narrowed to the one
//! router RouteCodex exposes — no MCP surface, no CORS/CSRF/rate-limit
//! middleware stack, since nothing in the spec calls for them).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::routing::{get, post};
use axum::Router;
use config::Config;
use jiff::Timestamp;
use pipeline::Orchestrator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Everything [`serve`] needs to bring the gateway up.
pub struct ServeConfig {
    pub listen_address: SocketAddr,
    pub config: Config,
    pub shutdown_signal: CancellationToken,
    pub version: String,
}

/// Builds the router and runs it until `shutdown_signal` fires or the
/// listener errors.
pub async fn serve(
    ServeConfig { listen_address, config, shutdown_signal, version }: ServeConfig,
) -> anyhow::Result<()> {
    log::info!("RouteCodex {version}");

    let health_path = config.server.health_path.clone();
    let status_path = config.server.status_path.clone();
    let callback_path = config.oauth.callback_path.clone();

    let orchestrator = Arc::new(Orchestrator::new(config));
    let state = AppState { orchestrator: orchestrator.clone(), started_at: Timestamp::now() };

    let app = Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/responses", post(handlers::responses))
        .route("/v1/messages", post(handlers::messages))
        .route("/v1/embeddings", post(handlers::embeddings))
        .route("/v1/models", get(handlers::list_models))
        .route(&health_path, get(handlers::health))
        .route(&status_path, get(handlers::status))
        .fallback(handlers::not_found)
        .with_state(state)
        .merge(oauth::portal::router(orchestrator.oauth_manager().clone()))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http());

    if health_path == status_path {
        log::warn!("health_path and status_path are identical ({health_path}); the later route wins");
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("failed to bind {listen_address}: {e}"))?;

    log::info!("listening on http://{listen_address}");
    log::info!("OAuth portal: http://{listen_address}/token-auth/demo, callback {callback_path}");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            result.map_err(|e| anyhow!("server error: {e}"))?;
        }
        () = shutdown_signal.cancelled() => {
            log::info!("shutdown signal received, draining in-flight requests");
        }
    }

    Ok(())
}
