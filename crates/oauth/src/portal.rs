//! Axum routes for the OAuth portal/callback pair (spec §6 "External
//! interfaces"): `GET /token-auth/demo` (registered before provider
//! initialization so the readiness probe always finds something
//! listening) and `GET {callback_path}` (default `/oauth2callback`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::manager::OAuthManager;

/// Builds the router fragment hosting the two OAuth HTTP routes, to be
/// merged into the main service router (spec §6 endpoint list).
pub fn router(manager: Arc<OAuthManager>) -> Router {
    let callback_path = manager.callback_path().to_string();
    Router::new()
        .route("/token-auth/demo", get(demo_page))
        .route(&callback_path, get(callback))
        .with_state(manager)
}

#[derive(Deserialize)]
struct DemoParams {
    provider: Option<String>,
    alias: Option<String>,
    #[serde(rename = "oauthUrl")]
    oauth_url: Option<String>,
}

/// Renders a minimal HTML page linking the user to the provider's
/// authorize URL the manager already built and passed in via `oauthUrl`.
/// This route itself stays stateless: every detail it needs arrives as a
/// query parameter (spec §4.4 "whose route must already be registered
/// before initiation").
async fn demo_page(Query(params): Query<DemoParams>) -> impl IntoResponse {
    let provider = params.provider.unwrap_or_else(|| "provider".to_string());
    let alias = params.alias.unwrap_or_else(|| "default".to_string());
    let body = match params.oauth_url {
        Some(url) => format!(
            "<html><body><h1>RouteCodex sign-in</h1><p>Finish connecting {provider} ({alias}):</p>\
             <a href=\"{url}\">Continue to {provider}</a></body></html>"
        ),
        None => "<html><body><h1>RouteCodex sign-in</h1><p>Waiting for an authorization request.</p></body></html>"
            .to_string(),
    };
    Html(body)
}

#[derive(Deserialize)]
struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

/// Completes the pending flow identified by `state`, handing the `code`
/// (or `error`) to whichever [`OAuthManager::get_token`] call is waiting
/// on it (spec §4.4 "receipt of `state`+`code` completes the flow").
async fn callback(State(manager): State<Arc<OAuthManager>>, Query(params): Query<CallbackParams>) -> impl IntoResponse {
    let Some(state) = params.state else {
        return Html("<html><body>Missing state parameter.</body></html>".to_string());
    };

    if manager.resolve_callback(&state, params.code, params.error) {
        Html("<html><body>Sign-in complete. You may close this window.</body></html>".to_string())
    } else {
        Html("<html><body>This sign-in request has already been completed or has expired.</body></html>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{OAuthManagerConfig, OAuthProviderConfig};
    use indexmap::IndexMap;

    fn manager() -> Arc<OAuthManager> {
        let mut providers = IndexMap::new();
        providers.insert(
            "qwen".to_string(),
            OAuthProviderConfig {
                device_authorization_url: "https://auth.example.test/authorize".to_string(),
                token_url: "https://auth.example.test/token".to_string(),
                client_id: "client".to_string(),
                client_secret: None,
                scope: None,
            },
        );
        Arc::new(OAuthManager::new(OAuthManagerConfig { providers, ..Default::default() }))
    }

    #[tokio::test]
    async fn callback_with_unknown_state_reports_expired() {
        let manager = manager();
        let resolved = manager.resolve_callback("unknown-state", Some("code".to_string()), None);
        assert!(!resolved);
    }
}
