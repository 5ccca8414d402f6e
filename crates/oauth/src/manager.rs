//! The OAuth lifecycle manager itself (spec §4.4): per-record state,
//! single-flight refresh/device-code coordination via the record's own
//! `tokio::sync::Mutex`, and the public `getToken`/`invalidate`/`revoke`
//! surface.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::{OAuthManagerConfig, OAuthProviderConfig};
use jiff::Timestamp;
use secrecy::SecretString;
use tokio::sync::oneshot;

use crate::error::OAuthError;
use crate::record::{self, TokenRecord};
use crate::state::TokenState;
use crate::{device_code, refresh};

const STATIC_ALIAS: &str = "static";

/// Identifies one token record: the OAuth provider type (the key into
/// [`OAuthManagerConfig::providers`], e.g. `"qwen"`) plus the alias a
/// provider's `auth.alias` configuration names (spec §4.4 "Token file
/// naming").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenRef {
    pub provider_type: String,
    pub alias: String,
}

impl TokenRef {
    pub fn new(provider_type: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { provider_type: provider_type.into(), alias: alias.into() }
    }

    fn is_static(&self) -> bool {
        self.alias == STATIC_ALIAS
    }
}

/// A usable credential handed back to a transport (spec §4.4 `getToken`).
#[derive(Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub token_type: String,
    pub expires_at: Timestamp,
}

struct RecordState {
    state: TokenState,
    record: Option<TokenRecord>,
    path: Option<PathBuf>,
}

impl RecordState {
    fn fresh() -> Self {
        Self { state: TokenState::Unloaded, record: None, path: None }
    }
}

enum CallbackOutcome {
    Code(String),
    Error(String),
}

/// Owns every token record for the process and the local portal/callback
/// coordination state (spec §4.4 "Device-code portal coordination").
pub struct OAuthManager {
    config: OAuthManagerConfig,
    http: reqwest::Client,
    records: Mutex<HashMap<TokenRef, Arc<tokio::sync::Mutex<RecordState>>>>,
    pending: Mutex<HashMap<String, oneshot::Sender<CallbackOutcome>>>,
}

impl OAuthManager {
    pub fn new(config: OAuthManagerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("static client configuration is always valid");
        Self { config, http, records: Mutex::new(HashMap::new()), pending: Mutex::new(HashMap::new()) }
    }

    fn provider_config(&self, token_ref: &TokenRef) -> Result<&OAuthProviderConfig, OAuthError> {
        self.config.providers.get(&token_ref.provider_type).ok_or_else(|| {
            OAuthError::InvalidTokenFile {
                path: token_ref.provider_type.clone(),
                detail: "no oauth provider configured under this provider type".to_string(),
            }
        })
    }

    fn record_lock(&self, token_ref: &TokenRef) -> Arc<tokio::sync::Mutex<RecordState>> {
        self.records.lock().expect("records mutex is never held across an await point").entry(token_ref.clone()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(RecordState::fresh()))).clone()
    }

    /// The configured callback route path (e.g. `/oauth2callback`), for
    /// mounting [`crate::portal::router`].
    pub fn callback_path(&self) -> &str {
        &self.config.callback_path
    }

    fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.config.portal_port, self.config.callback_path)
    }

    /// Returns a valid access token, loading from disk, refreshing, or
    /// running the interactive portal flow as needed. Concurrent callers
    /// for the same `token_ref` serialize on the record's mutex and all
    /// observe the single resulting token or error (spec §4.4
    /// "Concurrency discipline").
    pub async fn get_token(&self, token_ref: &TokenRef) -> Result<AccessToken, OAuthError> {
        self.get_token_inner(token_ref, false).await
    }

    /// Forces a refresh (or full interactive re-auth, if no refresh token
    /// is on hand) regardless of the cached token's expiry. Used by the
    /// transport's one-shot forced-refresh-then-retry on 401/403.
    pub async fn get_token_force_refresh(&self, token_ref: &TokenRef) -> Result<AccessToken, OAuthError> {
        self.get_token_inner(token_ref, true).await
    }

    /// Marks the cached record (if any) expired, so the next [`Self::get_token`]
    /// call refreshes instead of serving the cached value.
    pub async fn invalidate(&self, token_ref: &TokenRef) {
        let lock = self.record_lock(token_ref);
        let mut guard = lock.lock().await;
        if let Some(record) = guard.record.as_mut() {
            record.expires_at = 0;
        }
    }

    /// Deletes the on-disk record, if any, and marks the in-memory record
    /// `REVOKED` (spec §4.4 "Any state → REVOKED on explicit revoke").
    pub async fn revoke(&self, token_ref: &TokenRef) -> Result<(), OAuthError> {
        let lock = self.record_lock(token_ref);
        let mut guard = lock.lock().await;
        if let Some(path) = &guard.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        guard.state = TokenState::Revoked;
        guard.record = None;
        Ok(())
    }

    async fn get_token_inner(&self, token_ref: &TokenRef, force_refresh: bool) -> Result<AccessToken, OAuthError> {
        let lock = self.record_lock(token_ref);
        let mut guard = lock.lock().await;

        if guard.state == TokenState::Revoked {
            if token_ref.is_static() {
                return Err(OAuthError::Revoked);
            }
            guard.state = TokenState::Unloaded;
            guard.record = None;
        }

        if guard.state == TokenState::Unloaded {
            self.load_from_disk(token_ref, &mut guard)?;
        }

        let now_ms = Timestamp::now().as_millisecond();
        let needs_refresh = force_refresh || guard.record.as_ref().is_none_or(|record| record.is_expired_at(now_ms));

        if !needs_refresh {
            return Ok(to_access_token(guard.record.as_ref().expect("checked above")));
        }

        if token_ref.is_static() {
            return Err(OAuthError::NoStaticToken(token_ref.alias.clone()));
        }

        let provider_cfg = self.provider_config(token_ref)?;

        if let Some(refresh_token) = guard.record.as_ref().and_then(|record| record.refresh_token.clone()) {
            guard.state = TokenState::Refreshing;
            if let Ok(new_record) = refresh::refresh(&self.http, provider_cfg, &refresh_token).await {
                let path = guard.path.clone().expect("path populated by load_from_disk");
                record::write_atomic(&path, &new_record)?;
                guard.record = Some(new_record.clone());
                guard.state = TokenState::Valid;
                return Ok(to_access_token(&new_record));
            }
        }

        guard.state = TokenState::DeviceCodePending;
        match self.run_interactive_flow(token_ref, provider_cfg).await {
            Ok(new_record) => {
                let path = guard.path.clone().expect("path populated by load_from_disk");
                record::write_atomic(&path, &new_record)?;
                guard.record = Some(new_record.clone());
                guard.state = TokenState::Valid;
                Ok(to_access_token(&new_record))
            }
            Err(err) => {
                guard.state = TokenState::Revoked;
                Err(err)
            }
        }
    }

    fn load_from_disk(&self, token_ref: &TokenRef, guard: &mut RecordState) -> Result<(), OAuthError> {
        let found = record::find(&self.config.token_dir, &token_ref.provider_type, &token_ref.alias)?;
        let path = match found {
            Some(name) => name.path(&self.config.token_dir),
            None if token_ref.is_static() => return Err(OAuthError::NoStaticToken(token_ref.alias.clone())),
            None => record::allocate(&self.config.token_dir, &token_ref.provider_type, &token_ref.alias)?.path(&self.config.token_dir),
        };

        guard.path = Some(path.clone());
        guard.state = TokenState::Loading;

        if path.exists() {
            guard.record = Some(record::read(&path)?);
            guard.state = TokenState::Valid;
        } else {
            guard.state = TokenState::Unloaded;
        }
        Ok(())
    }

    async fn run_interactive_flow(&self, token_ref: &TokenRef, provider_cfg: &OAuthProviderConfig) -> Result<TokenRecord, OAuthError> {
        let state = uuid::Uuid::new_v4().to_string();
        let redirect_uri = self.redirect_uri();
        let authorize_url = device_code::authorize_url(provider_cfg, &redirect_uri, &state);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("pending mutex is never held across an await point").insert(state.clone(), tx);

        self.probe_portal_readiness().await;
        log::info!(
            "oauth: waiting for device-code completion for {}/{} at {authorize_url}",
            token_ref.provider_type,
            token_ref.alias
        );

        let outcome = tokio::time::timeout(Duration::from_secs(self.config.device_code_timeout_secs), rx).await;
        self.pending.lock().expect("pending mutex is never held across an await point").remove(&state);

        let code = match outcome {
            Err(_elapsed) => return Err(OAuthError::DeviceCodeTimedOut),
            Ok(Err(_canceled)) => return Err(OAuthError::DeviceCodeTimedOut),
            Ok(Ok(CallbackOutcome::Error(detail))) => return Err(OAuthError::DeviceCodeFailed(detail)),
            Ok(Ok(CallbackOutcome::Code(code))) => code,
        };

        device_code::exchange_code(&self.http, provider_cfg, &code, &redirect_uri).await
    }

    /// Polls the portal route before prompting the user (spec §4.4 "poll
    /// ≤ 15×200ms = 3s"). Proceeds once the poll budget is spent even if
    /// no response was ever observed, rather than failing the whole flow.
    async fn probe_portal_readiness(&self) {
        let url = format!("http://localhost:{}/token-auth/demo", self.config.portal_port);
        for _ in 0..self.config.portal_readiness_max_polls {
            if self.http.get(&url).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(self.config.portal_readiness_poll_ms)).await;
        }
    }

    /// Called by the `/oauth2callback` axum handler (spec §6). Returns
    /// whether a pending flow with this `state` was found.
    pub fn resolve_callback(&self, state: &str, code: Option<String>, error: Option<String>) -> bool {
        let mut pending = self.pending.lock().expect("pending mutex is never held across an await point");
        let Some(sender) = pending.remove(state) else {
            return false;
        };
        let outcome = match (code, error) {
            (_, Some(error)) => CallbackOutcome::Error(error),
            (Some(code), None) => CallbackOutcome::Code(code),
            (None, None) => CallbackOutcome::Error("callback missing both code and error".to_string()),
        };
        let _ = sender.send(outcome);
        true
    }
}

fn to_access_token(record: &TokenRecord) -> AccessToken {
    AccessToken {
        token: SecretString::from(record.access_token.clone()),
        token_type: record.token_type.clone(),
        expires_at: Timestamp::from_millisecond(record.expires_at).unwrap_or_else(|_| Timestamp::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::OAuthProviderConfig;
    use indexmap::IndexMap;
    use secrecy::ExposeSecret;

    fn manager_with_static_provider(token_dir: PathBuf) -> OAuthManager {
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
        OAuthManager::new(OAuthManagerConfig {
            token_dir,
            portal_port: 8080,
            callback_path: "/oauth2callback".to_string(),
            device_code_timeout_secs: 1,
            portal_readiness_poll_ms: 1,
            portal_readiness_max_polls: 1,
            providers,
        })
    }

    #[tokio::test]
    async fn static_alias_with_no_file_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_static_provider(dir.path().to_path_buf());
        let result = manager.get_token(&TokenRef::new("qwen", "static")).await;
        assert!(matches!(result, Err(OAuthError::NoStaticToken(_))));
    }

    #[tokio::test]
    async fn loads_valid_cached_token_without_refreshing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        let far_future = Timestamp::now().as_millisecond() + 3_600_000;
        record::write_atomic(
            &path,
            &TokenRecord {
                access_token: "cached-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: far_future,
                scope: None,
                resource_url: None,
                id_token: None,
                provider_metadata: None,
            },
        )
        .unwrap();

        let manager = manager_with_static_provider(dir.path().to_path_buf());
        let token = manager.get_token(&TokenRef::new("qwen", "primary")).await.unwrap();
        assert_eq!(token.token.expose_secret(), "cached-token");
    }

    #[tokio::test]
    async fn expired_static_token_is_auth_failure_without_refresh_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-static.json");
        record::write_atomic(
            &path,
            &TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: Some("refresh".to_string()),
                token_type: "Bearer".to_string(),
                expires_at: 0,
                scope: None,
                resource_url: None,
                id_token: None,
                provider_metadata: None,
            },
        )
        .unwrap();

        let manager = manager_with_static_provider(dir.path().to_path_buf());
        let result = manager.get_token(&TokenRef::new("qwen", "static")).await;
        assert!(matches!(result, Err(OAuthError::NoStaticToken(_))));
    }

    #[tokio::test]
    async fn invalidate_forces_the_next_refresh_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        let far_future = Timestamp::now().as_millisecond() + 3_600_000;
        record::write_atomic(
            &path,
            &TokenRecord {
                access_token: "cached-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: far_future,
                scope: None,
                resource_url: None,
                id_token: None,
                provider_metadata: None,
            },
        )
        .unwrap();

        let manager = manager_with_static_provider(dir.path().to_path_buf());
        let token_ref = TokenRef::new("qwen", "primary");
        manager.get_token(&token_ref).await.unwrap();
        manager.invalidate(&token_ref).await;

        // No refresh token and no interactive flow will complete within the
        // 1-second test timeout configured above, so this surfaces as a
        // device-code timeout rather than silently serving the stale token.
        let result = manager.get_token(&token_ref).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn revoke_deletes_file_and_marks_revoked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        record::write_atomic(
            &path,
            &TokenRecord {
                access_token: "cached-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: Timestamp::now().as_millisecond() + 3_600_000,
                scope: None,
                resource_url: None,
                id_token: None,
                provider_metadata: None,
            },
        )
        .unwrap();

        let manager = manager_with_static_provider(dir.path().to_path_buf());
        let token_ref = TokenRef::new("qwen", "primary");
        manager.get_token(&token_ref).await.unwrap();
        manager.revoke(&token_ref).await.unwrap();

        assert!(!path.exists());
        let result = manager.get_token(&token_ref).await;
        assert!(result.is_err());
    }

    /// Spins up a local token endpoint that always grants a fresh access
    /// token, counting how many times it was called.
    async fn spawn_token_endpoint() -> (std::net::SocketAddr, std::sync::Arc<std::sync::atomic::AtomicU32>) {
        use axum::{routing::post, Json, Router};
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let app = Router::new().route(
            "/token",
            post(move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({
                        "access_token": "refreshed-token",
                        "refresh_token": "refresh",
                        "token_type": "Bearer",
                        "expires_in": 3600,
                    }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (address, calls)
    }

    fn manager_with_token_url(token_dir: PathBuf, token_url: String) -> OAuthManager {
        let mut providers = IndexMap::new();
        providers.insert(
            "qwen".to_string(),
            OAuthProviderConfig {
                device_authorization_url: "https://auth.example.test/authorize".to_string(),
                token_url,
                client_id: "client".to_string(),
                client_secret: None,
                scope: None,
            },
        );
        OAuthManager::new(OAuthManagerConfig {
            token_dir,
            portal_port: 8080,
            callback_path: "/oauth2callback".to_string(),
            device_code_timeout_secs: 1,
            portal_readiness_poll_ms: 1,
            portal_readiness_max_polls: 1,
            providers,
        })
    }

    fn expired_record_with_refresh_token() -> TokenRecord {
        TokenRecord {
            access_token: "stale".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: 0,
            scope: None,
            resource_url: None,
            id_token: None,
            provider_metadata: None,
        }
    }

    /// S3: an expired token with a refresh token present triggers exactly
    /// one refresh call and the returned token is the freshly-issued one.
    #[tokio::test]
    async fn expired_token_with_refresh_token_refreshes_once_via_token_url() {
        let (address, calls) = spawn_token_endpoint().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        record::write_atomic(&path, &expired_record_with_refresh_token()).unwrap();

        let manager = manager_with_token_url(dir.path().to_path_buf(), format!("http://{address}/token"));
        let token = manager.get_token(&TokenRef::new("qwen", "primary")).await.unwrap();

        assert_eq!(token.token.expose_secret(), "refreshed-token");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    /// Quantified law (spec §8): two concurrent `get_token` calls against
    /// the same expired record observe exactly one refresh network call
    /// and both succeed, since refreshes for the same record are
    /// single-flighted through the record's own mutex.
    #[tokio::test]
    async fn concurrent_get_token_calls_against_expired_record_single_flight_the_refresh() {
        let (address, calls) = spawn_token_endpoint().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        record::write_atomic(&path, &expired_record_with_refresh_token()).unwrap();

        let manager = std::sync::Arc::new(manager_with_token_url(dir.path().to_path_buf(), format!("http://{address}/token")));
        let token_ref = TokenRef::new("qwen", "primary");

        let (a, b) = tokio::join!(manager.get_token(&token_ref), manager.get_token(&token_ref));

        assert_eq!(a.unwrap().token.expose_secret(), "refreshed-token");
        assert_eq!(b.unwrap().token.expose_secret(), "refreshed-token");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
