//! Resolves the auth headers and refresh hook a transport needs for one
//! candidate target (spec §4.2 auth descriptors, §4.4 OAuth lifecycle).

use std::sync::Arc;

use async_trait::async_trait;
use config::{ApiKeyConfig, AuthConfig, ProviderConfig};
use oauth::{OAuthManager, TokenRef};
use provider::{AuthHeaders, AuthRefresher, NoRefresh, TransportError};
use router::ResolvedTarget;

/// Bridges [`OAuthManager`] into the transport's generic [`AuthRefresher`]
/// hook, so C2 can force a refresh on 401/403 without depending on C4.
struct OAuthRefresher {
    manager: Arc<OAuthManager>,
    token_ref: TokenRef,
}

#[async_trait]
impl AuthRefresher for OAuthRefresher {
    async fn refresh(&self) -> Result<AuthHeaders, TransportError> {
        let token = self
            .manager
            .get_token_force_refresh(&self.token_ref)
            .await
            .map_err(|err| TransportError::AuthFailure { detail: err.to_string() })?;
        Ok(AuthHeaders::bearer(token.token))
    }
}

/// Resolves the auth headers to send for `target` and the refresher a
/// transport should call on a 401/403.
///
/// A provider's OAuth `alias` is scoped by its own provider id as the
/// token record's `providerType` component (spec §4.4 token file naming
/// `{providerType}-oauth-{sequence}-{alias}.json`): two providers that
/// happen to share a transport [`config::ProviderType`] (e.g. two
/// `openai-compatible` providers) but need distinct OAuth apps still get
/// distinct token records this way.
pub async fn resolve_auth(
    provider: &ProviderConfig,
    provider_id: &str,
    target: &ResolvedTarget,
    oauth_manager: &Arc<OAuthManager>,
) -> Result<(AuthHeaders, Arc<dyn AuthRefresher>), TransportError> {
    match &provider.auth {
        AuthConfig::ApiKey(ApiKeyConfig { keys }) => {
            let index = target.key_id.as_deref().and_then(|id| id.parse::<usize>().ok()).unwrap_or(0);
            let key = keys.get(index).ok_or_else(|| TransportError::AuthFailure {
                detail: format!("no api key at index {index} configured for provider {provider_id}"),
            })?;
            Ok((AuthHeaders::bearer(key.clone()), Arc::new(NoRefresh) as Arc<dyn AuthRefresher>))
        }
        AuthConfig::OAuth { alias } => {
            let token_ref = TokenRef::new(provider_id.to_string(), alias.clone());
            let access_token = oauth_manager
                .get_token(&token_ref)
                .await
                .map_err(|err| TransportError::AuthFailure { detail: err.to_string() })?;
            let refresher = Arc::new(OAuthRefresher { manager: oauth_manager.clone(), token_ref });
            Ok((AuthHeaders::bearer(access_token.token), refresher as Arc<dyn AuthRefresher>))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ProviderType;
    use secrecy::{ExposeSecret, SecretString};

    fn api_key_provider(keys: Vec<&str>) -> ProviderConfig {
        ProviderConfig {
            provider_type: ProviderType::OpenAiCompatible,
            base_url: "https://api.openai.com/v1".to_string(),
            auth: AuthConfig::ApiKey(ApiKeyConfig { keys: keys.into_iter().map(|k| SecretString::from(k.to_string())).collect() }),
            timeout_ms: 60_000,
            max_retries: 3,
            max_context_tokens: 128_000,
            models: Default::default(),
            headers: Vec::new(),
            allowed_tool_names: Vec::new(),
            finish_reason_overrides: Default::default(),
            requires_agent_request_type: false,
            harvest_inline_tool_calls: false,
            reasoning_tag: None,
            flatten_mixed_content: false,
        }
    }

    fn target(key_id: Option<&str>) -> ResolvedTarget {
        ResolvedTarget {
            provider_id: "openai".to_string(),
            model_id: "gpt-4".to_string(),
            key_id: key_id.map(str::to_string),
            max_context_tokens: 128_000,
        }
    }

    #[tokio::test]
    async fn api_key_provider_uses_the_explicit_key_index() {
        let provider = api_key_provider(vec!["k0", "k1"]);
        let oauth_manager = Arc::new(OAuthManager::new(Default::default()));
        let (headers, _refresher) = resolve_auth(&provider, "openai", &target(Some("1")), &oauth_manager).await.unwrap();
        assert_eq!(headers.bearer.unwrap().expose_secret(), "k1");
    }

    #[tokio::test]
    async fn missing_key_id_defaults_to_index_zero() {
        let provider = api_key_provider(vec!["k0", "k1"]);
        let oauth_manager = Arc::new(OAuthManager::new(Default::default()));
        let (headers, _refresher) = resolve_auth(&provider, "openai", &target(None), &oauth_manager).await.unwrap();
        assert_eq!(headers.bearer.unwrap().expose_secret(), "k0");
    }

    #[tokio::test]
    async fn out_of_range_key_index_is_an_auth_failure() {
        let provider = api_key_provider(vec!["k0"]);
        let oauth_manager = Arc::new(OAuthManager::new(Default::default()));
        let result = resolve_auth(&provider, "openai", &target(Some("5")), &oauth_manager).await;
        assert!(matches!(result, Err(TransportError::AuthFailure { .. })));
    }
}
