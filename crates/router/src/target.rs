//! Route pool target string parsing and resolution against configured
//! providers (spec §6 "Route pool configuration schema": targets resolve
//! to `(providerId, modelId, keyId)`).

use config::{ApiKeyConfig, AuthConfig, ProviderConfig};
use indexmap::IndexMap;

/// A target string resolved against the configured providers, with its
/// effective context window and (if the provider uses static API keys)
/// the chosen key index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub provider_id: String,
    pub model_id: String,
    /// Decimal index into the provider's `ApiKeyConfig.keys`, when the
    /// provider authenticates with one or more static API keys. `None`
    /// for OAuth-backed providers, which have no key list to rotate.
    pub key_id: Option<String>,
    pub max_context_tokens: u64,
}

/// Splits a `providerId.modelId` or `providerId.modelId.keyId` target
/// string. The provider id is matched against `providers` first (rather
/// than always splitting on the first `.`) since model ids themselves
/// may contain dots (e.g. `glm-4.7`); the longest matching configured
/// provider id wins so a provider id that happens to be a prefix of
/// another doesn't steal the match.
fn split_target<'a>(raw: &'a str, providers: &IndexMap<String, ProviderConfig>) -> Option<(&'a str, &'a str)> {
    providers
        .keys()
        .filter(|id| raw == id.as_str() || raw.starts_with(&format!("{id}.")))
        .max_by_key(|id| id.len())
        .map(|id| {
            let rest = raw.strip_prefix(id.as_str()).unwrap_or("").trim_start_matches('.');
            (id.as_str(), rest)
        })
}

/// Resolves one route-pool target string. Returns `None` if the provider
/// id isn't configured, the remainder doesn't resolve to a non-empty
/// model id, or the target names a `keyId` the provider doesn't have.
pub fn resolve(raw: &str, providers: &IndexMap<String, ProviderConfig>) -> Option<ResolvedTarget> {
    let (provider_id, rest) = split_target(raw, providers)?;
    let provider = providers.get(provider_id)?;

    let (model_id, explicit_key) = split_trailing_key_index(rest, provider);
    if model_id.is_empty() {
        return None;
    }

    Some(ResolvedTarget {
        provider_id: provider_id.to_string(),
        model_id: model_id.to_string(),
        key_id: explicit_key,
        max_context_tokens: provider.max_context_tokens_for(model_id),
    })
}

/// If `rest` ends in `.N` where `N` is a valid index into the provider's
/// key list, splits it off as an explicit key id; otherwise the whole of
/// `rest` is the model id and no key was named explicitly.
fn split_trailing_key_index<'a>(rest: &'a str, provider: &ProviderConfig) -> (&'a str, Option<String>) {
    let AuthConfig::ApiKey(ApiKeyConfig { keys }) = &provider.auth else {
        return (rest, None);
    };
    let Some((model_part, suffix)) = rest.rsplit_once('.') else {
        return (rest, None);
    };
    match suffix.parse::<usize>() {
        Ok(index) if index < keys.len() => (model_part, Some(suffix.to_string())),
        _ => (rest, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ApiKeyConfig, AuthConfig, ProviderType};
    use secrecy::SecretString;

    fn providers() -> IndexMap<String, ProviderConfig> {
        let mut providers = IndexMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                provider_type: ProviderType::OpenAiCompatible,
                base_url: "https://api.openai.com/v1".to_string(),
                auth: AuthConfig::ApiKey(ApiKeyConfig { keys: vec![SecretString::from("k0".to_string()), SecretString::from("k1".to_string())] }),
                timeout_ms: 60_000,
                max_retries: 3,
                max_context_tokens: 128_000,
                models: IndexMap::new(),
                headers: Vec::new(),
                allowed_tool_names: Vec::new(),
                finish_reason_overrides: IndexMap::new(),
                requires_agent_request_type: false,
                harvest_inline_tool_calls: false,
                reasoning_tag: None,
                flatten_mixed_content: false,
            },
        );
        providers.insert(
            "iflow".to_string(),
            ProviderConfig {
                provider_type: ProviderType::OpenAiCompatible,
                base_url: "https://iflow.example/v1".to_string(),
                auth: AuthConfig::OAuth { alias: "primary".to_string() },
                timeout_ms: 60_000,
                max_retries: 3,
                max_context_tokens: 200_000,
                models: IndexMap::new(),
                headers: Vec::new(),
                allowed_tool_names: Vec::new(),
                finish_reason_overrides: IndexMap::new(),
                requires_agent_request_type: false,
                harvest_inline_tool_calls: true,
                reasoning_tag: None,
                flatten_mixed_content: false,
            },
        );
        providers
    }

    #[test]
    fn resolves_bare_provider_dot_model() {
        let target = resolve("openai.gpt-4", &providers()).unwrap();
        assert_eq!(target.provider_id, "openai");
        assert_eq!(target.model_id, "gpt-4");
        assert_eq!(target.key_id, None);
    }

    #[test]
    fn resolves_model_id_containing_a_dot() {
        let target = resolve("iflow.glm-4.7", &providers()).unwrap();
        assert_eq!(target.model_id, "glm-4.7");
    }

    #[test]
    fn resolves_explicit_key_index_suffix() {
        let target = resolve("openai.gpt-4.1", &providers()).unwrap();
        assert_eq!(target.model_id, "gpt-4");
        assert_eq!(target.key_id, Some("1".to_string()));
    }

    #[test]
    fn oauth_provider_never_resolves_a_key_id() {
        let target = resolve("iflow.glm-4.7.0", &providers()).unwrap();
        assert_eq!(target.model_id, "glm-4.7.0");
        assert_eq!(target.key_id, None);
    }

    #[test]
    fn unknown_provider_id_resolves_to_none() {
        assert!(resolve("unknown.gpt-4", &providers()).is_none());
    }
}
