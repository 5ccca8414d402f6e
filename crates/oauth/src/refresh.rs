//! Refresh-token grant (spec §4.4 "Any alias other than `static`: tokens
//! are refreshed on demand").

use config::OAuthProviderConfig;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::error::OAuthError;
use crate::record::TokenRecord;

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Exchanges `refresh_token` for a fresh access token. Providers rotate
/// refresh tokens on some calls and not others, so the prior refresh token
/// is kept whenever the response omits one.
pub async fn refresh(
    http: &reqwest::Client,
    provider: &OAuthProviderConfig,
    refresh_token: &str,
) -> Result<TokenRecord, OAuthError> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", provider.client_id.as_str()),
    ];
    let secret = provider.client_secret.as_ref().map(|s| s.expose_secret());
    if let Some(secret) = secret {
        form.push(("client_secret", secret));
    }

    let response = http.post(&provider.token_url).form(&form).send().await?;
    let parsed: RefreshResponse = response.json().await?;
    refresh_response_to_record(parsed, refresh_token)
}

fn refresh_response_to_record(response: RefreshResponse, prior_refresh_token: &str) -> Result<TokenRecord, OAuthError> {
    if let Some(error) = response.error {
        return Err(OAuthError::RefreshFailed(response.error_description.unwrap_or(error)));
    }

    let now_ms = jiff::Timestamp::now().as_millisecond();
    Ok(TokenRecord {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or_else(|| Some(prior_refresh_token.to_string())),
        token_type: response.token_type,
        expires_at: now_ms + response.expires_in.unwrap_or(3600) * 1000,
        scope: response.scope,
        resource_url: None,
        id_token: None,
        provider_metadata: None,
    })
}
