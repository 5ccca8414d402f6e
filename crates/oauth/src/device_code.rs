//! Interactive authorization flow backing the `DEVICE_CODE_PENDING` state
//! (spec §4.4 "Device-code portal coordination"). The portal page the
//! manager serves at `/token-auth/demo` hands the user a link to the
//! provider's authorization endpoint; the user completes sign-in in their
//! own browser and the provider redirects back to the local callback
//! listener with `state`+`code`, which this module exchanges for a token.

use config::OAuthProviderConfig;
use serde::Deserialize;

use crate::error::OAuthError;
use crate::record::TokenRecord;

/// Builds the URL the portal page links the user to: the provider's
/// device-authorization endpoint used as a standard OAuth authorize
/// endpoint, with the local callback as the redirect target and `state`
/// carrying the correlation token the callback handler matches against
/// the pending flow.
pub fn authorize_url(provider: &OAuthProviderConfig, redirect_uri: &str, state: &str) -> String {
    let mut url = url::Url::parse(&provider.device_authorization_url).expect("configured URL is valid");
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &provider.client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("state", state);
        if let Some(scope) = &provider.scope {
            query.append_pair("scope", scope);
        }
    }
    url.into()
}

#[derive(Deserialize)]
struct TokenResponse {
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
    id_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Exchanges an authorization `code` received on the callback for a token
/// record, against the provider's token endpoint.
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenRecord, OAuthError> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", provider.client_id.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    let secret = provider.client_secret.as_ref().map(secrecy::ExposeSecret::expose_secret);
    if let Some(secret) = secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let response = http.post(&provider.token_url).form(&form).send().await?;
    let parsed: TokenResponse = response.json().await?;
    token_response_to_record(parsed)
}

fn token_response_to_record(response: TokenResponse) -> Result<TokenRecord, OAuthError> {
    if let Some(error) = response.error {
        return Err(OAuthError::DeviceCodeFailed(
            response.error_description.unwrap_or(error),
        ));
    }

    let now_ms = jiff::Timestamp::now().as_millisecond();
    let expires_at = now_ms + response.expires_in.unwrap_or(3600) * 1000;

    Ok(TokenRecord {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        token_type: response.token_type,
        expires_at,
        scope: response.scope,
        resource_url: None,
        id_token: response.id_token,
        provider_metadata: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::OAuthProviderConfig;

    fn provider() -> OAuthProviderConfig {
        OAuthProviderConfig {
            device_authorization_url: "https://auth.example.test/authorize".to_string(),
            token_url: "https://auth.example.test/token".to_string(),
            client_id: "client-123".to_string(),
            client_secret: None,
            scope: Some("chat".to_string()),
        }
    }

    #[test]
    fn authorize_url_carries_state_and_redirect() {
        let url = authorize_url(&provider(), "http://localhost:8080/oauth2callback", "state-abc");
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-abc"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth2callback"));
    }

    #[test]
    fn token_response_error_field_surfaces_as_device_code_failed() {
        let response = TokenResponse {
            access_token: String::new(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: None,
            scope: None,
            id_token: None,
            error: Some("access_denied".to_string()),
            error_description: Some("user declined".to_string()),
        };

        let err = token_response_to_record(response).unwrap_err();
        assert!(matches!(err, OAuthError::DeviceCodeFailed(detail) if detail == "user declined"));
    }

    #[test]
    fn successful_response_converts_expires_in_to_epoch_millis() {
        let response = TokenResponse {
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            scope: Some("chat".to_string()),
            id_token: None,
            error: None,
            error_description: None,
        };

        let before = jiff::Timestamp::now().as_millisecond();
        let record = token_response_to_record(response).unwrap();
        assert!(record.expires_at >= before + 3600 * 1000);
    }
}
