//! Confidential OAuth2 client for the Microsoft identity platform.

use super::result::{AuthenticationResult, TokenErrorResponse, TokenResponse};
use crate::config::Config;
use crate::error::{AppError, AuthError};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scopes the identity platform always needs for an id token and a refresh token.
const OIDC_DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Parameters for the sign-in URL.
#[derive(Debug, Clone)]
pub struct AuthCodeUrlParameters {
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

/// Parameters for redeeming an authorization code.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeRequest {
    pub code: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

/// OAuth2 client authenticating with a client secret.
pub struct ConfidentialClient {
    client_id: String,
    client_secret: Zeroizing<String>,
    authorize_endpoint: String,
    token_endpoint: String,
    http_client: reqwest::Client,
}

impl ConfidentialClient {
    /// Create a new client from configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client_id: config.oauth.client_id.clone(),
            client_secret: Zeroizing::new(config.oauth.client_secret.clone()),
            authorize_endpoint: config.authorize_url(),
            token_endpoint: config.token_url(),
            http_client,
        })
    }

    /// Generate the URL that signs the user in and asks consent for `params.scopes`.
    pub fn auth_code_url(&self, params: &AuthCodeUrlParameters) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.authorize_endpoint)
            .map_err(|e| AuthError::InvalidAuthority(format!("{}: {}", self.authorize_endpoint, e)))?;

        let request_id = Uuid::new_v4().to_string();

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &params.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &with_oidc_scopes(&params.scopes))
            .append_pair("client-request-id", &request_id);

        debug!("Generated authorization URL (client-request-id {})", request_id);

        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    pub async fn acquire_token_by_code(
        &self,
        request: &AuthorizationCodeRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        if request.code.trim().is_empty() {
            return Err(AuthError::InvalidAuthCode);
        }

        let scope = with_oidc_scopes(&request.scopes);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", request.code.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];

        let request_id = Uuid::new_v4().to_string();
        debug!("Redeeming authorization code (client-request-id {})", request_id);

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .header("client-request-id", &request_id)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Log error details for debugging (doesn't expose to user)
            let error_body = response.text().await.unwrap_or_default();

            return Err(match serde_json::from_str::<TokenErrorResponse>(&error_body) {
                Ok(oauth_error) => {
                    error!(
                        "Token exchange failed: HTTP {} - {}: {}",
                        status,
                        oauth_error.error,
                        oauth_error.error_description.as_deref().unwrap_or_default()
                    );
                    AuthError::TokenExchangeFailed(format!(
                        "HTTP {} ({})",
                        status.as_u16(),
                        oauth_error.error
                    ))
                }
                Err(_) => {
                    error!("Token exchange failed: HTTP {} - {}", status, error_body);
                    AuthError::TokenExchangeFailed(format!("HTTP {}", status.as_u16()))
                }
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        AuthenticationResult::from_token_response(token_response, Utc::now())
    }
}

/// Join requested scopes with the OIDC defaults, dropping case-insensitive duplicates.
fn with_oidc_scopes(scopes: &[String]) -> String {
    let mut merged: Vec<&str> = Vec::with_capacity(scopes.len() + OIDC_DEFAULT_SCOPES.len());

    for scope in scopes
        .iter()
        .map(String::as_str)
        .chain(OIDC_DEFAULT_SCOPES)
    {
        let scope = scope.trim();
        if !scope.is_empty() && !merged.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            merged.push(scope);
        }
    }

    merged.join(" ")
}

/// Turn the redirect query parameters into an authorization code.
pub fn parse_callback_query(
    code: Option<&str>,
    error: Option<&str>,
    error_description: Option<&str>,
) -> Result<String, AuthError> {
    if let Some(error) = error {
        let description = error_description.unwrap_or(error);
        return Err(AuthError::OAuthFailed(description.to_string()));
    }

    match code {
        Some(code) if !code.trim().is_empty() => Ok(code.to_string()),
        _ => Err(AuthError::InvalidAuthCode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::result::encode_id_token;
    use crate::config::test_config;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn client(authority: &str) -> ConfidentialClient {
        ConfidentialClient::new(&test_config(authority, "http://127.0.0.1:1/ews")).unwrap()
    }

    fn code_request(code: &str) -> AuthorizationCodeRequest {
        AuthorizationCodeRequest {
            code: code.into(),
            scopes: vec!["https://outlook.office.com/.default".into()],
            redirect_uri: "http://localhost:3000/redirect".into(),
        }
    }

    #[test]
    fn test_auth_code_url() {
        let client = client("https://login.microsoftonline.com/common");
        let url = client
            .auth_code_url(&AuthCodeUrlParameters {
                scopes: vec!["user.read".into(), "EWS.AccessAsUser.All".into()],
                redirect_uri: "http://localhost:3000/redirect".into(),
            })
            .unwrap();

        assert_eq!(
            url.as_str().split('?').next().unwrap(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id"), Some(&"test-client".to_string()));
        assert_eq!(pairs.get("response_type"), Some(&"code".to_string()));
        assert_eq!(
            pairs.get("redirect_uri"),
            Some(&"http://localhost:3000/redirect".to_string())
        );
        assert_eq!(
            pairs.get("scope"),
            Some(&"user.read EWS.AccessAsUser.All openid profile offline_access".to_string())
        );
        assert!(pairs.contains_key("client-request-id"));
    }

    #[test]
    fn test_auth_code_url_invalid_authority() {
        let client = client("not a url");
        let result = client.auth_code_url(&AuthCodeUrlParameters {
            scopes: vec![],
            redirect_uri: "http://localhost:3000/redirect".into(),
        });
        assert!(matches!(result, Err(AuthError::InvalidAuthority(_))));
    }

    #[test]
    fn test_scope_merge_deduplicates() {
        let scopes = vec!["OpenID".to_string(), "user.read".to_string(), " ".to_string()];
        assert_eq!(
            with_oidc_scopes(&scopes),
            "OpenID user.read profile offline_access"
        );
    }

    #[test]
    fn test_parse_callback_success() {
        assert_eq!(
            parse_callback_query(Some("abc123"), None, None).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_parse_callback_error() {
        let result = parse_callback_query(None, Some("access_denied"), Some("User cancelled"));
        assert!(matches!(result, Err(AuthError::OAuthFailed(ref d)) if d == "User cancelled"));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let result = parse_callback_query(None, None, None);
        assert!(matches!(result, Err(AuthError::InvalidAuthCode)));

        let result = parse_callback_query(Some(""), None, None);
        assert!(matches!(result, Err(AuthError::InvalidAuthCode)));
    }

    #[tokio::test]
    async fn test_acquire_token_by_code() {
        let server = MockServer::start_async().await;
        let id_token = encode_id_token(&json!({
            "oid": "oid-1",
            "tid": "tid-1",
            "preferred_username": "adele@contoso.com",
        }));

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth2/v2.0/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body_includes("grant_type=authorization_code")
                    .body_includes("code=the-code")
                    .body_includes("client_secret=test-secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "access_token": "access-123",
                        "token_type": "Bearer",
                        "expires_in": 3599,
                        "refresh_token": "refresh-123",
                        "id_token": id_token,
                        "scope": "https://outlook.office.com/EWS.AccessAsUser.All",
                    }));
            })
            .await;

        let result = client(&server.base_url())
            .acquire_token_by_code(&code_request("the-code"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.access_token.as_str(), "access-123");
        assert_eq!(
            result.refresh_token.as_ref().map(|t| t.as_str()),
            Some("refresh-123")
        );
        assert!(result.expires_on > Utc::now());
        assert_eq!(
            result.account.as_ref().map(|a| a.username.as_str()),
            Some("adele@contoso.com")
        );
    }

    #[tokio::test]
    async fn test_acquire_token_by_code_invalid_grant() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/v2.0/token");
                then.status(400)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "error": "invalid_grant",
                        "error_description": "AADSTS70008: The code has expired.",
                    }));
            })
            .await;

        let result = client(&server.base_url())
            .acquire_token_by_code(&code_request("stale"))
            .await;

        mock.assert_async().await;
        match result {
            Err(AuthError::TokenExchangeFailed(message)) => {
                assert_eq!(message, "HTTP 400 (invalid_grant)");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_code_skips_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/v2.0/token");
                then.status(200);
            })
            .await;

        let result = client(&server.base_url())
            .acquire_token_by_code(&code_request("  "))
            .await;

        assert!(matches!(result, Err(AuthError::InvalidAuthCode)));
        assert_eq!(mock.calls_async().await, 0);
    }
}
