//! Token set returned by a successful authorization code redemption.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Raw token response from the identity platform token endpoint.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Error body returned by the token endpoint on failure.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Signed-in account, taken from the id token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    /// `{object id}.{tenant id}`, stable across sessions.
    pub home_account_id: String,
    pub tenant_id: String,
    /// Usually the user principal name or email.
    pub username: String,
    pub name: Option<String>,
}

/// The subset of id token claims needed to describe the account.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    oid: Option<String>,
    sub: Option<String>,
    tid: Option<String>,
    preferred_username: Option<String>,
    upn: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

impl AccountInfo {
    /// Decode the account from an id token.
    ///
    /// Only the payload segment is read. The signature is not checked because the
    /// token was received directly from the token endpoint over TLS.
    pub fn from_id_token(id_token: &str) -> Result<Self, AuthError> {
        let payload = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::TokenExchangeFailed("id token is not a JWT".into()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::TokenExchangeFailed(format!("id token payload: {e}")))?;

        let claims: IdTokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::TokenExchangeFailed(format!("id token claims: {e}")))?;

        let tenant_id = claims.tid.unwrap_or_default();
        let object_id = claims.oid.or(claims.sub).unwrap_or_default();

        Ok(Self {
            home_account_id: format!("{}.{}", object_id, tenant_id),
            tenant_id,
            username: claims
                .preferred_username
                .or(claims.upn)
                .or(claims.email)
                .unwrap_or_default(),
            name: claims.name,
        })
    }
}

/// Tokens and account obtained from a code exchange.
#[derive(Clone)]
pub struct AuthenticationResult {
    pub access_token: Zeroizing<String>,
    pub refresh_token: Option<Zeroizing<String>>,
    pub id_token: Option<Zeroizing<String>>,
    pub token_type: String,
    pub scopes: Vec<String>,
    pub expires_on: DateTime<Utc>,
    pub account: Option<AccountInfo>,
}

impl AuthenticationResult {
    /// Build a result from a token response received at `now`.
    ///
    /// Fails when `expires_in` does not fit in a timestamp.
    pub(crate) fn from_token_response(
        response: TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let expires_on = i64::try_from(response.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::TokenExchangeFailed(format!(
                    "expires_in out of range: {}",
                    response.expires_in
                ))
            })?;

        let account = response
            .id_token
            .as_deref()
            .and_then(|token| match AccountInfo::from_id_token(token) {
                Ok(account) => Some(account),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable id token: {}", e);
                    None
                }
            });

        Ok(Self {
            access_token: Zeroizing::new(response.access_token),
            refresh_token: response.refresh_token.map(Zeroizing::new),
            id_token: response.id_token.map(Zeroizing::new),
            token_type: response.token_type,
            scopes: response
                .scope
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            expires_on,
            account,
        })
    }
}

impl fmt::Debug for AuthenticationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationResult")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .field("expires_on", &self.expires_on)
            .field("account", &self.account)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn encode_id_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}
