//! Error types for the ews-inbox application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("EWS error: {0}")]
    Ews(#[from] EwsError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth2 authorization failed: {0}")]
    OAuthFailed(String),

    #[error("Invalid authorization code")]
    InvalidAuthCode,

    #[error("Invalid authority URL: {0}")]
    InvalidAuthority(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
}

/// Exchange Web Services errors.
#[derive(Error, Debug)]
pub enum EwsError {
    #[error("EWS request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse EWS response: {0}")]
    ParseFailed(String),

    #[error("EWS returned {code}: {message}")]
    Response { code: String, message: String },

    #[error("SOAP fault: {0}")]
    Fault(String),

    #[error("Unauthorized (401): Token may be expired")]
    Unauthorized,

    #[error("Forbidden (403): Insufficient permissions")]
    Forbidden,

    #[error("Throttled by the server (HTTP {0})")]
    Throttled(u16),
}

impl AppError {
    /// Returns a user-friendly message for the HTTP response body.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Auth(AuthError::OAuthFailed(_)) => "Sign-in failed. Please try again.",
            Self::Auth(AuthError::InvalidAuthCode) => "Missing or invalid authorization code.",
            Self::Auth(AuthError::InvalidAuthority(_)) => {
                "Configuration error. Please check the authority URL."
            }
            Self::Auth(AuthError::TokenExchangeFailed(_)) => {
                "Could not redeem the authorization code. Please sign in again."
            }
            Self::Ews(EwsError::Unauthorized) => "Mailbox access denied. Sign in again.",
            Self::Ews(EwsError::Forbidden) => "Insufficient permissions for the mailbox.",
            Self::Ews(EwsError::Throttled(_)) => "Too many requests. Please wait a moment.",
            Self::Ews(_) => "Could not read the mailbox.",
            Self::Network(_) => "Network error. Check your connection.",
            Self::Io(_) => "An error occurred. Please try again.",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.user_message().to_string()).into_response()
    }
}
