//! Route handlers.

use super::SharedState;
use crate::auth::oauth::{parse_callback_query, AuthCodeUrlParameters, AuthorizationCodeRequest};
use crate::error::{AppError, AuthError, EwsError};
use crate::ews::{InboxMessage, ItemView, OAuthCredentials};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, error, info};

/// Body of the redirect page once tokens are stored.
const TOKEN_RECEIVED_HTML: &str = r#"<a href="/">Token Received, go to Home to see mailbox</a>"#;

/// GET / lists the mailbox when a token is stored, otherwise sends the user to sign in.
pub async fn home(State(state): State<SharedState>) -> Response {
    if let Some(tokens) = state.tokens.current().await {
        match list_messages(&state, tokens.access_token.as_str()).await {
            Ok(messages) => return pretty_json(&messages),
            Err(e) => {
                error!("Mailbox request failed: {}", e);
                info!("Error in using credential, will try to get new token");
            }
        }
    }

    let params = AuthCodeUrlParameters {
        scopes: state.config.oauth.scopes.login.clone(),
        redirect_uri: state.config.oauth.redirect_uri.clone(),
    };

    match state.oauth.auth_code_url(&params) {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response(),
        Err(e) => {
            error!("Failed to build sign-in URL: {}", e);
            AppError::from(e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /redirect redeems the authorization code and stores the resulting tokens.
pub async fn redirect(
    State(state): State<SharedState>,
    query: Result<Query<RedirectQuery>, QueryRejection>,
) -> Result<Html<&'static str>, AppError> {
    let Query(query) = query.map_err(|e| {
        error!("Sign-in redirect has an unreadable query: {}", e);
        AuthError::InvalidAuthCode
    })?;

    let code = parse_callback_query(
        query.code.as_deref(),
        query.error.as_deref(),
        query.error_description.as_deref(),
    )
    .inspect_err(|e| error!("Sign-in redirect rejected: {}", e))?;

    let request = AuthorizationCodeRequest {
        code,
        scopes: state.config.oauth.scopes.token.clone(),
        redirect_uri: state.config.oauth.redirect_uri.clone(),
    };

    let result = state
        .oauth
        .acquire_token_by_code(&request)
        .await
        .inspect_err(|e| error!("Token request failed: {}", e))?;

    info!("Token received, expires on {}", result.expires_on);
    state.tokens.replace(result).await;

    Ok(Html(TOKEN_RECEIVED_HTML))
}

async fn list_messages(state: &SharedState, access_token: &str) -> Result<Vec<InboxMessage>, EwsError> {
    let view = ItemView::message_summary(state.config.ews.page_size);
    let results = state
        .exchange
        .find_items(
            &OAuthCredentials::new(access_token),
            state.config.ews.folder,
            &view,
        )
        .await?;

    debug!(
        "Listed {} of {} items (more available: {}, next offset: {:?})",
        results.items.len(),
        results.total_count,
        results.more_available,
        results.next_page_offset
    );

    Ok(results.items.iter().map(InboxMessage::from).collect())
}

/// Two-space indented JSON, like the sample's `json spaces` setting.
fn pretty_json(messages: &[InboxMessage]) -> Response {
    match serde_json::to_string_pretty(messages) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to serialize messages: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
