//! HTTP surface: the home page and the OAuth redirect endpoint.

pub mod routes;

use crate::auth::oauth::ConfidentialClient;
use crate::auth::token_store::TokenStore;
use crate::config::Config;
use crate::error::AppError;
use crate::ews::ExchangeService;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub oauth: ConfidentialClient,
    pub exchange: ExchangeService,
    pub tokens: TokenStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the clients described by `config` with an empty token store.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let oauth = ConfidentialClient::new(&config)?;
        let exchange = ExchangeService::new(&config.ews.url)?;
        let tokens = TokenStore::new(config.logging.pii);

        Ok(Self {
            config,
            oauth,
            exchange,
            tokens,
        })
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/redirect", get(routes::redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run(config: Config) -> Result<(), AppError> {
    let port = config.server.port;
    let state: SharedState = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Auth code sample app listening on port {}", port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
