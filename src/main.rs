//! EWS Inbox - authorization code sign-in and inbox listing
//!
//! Signs the user in with the Microsoft identity platform and lists the newest
//! inbox messages through Exchange Web Services.

#![deny(clippy::all)]

mod auth;
mod config;
mod error;
mod ews;
mod server;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only report if it exists but cannot be read
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging.level);

    info!("Starting {} v{}", config.app.name, env!("CARGO_PKG_VERSION"));

    if config.missing_credentials() {
        warn!("CLIENT_ID or CLIENT_SECRET is not set; the identity platform will reject sign-in");
    }

    server::run(config).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
