//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.

use crate::ews::WellKnownFolderName;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub ews: EwsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authority: String,
    pub redirect_uri: String,
    pub scopes: ScopesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopesConfig {
    /// Scopes consented to on the sign-in page.
    pub login: Vec<String>,
    /// Scopes requested when redeeming the authorization code.
    pub token: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EwsConfig {
    pub url: String,
    /// Distinguished folder listed on the home page.
    pub folder: WellKnownFolderName,
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Whether personally identifiable data (usernames, addresses) may appear in logs.
    pub pii: bool,
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config: Config =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        config.apply_overrides(|key| env::var(key).ok())?;

        Ok(config)
    }

    /// Whether the client credentials are absent. They are not validated beyond this.
    pub fn missing_credentials(&self) -> bool {
        self.oauth.client_id.is_empty() || self.oauth.client_secret.is_empty()
    }

    /// Apply overrides from a key lookup (the process environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }

        if let Some(client_id) = lookup("CLIENT_ID") {
            self.oauth.client_id = client_id;
        }

        if let Some(client_secret) = lookup("CLIENT_SECRET") {
            self.oauth.client_secret = client_secret;
        }

        if let Some(authority) = lookup("AUTHORITY") {
            self.oauth.authority = authority;
        }

        if let Some(redirect_uri) = lookup("REDIRECT_URI") {
            self.oauth.redirect_uri = redirect_uri;
        }

        if let Some(ews_url) = lookup("EWS_URL") {
            self.ews.url = ews_url;
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Get the authorization URL for the configured authority.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth2/v2.0/authorize",
            self.oauth.authority.trim_end_matches('/')
        )
    }

    /// Get the token URL for the configured authority.
    pub fn token_url(&self) -> String {
        format!(
            "{}/oauth2/v2.0/token",
            self.oauth.authority.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
pub(crate) fn test_config(authority: &str, ews_url: &str) -> Config {
    Config {
        app: AppConfig {
            name: "test".into(),
        },
        server: ServerConfig { port: 3000 },
        oauth: OAuthConfig {
            client_id: "test-client".into(),
            client_secret: "test-secret".into(),
            authority: authority.into(),
            redirect_uri: "http://localhost:3000/redirect".into(),
            scopes: ScopesConfig {
                login: vec!["user.read".into(), "EWS.AccessAsUser.All".into()],
                token: vec!["https://outlook.office.com/.default".into()],
            },
        },
        ews: EwsConfig {
            url: ews_url.into(),
            folder: WellKnownFolderName::Inbox,
            page_size: 20,
        },
        logging: LoggingConfig {
            level: "info".into(),
            pii: false,
        },
    }
}
