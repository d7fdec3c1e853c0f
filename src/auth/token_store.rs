//! In-memory slot holding the most recent token set.

use super::result::AuthenticationResult;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Holds the last successful code exchange. Every replace overwrites it.
#[derive(Clone, Default)]
pub struct TokenStore {
    slot: Arc<RwLock<Option<AuthenticationResult>>>,
    /// Whether account names may be written to logs.
    log_pii: bool,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new(log_pii: bool) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            log_pii,
        }
    }

    /// Get a copy of the current token set, if any.
    pub async fn current(&self) -> Option<AuthenticationResult> {
        self.slot.read().await.clone()
    }

    /// Replace the stored token set.
    pub async fn replace(&self, result: AuthenticationResult) {
        let account = account_label(&result, self.log_pii);
        let lifetime = time_until_expiry(&result)
            .map(format_duration)
            .unwrap_or_else(|| "expired".to_string());

        info!(
            "Token stored for {} (scopes: {}), valid for {}",
            account,
            result.scopes.join(" "),
            lifetime
        );

        *self.slot.write().await = Some(result);
    }
}

/// Name of the signed-in account as it may appear in logs.
fn account_label(result: &AuthenticationResult, log_pii: bool) -> String {
    match (&result.account, log_pii) {
        (Some(account), true) => account.username.clone(),
        (Some(_), false) => "<redacted>".to_string(),
        (None, _) => "unknown account".to_string(),
    }
}

/// Calculate the remaining time until token expiry.
pub fn time_until_expiry(result: &AuthenticationResult) -> Option<Duration> {
    let now = Utc::now();

    if result.expires_on > now {
        Some(result.expires_on - now)
    } else {
        None
    }
}

/// Format duration as human-readable string (e.g., "45 min", "1 hour").
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();

    if total_minutes < 1 {
        "< 1 min".to_string()
    } else if total_minutes < 60 {
        format!("{} min", total_minutes)
    } else {
        let hours = total_minutes / 60;
        let mins = total_minutes % 60;
        if mins == 0 {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

#[cfg(test)]
pub(crate) fn token_for_tests(access_token: &str, expires_in: Duration) -> AuthenticationResult {
    use zeroize::Zeroizing;

    AuthenticationResult {
        access_token: Zeroizing::new(access_token.to_string()),
        refresh_token: None,
        id_token: None,
        token_type: "Bearer".into(),
        scopes: vec!["https://outlook.office.com/EWS.AccessAsUser.All".into()],
        expires_on: Utc::now() + expires_in,
        account: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::result::AccountInfo;

    fn signed_in_as(username: &str) -> AuthenticationResult {
        let mut result = token_for_tests("a", Duration::hours(1));
        result.account = Some(AccountInfo {
            home_account_id: "oid.tid".into(),
            tenant_id: "tid".into(),
            username: username.into(),
            name: None,
        });
        result
    }

    #[test]
    fn test_account_label_redacts_without_pii() {
        let result = signed_in_as("adele@contoso.com");
        assert_eq!(account_label(&result, false), "<redacted>");
        assert_eq!(account_label(&result, true), "adele@contoso.com");
    }

    #[test]
    fn test_account_label_without_account() {
        let result = token_for_tests("a", Duration::hours(1));
        assert_eq!(account_label(&result, false), "unknown account");
        assert_eq!(account_label(&result, true), "unknown account");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(30)), "< 1 min");
        assert_eq!(format_duration(Duration::minutes(5)), "5 min");
        assert_eq!(format_duration(Duration::minutes(45)), "45 min");
        assert_eq!(format_duration(Duration::hours(1)), "1 hour");
        assert_eq!(format_duration(Duration::hours(2)), "2 hours");
        assert_eq!(format_duration(Duration::minutes(90)), "1h 30m");
    }

    #[test]
    fn test_time_until_expiry() {
        let fresh = token_for_tests("a", Duration::hours(1));
        let remaining = time_until_expiry(&fresh).unwrap();
        assert!(remaining.num_minutes() > 55);

        let stale = token_for_tests("a", Duration::hours(-1));
        assert!(time_until_expiry(&stale).is_none());
    }

    #[tokio::test]
    async fn test_store_starts_empty() {
        let store = TokenStore::new(false);
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let store = TokenStore::new(false);
        store.replace(token_for_tests("first", Duration::hours(1))).await;
        store.replace(token_for_tests("second", Duration::hours(1))).await;

        let current = store.current().await.unwrap();
        assert_eq!(current.access_token.as_str(), "second");
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let store = TokenStore::new(true);
        let handle = store.clone();
        handle.replace(token_for_tests("shared", Duration::minutes(5))).await;

        assert_eq!(
            store.current().await.unwrap().access_token.as_str(),
            "shared"
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_still_stored() {
        let store = TokenStore::new(false);
        store.replace(token_for_tests("old", Duration::minutes(-5))).await;
        assert!(store.current().await.is_some());
    }
}
