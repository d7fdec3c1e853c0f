//! Exchange Web Services client authenticated with an OAuth bearer token.

use super::models::{FindItemsResults, ItemView, WellKnownFolderName};
use super::soap;
use crate::error::{AppError, EwsError};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use zeroize::Zeroizing;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bearer credentials for one EWS call.
pub struct OAuthCredentials {
    access_token: Zeroizing<String>,
}

impl OAuthCredentials {
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: Zeroizing::new(access_token.to_string()),
        }
    }
}

/// EWS endpoint client.
pub struct ExchangeService {
    url: String,
    http_client: Client,
}

impl ExchangeService {
    /// Create a client for the EWS endpoint at `url`.
    pub fn new(url: &str) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }

    /// Find items in a distinguished folder, one page as described by `view`.
    pub async fn find_items(
        &self,
        credentials: &OAuthCredentials,
        folder: WellKnownFolderName,
        view: &ItemView,
    ) -> Result<FindItemsResults, EwsError> {
        let body = soap::find_item_request(folder, view);

        debug!(
            "FindItem in {} (offset {}, page size {})",
            folder.distinguished_id(),
            view.offset,
            view.page_size
        );

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(credentials.access_token.as_str())
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header(USER_AGENT, concat!("ews-inbox/", env!("CARGO_PKG_VERSION")))
            .body(body)
            .send()
            .await
            .map_err(|e| EwsError::RequestFailed(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200 => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| EwsError::ParseFailed(e.to_string()))?;
                soap::parse_find_item_response(&text)
            }
            401 => Err(EwsError::Unauthorized),
            403 => Err(EwsError::Forbidden),
            429 | 503 => Err(EwsError::Throttled(status.as_u16())),
            _ => {
                let text = response.text().await.unwrap_or_default();
                // EWS reports schema and server errors as SOAP faults with HTTP 500.
                match soap::parse_find_item_response(&text) {
                    Err(fault @ (EwsError::Fault(_) | EwsError::Response { .. })) => Err(fault),
                    _ => {
                        error!("FindItem failed: HTTP {} - {}", status, text);
                        Err(EwsError::RequestFailed(format!("HTTP {}", status.as_u16())))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ews::soap::SAMPLE_RESPONSE;
    use httpmock::prelude::*;

    fn service(server: &MockServer) -> ExchangeService {
        ExchangeService::new(&server.url("/ews/exchange.asmx")).unwrap()
    }

    #[tokio::test]
    async fn test_find_items_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ews/exchange.asmx")
                    .header("authorization", "Bearer token-abc")
                    .header("content-type", "text/xml; charset=utf-8")
                    .body_includes(r#"<t:DistinguishedFolderId Id="inbox" />"#)
                    .body_includes(r#"MaxEntriesReturned="20""#);
                then.status(200)
                    .header("content-type", "text/xml; charset=utf-8")
                    .body(SAMPLE_RESPONSE);
            })
            .await;

        let results = service(&server)
            .find_items(
                &OAuthCredentials::new("token-abc"),
                WellKnownFolderName::Inbox,
                &ItemView::message_summary(20),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(results.items.len(), 2);
        assert_eq!(results.total_count, 57);
    }

    #[tokio::test]
    async fn test_find_items_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ews/exchange.asmx");
                then.status(401);
            })
            .await;

        let result = service(&server)
            .find_items(
                &OAuthCredentials::new("expired"),
                WellKnownFolderName::Inbox,
                &ItemView::message_summary(20),
            )
            .await;

        assert!(matches!(result, Err(EwsError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_find_items_fault_on_500() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ews/exchange.asmx");
                then.status(500).body(
                    r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault>
                    <faultcode>a:ErrorInvalidServerVersion</faultcode>
                    <faultstring>The specified server version is invalid.</faultstring>
                    </s:Fault></s:Body></s:Envelope>"#,
                );
            })
            .await;

        let result = service(&server)
            .find_items(
                &OAuthCredentials::new("token"),
                WellKnownFolderName::Inbox,
                &ItemView::message_summary(20),
            )
            .await;

        assert!(
            matches!(result, Err(EwsError::Fault(ref m)) if m == "The specified server version is invalid.")
        );
    }

    #[tokio::test]
    async fn test_find_items_other_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ews/exchange.asmx");
                then.status(502).body("Bad Gateway");
            })
            .await;

        let result = service(&server)
            .find_items(
                &OAuthCredentials::new("token"),
                WellKnownFolderName::Inbox,
                &ItemView::message_summary(20),
            )
            .await;

        assert!(matches!(result, Err(EwsError::RequestFailed(ref m)) if m == "HTTP 502"));
    }

    #[tokio::test]
    async fn test_find_items_throttled() {
        for status in [429, 503] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/ews/exchange.asmx");
                    then.status(status);
                })
                .await;

            let result = service(&server)
                .find_items(
                    &OAuthCredentials::new("token"),
                    WellKnownFolderName::Inbox,
                    &ItemView::message_summary(20),
                )
                .await;

            assert!(
                matches!(result, Err(EwsError::Throttled(code)) if code == status),
                "HTTP {status}: {result:?}"
            );
        }
    }
}
