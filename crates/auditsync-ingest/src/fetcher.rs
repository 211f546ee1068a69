//! Paginated audit-log fetcher
//!
//! One call issues one bounded request: a fixed page size, a closed time
//! window and an optional continuation token. A 401 triggers exactly one
//! token refresh and one resend; anything else that is not a success is
//! returned to the caller as [`IngestError::Fetch`]. Transport errors are
//! not retried here, the next scheduled tick is the retry.

use crate::auth::TokenRefresher;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use auditsync_common::{time::parse_event_time, EpochMillis};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Maximum number of records the API returns per page
pub const PAGE_SIZE: u32 = 500;

/// Closed interval of event times, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: EpochMillis,
    pub end: EpochMillis,
}

impl TimeWindow {
    pub fn new(start: EpochMillis, end: EpochMillis) -> Self {
        Self { start, end }
    }
}

/// One opaque audit-log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogItem(serde_json::Value);

impl LogItem {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The record exactly as the API returned it
    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    /// The record's `event_time`, in epoch milliseconds
    pub fn event_time(&self) -> Result<EpochMillis> {
        let value = self
            .0
            .get("event_time")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IngestError::invalid_record("missing string field 'event_time'"))?;

        parse_event_time(value).map_err(|e| IngestError::invalid_record(e.to_string()))
    }
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    #[serde(default)]
    pub items: Vec<LogItem>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl LogPage {
    /// Continuation token, if the API reported more results
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|token| !token.is_empty())
    }
}

/// Source of audit-log pages
#[async_trait]
pub trait LogFetcher: Send + Sync {
    /// Fetch a single page of records inside `window`
    async fn fetch(&self, window: TimeWindow, page_token: Option<&str>) -> Result<LogPage>;
}

/// HTTP client for the remote audit-log API
pub struct AuditLogClient {
    client: Client,
    base_url: String,
    refresher: TokenRefresher,
}

impl AuditLogClient {
    pub fn new(client: Client, base_url: impl Into<String>, refresher: TokenRefresher) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            refresher,
        }
    }

    fn list_url(&self) -> String {
        format!("{}/audit.log.list", self.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        access_token: &str,
        window: TimeWindow,
        page_token: Option<&str>,
    ) -> Result<Response> {
        let mut query = vec![
            ("page_size", PAGE_SIZE.to_string()),
            ("start_time", window.start.to_string()),
            ("end_time", window.end.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let response = self
            .client
            .get(self.list_url())
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await?;

        Ok(response)
    }

    async fn current_access_token(&self) -> Result<Option<String>> {
        self.refresher.credentials().access_token().await
    }
}

#[async_trait]
impl LogFetcher for AuditLogClient {
    #[instrument(skip(self), fields(start = window.start, end = window.end))]
    async fn fetch(&self, window: TimeWindow, page_token: Option<&str>) -> Result<LogPage> {
        let first_attempt = match self.current_access_token().await? {
            Some(token) => Some(self.send(&token, window, page_token).await?),
            None => None,
        };

        let response = match first_attempt {
            Some(response) if response.status() != StatusCode::UNAUTHORIZED => response,
            _ => {
                warn!("Access token missing or rejected, refreshing and retrying once");
                self.refresher.refresh(None).await?;

                let token = self
                    .current_access_token()
                    .await?
                    .ok_or(IngestError::MissingCredential("access token"))?;
                self.send(&token, window, page_token).await?
            },
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        let page: LogPage = response.json().await?;
        debug!(
            items = page.items.len(),
            has_more = page.continuation().is_some(),
            "Fetched audit log page"
        );

        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_time_accessor() {
        let item = LogItem::new(json!({"event_time": "2024-01-01T00:00:00.500Z", "action": "login"}));
        assert_eq!(item.event_time().unwrap(), 1_704_067_200_500);

        let missing = LogItem::new(json!({"action": "login"}));
        assert!(matches!(missing.event_time(), Err(IngestError::InvalidRecord(_))));

        let malformed = LogItem::new(json!({"event_time": "yesterday"}));
        assert!(matches!(malformed.event_time(), Err(IngestError::InvalidRecord(_))));
    }

    #[test]
    fn test_page_deserialization() {
        let page: LogPage = serde_json::from_value(json!({
            "items": [{"event_time": "2024-01-01T00:00:00Z"}],
            "next_page_token": "abc"
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.continuation(), Some("abc"));

        let last: LogPage = serde_json::from_value(json!({"items": [], "next_page_token": null})).unwrap();
        assert_eq!(last.continuation(), None);

        let blank: LogPage = serde_json::from_value(json!({"next_page_token": ""})).unwrap();
        assert!(blank.items.is_empty());
        assert_eq!(blank.continuation(), None);
    }
}
