//! Token refresh protocol
//!
//! Exchanges a refresh credential for a fresh (access, refresh) pair and
//! rotates whichever of the two actually changed. Rotation goes through
//! [`CredentialStore::replace`], so every holder of a [`Credentials`] handle
//! sees the new values on its next read.
//!
//! Concurrent refreshes from several sources are tolerated: the exchange
//! endpoint hands out a valid pair on every call and the last rotation wins.

use crate::credentials::{
    CredentialStore, Credentials, ACCESS_TOKEN_REALM, REFRESH_TOKEN_REALM, WILDCARD_IDENTITY,
};
use crate::error::{IngestError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Credential pair returned by the exchange endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Client for the token exchange endpoint
#[derive(Clone)]
pub struct TokenRefresher {
    client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl TokenRefresher {
    pub fn new(client: Client, endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    /// Credentials this refresher rotates
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Exchange a refresh credential and persist the result
    ///
    /// `explicit_refresh_token` is only supplied during first-time setup;
    /// otherwise the currently stored refresh token is used. A non-2xx
    /// answer is returned as [`IngestError::AuthExchange`] and never retried.
    #[instrument(skip_all, fields(explicit = explicit_refresh_token.is_some()))]
    pub async fn refresh(&self, explicit_refresh_token: Option<&str>) -> Result<TokenPair> {
        info!("Refreshing access token");

        let refresh_token = match explicit_refresh_token {
            Some(token) => token.to_string(),
            None => self
                .credentials
                .refresh_token()
                .await?
                .ok_or(IngestError::MissingCredential("refresh token"))?,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_message(&body);
            warn!(status = status.as_u16(), message = %message, "Token exchange rejected");
            return Err(IngestError::AuthExchange {
                status: status.as_u16(),
                message,
            });
        }

        let pair: TokenPair = response.json().await?;

        let access_rotated = self.rotate(ACCESS_TOKEN_REALM, &pair.access_token).await?;
        let refresh_rotated = self.rotate(REFRESH_TOKEN_REALM, &pair.refresh_token).await?;

        info!(access_rotated, refresh_rotated, "Token refresh complete");
        Ok(pair)
    }

    /// Replace the stored secret for `realm` unless it already holds `value`
    async fn rotate(&self, realm: &str, value: &str) -> Result<bool> {
        let store = self.credentials.store();

        let current = store.lookup(realm, WILDCARD_IDENTITY).await?;
        if current.as_deref() == Some(value) {
            debug!(realm, "Credential unchanged, skipping rotation");
            return Ok(false);
        }

        store.replace(value, WILDCARD_IDENTITY, realm).await?;
        Ok(true)
    }
}

/// Pull `message` out of a JSON error body, falling back to the raw text
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_prefers_json_field() {
        assert_eq!(upstream_message(r#"{"message":"invalid_grant"}"#), "invalid_grant");
        assert_eq!(upstream_message("  bad gateway \n"), "bad gateway");
        assert_eq!(upstream_message(r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }
}
