//! Component wiring
//!
//! Builds the stores, HTTP clients and orchestrator from a
//! [`ConnectorConfig`]. Commands go through here so every entry point sees
//! the same on-disk state.

use crate::auth::TokenRefresher;
use crate::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::config::{ConnectorConfig, OutputTarget};
use crate::credentials::{Credentials, SqliteCredentialStore};
use crate::emitter::{EventEmitter, EventSink, JsonLinesSink};
use crate::error::{IngestError, Result};
use crate::fetcher::AuditLogClient;
use crate::orchestrator::{Orchestrator, SystemClock};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Opened stores plus the shared HTTP client
pub struct Connector {
    config: ConnectorConfig,
    client: Client,
    credentials: Credentials,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl Connector {
    /// Open both databases under the configured data directory
    pub fn open(config: ConnectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("auditsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::config(format!("Failed to build HTTP client: {}", e)))?;

        let credential_store = SqliteCredentialStore::open(config.credential_db_path())?;
        let checkpoint_store = SqliteCheckpointStore::open(config.checkpoint_db_path())?;

        debug!(data_dir = %config.data_dir.display(), "Opened connector state");

        Ok(Self {
            config,
            client,
            credentials: Credentials::new(Arc::new(credential_store)),
            checkpoints: Arc::new(checkpoint_store),
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn checkpoints(&self) -> Arc<dyn CheckpointStore> {
        Arc::clone(&self.checkpoints)
    }

    pub fn refresher(&self) -> TokenRefresher {
        TokenRefresher::new(
            self.client.clone(),
            self.config.token_url.clone(),
            self.credentials.clone(),
        )
    }

    /// Sink for the configured output target
    pub fn sink(&self) -> Result<Arc<dyn EventSink>> {
        let sink = match &self.config.output {
            OutputTarget::Stdout => JsonLinesSink::stdout(),
            OutputTarget::File(path) => JsonLinesSink::append_to(path)?,
        };
        Ok(Arc::new(sink))
    }

    /// Orchestrator against the live API, writing to the configured sink
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let fetcher = AuditLogClient::new(
            self.client.clone(),
            self.config.api_base_url.clone(),
            self.refresher(),
        );

        Ok(Orchestrator::new(
            Arc::new(fetcher),
            self.checkpoints(),
            EventEmitter::new(self.sink()?),
            Arc::new(SystemClock),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;

    fn config(dir: &std::path::Path) -> ConnectorConfig {
        let data_dir = dir.to_string_lossy().to_string();
        ConnectorConfig::from_lookup(move |key| match key {
            "AUDITSYNC_DATA_DIR" => Some(data_dir.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_databases() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Connector::open(config(&dir.path().join("state"))).unwrap();

        assert!(connector.config().checkpoint_db_path().exists());
        assert!(connector.config().credential_db_path().exists());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut checkpoint = Checkpoint::new("audit");
        checkpoint.last_event_time = Some(42);
        {
            let connector = Connector::open(config(dir.path())).unwrap();
            connector.checkpoints().upsert(&checkpoint).await.unwrap();
        }

        let connector = Connector::open(config(dir.path())).unwrap();
        assert_eq!(connector.checkpoints().get("audit").await.unwrap(), Some(checkpoint));
    }
}
