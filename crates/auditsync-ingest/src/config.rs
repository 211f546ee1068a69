//! Connector and source configuration
//!
//! Connector settings come from the environment (a `.env` file is honoured).
//! Sources are declared in a TOML file:
//!
//! ```toml
//! [[sources]]
//! name = "workspace-audit"
//! start_time = "2024-01-01 00:00:00"   # UTC
//! interval_secs = 60
//! ```

use crate::error::{IngestError, Result};
use auditsync_common::{time::parse_start_time, EpochMillis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default base URL of the audit-log API.
pub const DEFAULT_API_BASE_URL: &str = "https://openapi.swit.io/v1/api";

/// Default token exchange endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://splunk.switstore.io/refresh";

/// Default sources file, relative to the working directory.
pub const DEFAULT_SOURCES_FILE: &str = "sources.toml";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Default poll interval when a source does not set one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Shortest poll interval a source may use.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Oldest start time accepted when a source is created (one year).
pub const MAX_START_TIME_AGE_MS: EpochMillis = 1000 * 60 * 60 * 24 * 365;

const CHECKPOINT_DB: &str = "checkpoints.db";
const CREDENTIAL_DB: &str = "credentials.db";

/// Where emitted events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "-" => OutputTarget::Stdout,
            path => OutputTarget::File(PathBuf::from(path)),
        }
    }
}

/// Connector-wide settings
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base URL of the audit-log API
    pub api_base_url: String,

    /// Token exchange endpoint
    pub token_url: String,

    /// Directory holding the checkpoint and credential databases
    pub data_dir: PathBuf,

    /// TOML file declaring the sources
    pub sources_file: PathBuf,

    /// Event output
    pub output: OutputTarget,

    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl ConnectorConfig {
    /// Load from environment variables (after reading `.env`, if present)
    ///
    /// - `AUDITSYNC_API_BASE_URL`
    /// - `AUDITSYNC_TOKEN_URL`
    /// - `AUDITSYNC_DATA_DIR`
    /// - `AUDITSYNC_SOURCES_FILE`
    /// - `AUDITSYNC_OUTPUT` (`-` for stdout, otherwise a file path)
    /// - `AUDITSYNC_HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, applying defaults for missing keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("AUDITSYNC_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| IngestError::config("Could not determine data directory"))?
                .join("auditsync"),
        };

        let http_timeout_secs = match lookup("AUDITSYNC_HTTP_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().map_err(|_| {
                IngestError::config(format!(
                    "AUDITSYNC_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    value
                ))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let config = Self {
            api_base_url: lookup("AUDITSYNC_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            token_url: lookup("AUDITSYNC_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            data_dir,
            sources_file: lookup("AUDITSYNC_SOURCES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCES_FILE)),
            output: lookup("AUDITSYNC_OUTPUT")
                .map(|value| OutputTarget::parse(&value))
                .unwrap_or(OutputTarget::Stdout),
            http_timeout_secs,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(IngestError::config("API base URL cannot be empty"));
        }

        if self.token_url.trim().is_empty() {
            return Err(IngestError::config("Token URL cannot be empty"));
        }

        if self.http_timeout_secs == 0 {
            return Err(IngestError::config("HTTP timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn checkpoint_db_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_DB)
    }

    pub fn credential_db_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIAL_DB)
    }
}

/// An independently checkpointed ingestion target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Unique name, also the checkpoint key
    pub name: String,

    /// Configured floor of the backfill walk, epoch milliseconds
    pub start_time: EpochMillis,

    pub poll_interval: Duration,
}

/// A source as written in the sources file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,

    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub start_time: String,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl SourceDefinition {
    /// Check the rules that always apply and resolve into a [`Source`]
    pub fn resolve(&self) -> Result<Source> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(IngestError::config("Source name cannot be empty"));
        }

        let start_time = parse_start_time(&self.start_time).map_err(|e| {
            IngestError::config(format!(
                "Source '{}': the start time should be in the format YYYY-MM-DD HH:MM:SS ({})",
                name, e
            ))
        })?;

        if self.interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(IngestError::config(format!(
                "Source '{}': the interval cannot be shorter than {} seconds",
                name, MIN_POLL_INTERVAL_SECS
            )));
        }

        Ok(Source {
            name: name.to_string(),
            start_time,
            poll_interval: Duration::from_secs(self.interval_secs),
        })
    }

    /// Rules applied when a source is first created, on top of [`Self::resolve`]
    pub fn validate_for_creation(&self, now: EpochMillis) -> Result<Source> {
        let source = self.resolve()?;

        if now - source.start_time > MAX_START_TIME_AGE_MS {
            return Err(IngestError::config(format!(
                "Source '{}': the start time should not be more than a year ago",
                source.name
            )));
        }

        Ok(source)
    }
}

/// Contents of the sources file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
}

impl SourcesFile {
    /// Read and parse a sources file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("Failed to read sources file {}: {}", path.display(), e))
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| IngestError::config(format!("Invalid sources file: {}", e)))
    }

    /// Resolve every source, rejecting duplicates and invalid entries
    pub fn resolve(&self) -> Result<Vec<Source>> {
        self.resolve_with(SourceDefinition::resolve)
    }

    /// Resolve every source under the creation-time rules
    pub fn validate_for_creation(&self, now: EpochMillis) -> Result<Vec<Source>> {
        self.resolve_with(|definition| definition.validate_for_creation(now))
    }

    fn resolve_with(
        &self,
        resolve: impl Fn(&SourceDefinition) -> Result<Source>,
    ) -> Result<Vec<Source>> {
        if self.sources.is_empty() {
            return Err(IngestError::config("No sources configured"));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(self.sources.len());

        for definition in &self.sources {
            let source = resolve(definition)?;
            if !seen.insert(source.name.clone()) {
                return Err(IngestError::config(format!(
                    "Source '{}' is declared more than once",
                    source.name
                )));
            }
            sources.push(source);
        }

        Ok(sources)
    }
}
