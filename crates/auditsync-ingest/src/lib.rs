//! auditsync ingestion library
//!
//! Incrementally pulls audit-log records from a paginated HTTP API and hands
//! each one to a downstream sink.
//!
//! # Overview
//!
//! - **Checkpoints**: per-source progress in SQLite ([`checkpoint`])
//! - **Credentials**: access/refresh pair with rotation ([`credentials`], [`auth`])
//! - **Fetching**: bounded page requests with one refresh on 401 ([`fetcher`])
//! - **Orchestration**: backfill then catch-up, one tick at a time ([`orchestrator`])
//! - **Scheduling**: one interval-driven task per source ([`scheduler`])
//!
//! # Example
//!
//! ```no_run
//! use auditsync_ingest::config::{ConnectorConfig, SourcesFile};
//! use auditsync_ingest::connector::Connector;
//!
//! #[tokio::main]
//! async fn main() -> auditsync_ingest::Result<()> {
//!     let config = ConnectorConfig::from_env()?;
//!     let sources = SourcesFile::load(&config.sources_file)?.resolve()?;
//!     let orchestrator = Connector::open(config)?.orchestrator()?;
//!
//!     for source in &sources {
//!         orchestrator.run_tick(source).await?;
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod auth;
pub mod checkpoint;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod emitter;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod scheduler;

// Re-export commonly used types
pub use cli::{CheckpointCommand, Cli, Commands};
pub use error::{IngestError, Result};
pub use orchestrator::{Orchestrator, TickKind, TickReport};
