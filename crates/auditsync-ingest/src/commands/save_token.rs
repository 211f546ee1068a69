//! `auditsync save-token` command implementation
//!
//! First-time setup: exchanges a refresh token obtained out of band and
//! stores the resulting credential pair.

use crate::config::ConnectorConfig;
use crate::connector::Connector;
use crate::error::{IngestError, Result};
use colored::Colorize;

/// Exchange `refresh_token` and persist the pair
pub async fn run(config: ConnectorConfig, refresh_token: &str) -> Result<()> {
    let refresh_token = refresh_token.trim();
    if refresh_token.is_empty() {
        return Err(IngestError::config("Refresh token cannot be empty"));
    }

    let connector = Connector::open(config)?;
    connector.refresher().refresh(Some(refresh_token)).await?;

    println!("{} Credentials saved", "✓".green());
    println!(
        "  Store: {}",
        connector.config().credential_db_path().display()
    );

    Ok(())
}
