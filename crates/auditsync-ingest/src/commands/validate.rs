//! `auditsync validate` command implementation
//!
//! Applies the creation-time rules to the sources file and reports whether
//! credentials have been saved. Never contacts the API.

use crate::config::{ConnectorConfig, SourcesFile};
use crate::connector::Connector;
use crate::credentials::Credentials;
use crate::error::Result;
use auditsync_common::time::{format_rfc3339, now_millis};
use colored::Colorize;

pub async fn run(config: ConnectorConfig) -> Result<()> {
    let sources = SourcesFile::load(&config.sources_file)?.validate_for_creation(now_millis())?;

    println!(
        "{} {}",
        "Sources:".cyan().bold(),
        config.sources_file.display()
    );
    println!();
    for source in &sources {
        println!("{}", source.name.green());
        println!("  Start:    {}", format_rfc3339(source.start_time));
        println!("  Interval: {}s", source.poll_interval.as_secs());
    }
    println!();

    let connector = Connector::open(config)?;
    report_credentials(connector.refresher().credentials()).await?;

    Ok(())
}

async fn report_credentials(credentials: &Credentials) -> Result<()> {
    if credentials.refresh_token().await?.is_some() {
        println!("{} Credentials present", "✓".green());
    } else {
        println!(
            "{} No credentials stored, run 'auditsync save-token' before 'auditsync run'",
            "!".yellow()
        );
    }
    Ok(())
}
