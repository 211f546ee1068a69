//! `auditsync run` command implementation
//!
//! Events go to stdout by default, so anything meant for a human is written
//! to stderr.

use crate::config::{ConnectorConfig, SourcesFile};
use crate::connector::Connector;
use crate::error::{IngestError, Result};
use crate::scheduler::Scheduler;
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Poll all configured sources, or tick each once when `once` is set
pub async fn run(config: ConnectorConfig, once: bool) -> Result<()> {
    let sources = SourcesFile::load(&config.sources_file)?.resolve()?;
    let connector = Connector::open(config)?;
    let scheduler = Scheduler::new(Arc::new(connector.orchestrator()?), sources);

    if once {
        return run_once(&scheduler).await;
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested, finishing in-flight ticks"),
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.cancel();
    });

    scheduler.run(shutdown).await;
    Ok(())
}

async fn run_once(scheduler: &Scheduler) -> Result<()> {
    let reports = scheduler.run_once().await;

    let mut failed = 0;
    for (name, report) in &reports {
        match report {
            Some(report) => eprintln!(
                "{} {:<24} {:?}: {} page(s), {} event(s){}{}",
                "✓".green(),
                name,
                report.kind,
                report.pages,
                report.events,
                if report.skipped > 0 {
                    format!(", {} malformed skipped", report.skipped)
                } else {
                    String::new()
                },
                if report.backfill_completed {
                    ", backfill complete"
                } else {
                    ""
                }
            ),
            None => {
                failed += 1;
                eprintln!("{} {:<24} failed", "✗".red(), name);
            },
        }
    }

    if failed > 0 {
        return Err(IngestError::TicksFailed(failed));
    }

    Ok(())
}
