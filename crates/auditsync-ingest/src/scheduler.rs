//! Tick scheduler
//!
//! One task per source, each driven by its own interval. A tick that runs
//! longer than the interval delays the next one instead of overlapping it.

use crate::config::Source;
use crate::orchestrator::{Orchestrator, TickReport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drives periodic ticks for a set of sources
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    sources: Vec<Source>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, sources: Vec<Source>) -> Self {
        Self {
            orchestrator,
            sources,
        }
    }

    /// Run a single tick for every source, one after the other
    pub async fn run_once(&self) -> Vec<(String, Option<TickReport>)> {
        let mut reports = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let report = self.orchestrator.tick(source).await;
            reports.push((source.name.clone(), report));
        }
        reports
    }

    /// Poll every source until `shutdown` is cancelled
    ///
    /// An in-flight tick is allowed to finish before its task exits.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(sources = self.sources.len(), "Starting scheduler");

        let mut tasks = JoinSet::new();
        for source in self.sources {
            let orchestrator = Arc::clone(&self.orchestrator);
            let shutdown = shutdown.clone();
            tasks.spawn(poll_source(orchestrator, source, shutdown));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Source task terminated abnormally");
            }
        }

        info!("Scheduler stopped");
    }
}

async fn poll_source(orchestrator: Arc<Orchestrator>, source: Source, shutdown: CancellationToken) {
    let mut ticker = interval(source.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        source = %source.name,
        interval_secs = source.poll_interval.as_secs(),
        "Polling source"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                orchestrator.tick(&source).await;
            }
        }
    }

    info!(source = %source.name, "Stopped polling source");
}
