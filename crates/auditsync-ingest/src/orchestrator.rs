//! Ingestion orchestrator
//!
//! Drives one tick for one source. A source is in exactly one of two
//! phases, read from its checkpoint:
//!
//! - **Backfilling**: walk backward from "now" to the configured start time.
//!   The window ceiling is fixed when the tick starts and every page is
//!   checkpointed, so a crash loses at most one page of progress.
//! - **Catching up**: walk forward from the last flushed boundary to "now"
//!   and then move the boundary to "now".
//!
//! The transition happens once, when the backward walk reaches the floor,
//! as a single checkpoint write that sets both boundaries. The catch-up
//! boundary is the "now" of the first backfill tick, persisted alongside
//! progress, so events that arrive while a backfill is being resumed are
//! picked up by the first catch-up tick.
//!
//! Records without a usable event time are logged and skipped.
//!
//! "Now" is always the tick's start time minus [`SAFETY_MARGIN_MS`] so events
//! the upstream is still indexing are picked up by a later tick.

use crate::checkpoint::{Checkpoint, CheckpointStore, Phase};
use crate::config::Source;
use crate::emitter::EventEmitter;
use crate::error::{IngestError, Result};
use crate::fetcher::{LogFetcher, LogPage, TimeWindow};
use auditsync_common::{time::format_rfc3339, EpochMillis};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Distance kept between "now" and the newest event time requested
pub const SAFETY_MARGIN_MS: EpochMillis = 10_000;

/// Consecutive empty pages that still carry a continuation token before the
/// walk is treated as exhausted
pub const MAX_EMPTY_PAGES: u32 = 5;

/// Time source for the orchestrator
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> EpochMillis;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        auditsync_common::time::now_millis()
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Start time lies in the future
    NotStarted,
    Backfill,
    CatchUp,
}

/// Summary of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub kind: TickKind,
    pub pages: usize,
    pub events: usize,
    /// Records dropped because their event time could not be read
    pub skipped: usize,
    /// Set when this tick moved the source from backfilling to catching up
    pub backfill_completed: bool,
}

impl TickReport {
    fn new(kind: TickKind) -> Self {
        Self {
            kind,
            pages: 0,
            events: 0,
            skipped: 0,
            backfill_completed: false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PageStep {
    Next,
    Exhausted,
}

/// Continuation-token bookkeeping for one walk
#[derive(Debug, Default)]
struct Pager {
    token: Option<String>,
    empty_pages: u32,
}

impl Pager {
    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn advance(&mut self, page: &LogPage) -> PageStep {
        let Some(next) = page.continuation() else {
            return PageStep::Exhausted;
        };

        if page.items.is_empty() {
            self.empty_pages += 1;
            if self.empty_pages >= MAX_EMPTY_PAGES {
                warn!(
                    empty_pages = self.empty_pages,
                    "Too many consecutive empty pages, treating walk as exhausted"
                );
                return PageStep::Exhausted;
            }
        } else {
            self.empty_pages = 0;
        }

        self.token = Some(next.to_string());
        PageStep::Next
    }
}

/// Per-source ingestion engine
pub struct Orchestrator {
    fetcher: Arc<dyn LogFetcher>,
    checkpoints: Arc<dyn CheckpointStore>,
    emitter: EventEmitter,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn LogFetcher>,
        checkpoints: Arc<dyn CheckpointStore>,
        emitter: EventEmitter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            checkpoints,
            emitter,
            clock,
        }
    }

    /// Scheduler entry point: run one tick and swallow its failure
    ///
    /// Errors are logged with full context and dropped; the next scheduled
    /// tick resumes from the persisted checkpoint.
    #[instrument(skip(self, source), fields(source = %source.name))]
    pub async fn tick(&self, source: &Source) -> Option<TickReport> {
        match self.run_tick(source).await {
            Ok(report) => {
                info!(
                    kind = ?report.kind,
                    pages = report.pages,
                    events = report.events,
                    skipped = report.skipped,
                    backfill_completed = report.backfill_completed,
                    "Tick complete"
                );
                Some(report)
            },
            Err(e) => {
                error!(error = %e, "Tick failed, will retry from last checkpoint");
                None
            },
        }
    }

    /// Run one tick, returning the first error encountered
    pub async fn run_tick(&self, source: &Source) -> Result<TickReport> {
        let now = self.clock.now_millis() - SAFETY_MARGIN_MS;

        if source.start_time > now {
            debug!(start_time = %format_rfc3339(source.start_time), "Start time not reached yet");
            return Ok(TickReport::new(TickKind::NotStarted));
        }

        let mut checkpoint = self.load_checkpoint(&source.name).await;

        match checkpoint.phase() {
            Phase::Backfilling { first_event_time } => {
                self.backfill(source, &mut checkpoint, first_event_time, now)
                    .await
            },
            Phase::CatchingUp { last_event_time } => {
                self.catch_up(source, &mut checkpoint, last_event_time, now)
                    .await
            },
        }
    }

    /// A failed read is treated as "no checkpoint yet"
    async fn load_checkpoint(&self, key: &str) -> Checkpoint {
        match self.checkpoints.get(key).await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                info!("No checkpoint found, starting from scratch");
                Checkpoint::new(key)
            },
            Err(e) => {
                warn!(error = %e, "Checkpoint lookup failed, starting from scratch");
                Checkpoint::new(key)
            },
        }
    }

    async fn backfill(
        &self,
        source: &Source,
        checkpoint: &mut Checkpoint,
        first_event_time: Option<EpochMillis>,
        now: EpochMillis,
    ) -> Result<TickReport> {
        let floor = source.start_time;
        // Without a stored ceiling, the progress boundary stands in for it
        let backfill_ceiling = checkpoint
            .backfill_ceiling
            .or(first_event_time)
            .unwrap_or(now);
        let ceiling = first_event_time.unwrap_or(backfill_ceiling);
        let window = TimeWindow::new(floor, ceiling);

        debug!(
            window_start = %format_rfc3339(floor),
            window_end = %format_rfc3339(ceiling),
            backfill_ceiling = %format_rfc3339(backfill_ceiling),
            "Backfilling"
        );

        checkpoint.backfill_ceiling = Some(backfill_ceiling);

        let mut report = TickReport::new(TickKind::Backfill);
        let mut pager = Pager::default();
        let mut cursor = ceiling;

        while cursor > floor {
            let page = self.fetcher.fetch(window, pager.token()).await?;
            report.pages += 1;
            self.emit_page(source, &page, &mut report).await?;

            match pager.advance(&page) {
                PageStep::Next => {
                    if let Some(oldest) = oldest_event_time(&page) {
                        cursor = cursor.min(oldest);
                    }
                },
                PageStep::Exhausted => cursor = floor,
            }

            if cursor > floor {
                checkpoint.first_event_time = Some(cursor);
                self.checkpoints.upsert(checkpoint).await?;
                debug!(first_event_time = %format_rfc3339(cursor), "Backfill progress saved");
            }
        }

        checkpoint.first_event_time = Some(floor);
        checkpoint.last_event_time = Some(backfill_ceiling);
        self.checkpoints.upsert(checkpoint).await?;
        report.backfill_completed = true;

        info!(
            last_event_time = %format_rfc3339(backfill_ceiling),
            "Backfill complete, switching to catch-up"
        );

        Ok(report)
    }

    async fn catch_up(
        &self,
        source: &Source,
        checkpoint: &mut Checkpoint,
        last_event_time: EpochMillis,
        now: EpochMillis,
    ) -> Result<TickReport> {
        let mut report = TickReport::new(TickKind::CatchUp);

        if now <= last_event_time {
            warn!(
                last_event_time = %format_rfc3339(last_event_time),
                now = %format_rfc3339(now),
                "Clock is behind the last checkpoint, skipping catch-up"
            );
            return Ok(report);
        }

        let window = TimeWindow::new(last_event_time + 1, now);
        debug!(
            window_start = %format_rfc3339(window.start),
            window_end = %format_rfc3339(window.end),
            "Catching up"
        );

        let mut pager = Pager::default();
        loop {
            let page = self.fetcher.fetch(window, pager.token()).await?;
            report.pages += 1;
            self.emit_page(source, &page, &mut report).await?;

            if pager.advance(&page) == PageStep::Exhausted {
                break;
            }
        }

        checkpoint.last_event_time = Some(now);
        self.checkpoints.upsert(checkpoint).await?;

        Ok(report)
    }

    async fn emit_page(
        &self,
        source: &Source,
        page: &LogPage,
        report: &mut TickReport,
    ) -> Result<()> {
        for item in &page.items {
            match self.emitter.emit(&source.name, item).await {
                Ok(()) => report.events += 1,
                Err(IngestError::InvalidRecord(reason)) => {
                    warn!(%reason, record = %item.raw(), "Skipping malformed record");
                    report.skipped += 1;
                },
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Oldest readable event time on a newest-first page
fn oldest_event_time(page: &LogPage) -> Option<EpochMillis> {
    page.items
        .iter()
        .rev()
        .find_map(|item| item.event_time().ok())
}
