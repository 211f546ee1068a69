//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use auditsync_common::EpochMillis;
use auditsync_ingest::checkpoint::{Checkpoint, CheckpointStore, SqliteCheckpointStore};
use auditsync_ingest::config::Source;
use auditsync_ingest::emitter::{EventEmitter, EventSink, SinkEvent};
use auditsync_ingest::error::{IngestError, Result};
use auditsync_ingest::fetcher::{LogFetcher, LogItem, LogPage, TimeWindow};
use auditsync_ingest::orchestrator::{Clock, Orchestrator};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-01-01T00:00:00Z
pub const T0: EpochMillis = 1_704_067_200_000;

pub const MINUTE: EpochMillis = 60_000;

pub fn source(name: &str, start_time: EpochMillis) -> Source {
    Source {
        name: name.to_string(),
        start_time,
        poll_interval: Duration::from_secs(60),
    }
}

/// Record with a fractional-second `event_time` and a stable id
pub fn record(id: u64, at: EpochMillis) -> LogItem {
    let time = DateTime::<Utc>::from_timestamp_millis(at)
        .unwrap()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    LogItem::new(json!({ "id": id, "event_time": time, "action": "member.login" }))
}

/// In-memory audit-log API
///
/// Returns the records inside the requested window newest first. The
/// continuation token is the offset of the next page.
pub struct FakeAuditApi {
    records: Mutex<Vec<(EpochMillis, LogItem)>>,
    page_size: usize,
    calls: Mutex<Vec<(TimeWindow, Option<String>)>>,
    fail_on_call: Mutex<Option<usize>>,
    stuck_empty: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeAuditApi {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            page_size,
            calls: Mutex::new(Vec::new()),
            fail_on_call: Mutex::new(None),
            stuck_empty: AtomicBool::new(false),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Add a record at `at`, returning its id
    pub fn push(&self, at: EpochMillis) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        self.push_item(at, record(id, at));
        id
    }

    pub fn push_item(&self, at: EpochMillis, item: LogItem) {
        self.records.lock().unwrap().push((at, item));
    }

    /// Fail the `n`th fetch (1-based) with a 503
    pub fn fail_on_call(&self, n: usize) {
        *self.fail_on_call.lock().unwrap() = Some(self.call_count() + n);
    }

    /// Answer every request with an empty page that still has a token
    pub fn stuck_empty(&self, stuck: bool) {
        self.stuck_empty.store(stuck, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn windows(&self) -> Vec<TimeWindow> {
        self.calls.lock().unwrap().iter().map(|(w, _)| *w).collect()
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl LogFetcher for FakeAuditApi {
    async fn fetch(&self, window: TimeWindow, page_token: Option<&str>) -> Result<LogPage> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((window, page_token.map(str::to_string)));
            calls.len()
        };

        if *self.fail_on_call.lock().unwrap() == Some(call) {
            return Err(IngestError::Fetch {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        if self.stuck_empty.load(Ordering::SeqCst) {
            return Ok(LogPage {
                items: Vec::new(),
                next_page_token: Some("again".to_string()),
            });
        }

        let mut matching: Vec<(EpochMillis, LogItem)> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(at, _)| *at >= window.start && *at <= window.end)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));

        let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (offset + self.page_size).min(matching.len());
        let items = matching[offset.min(end)..end]
            .iter()
            .map(|(_, item)| item.clone())
            .collect();

        Ok(LogPage {
            items,
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

/// Keeps every event it is given
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Record ids in emission order
    pub fn ids(&self) -> Vec<u64> {
        self.events()
            .iter()
            .map(|event| {
                let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                data["id"].as_u64().unwrap()
            })
            .collect()
    }

    pub fn unique_ids(&self) -> BTreeSet<u64> {
        self.ids().into_iter().collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn write_event(&self, event: &SinkEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Clock moved by hand
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(at: EpochMillis) -> Self {
        Self(AtomicI64::new(at))
    }

    pub fn set(&self, at: EpochMillis) {
        self.0.store(at, Ordering::SeqCst);
    }

    pub fn advance(&self, by: EpochMillis) {
        self.0.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.0.load(Ordering::SeqCst)
    }
}

/// SQLite store that records every write and can be told to fail
pub struct FlakyCheckpointStore {
    inner: SqliteCheckpointStore,
    writes: Mutex<Vec<Checkpoint>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyCheckpointStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteCheckpointStore::open_in_memory().unwrap(),
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Checkpoint> {
        self.writes.lock().unwrap().clone()
    }

    pub async fn stored(&self, key: &str) -> Option<Checkpoint> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(IngestError::checkpoint_store("disk unavailable"));
        }
        self.inner.get(key).await
    }

    async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IngestError::checkpoint_store("disk full"));
        }
        self.writes.lock().unwrap().push(checkpoint.clone());
        self.inner.upsert(checkpoint).await
    }
}

/// Orchestrator wired to fakes
pub struct Harness {
    pub api: Arc<FakeAuditApi>,
    pub store: Arc<FlakyCheckpointStore>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(page_size: usize, now: EpochMillis) -> Self {
        let api = Arc::new(FakeAuditApi::new(page_size));
        let store = Arc::new(FlakyCheckpointStore::new());
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(ManualClock::new(now));

        let orchestrator = Orchestrator::new(
            api.clone(),
            store.clone(),
            EventEmitter::new(sink.clone()),
            clock.clone(),
        );

        Self {
            api,
            store,
            sink,
            clock,
            orchestrator,
        }
    }
}
