//! Event emitter and sinks
//!
//! Maps a raw [`LogItem`] to the downstream wire event and writes it. Writes
//! are not acknowledged. The same record may be written again on a later
//! tick after a crash, so downstream indexing has to be idempotent on
//! (source, raw record).

use crate::error::{IngestError, Result};
use crate::fetcher::LogItem;
use async_trait::async_trait;
use auditsync_common::time::format_epoch_seconds;
use serde::{Deserialize, Serialize};
use serde_jsonlines::JsonLinesWriter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Category every audit-log event is tagged with
pub const AUDIT_LOG_CATEGORY: &str = "audit_log";

/// Event as handed to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkEvent {
    /// Source name the event was collected for
    pub source: String,

    /// Event time in epoch seconds with millisecond precision
    pub time: String,

    /// Raw record, serialized as JSON
    pub data: String,

    pub category: String,

    pub unbroken: bool,

    pub done: bool,
}

/// Downstream writer contract
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write_event(&self, event: &SinkEvent) -> Result<()>;
}

/// Writes one JSON object per line to stdout or a file
pub struct JsonLinesSink {
    writer: Mutex<JsonLinesWriter<Box<dyn Write + Send>>>,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(JsonLinesWriter::new(writer)),
        }
    }

    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Sink appending to `path`, creating it if needed
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(file)))
    }
}

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn write_event(&self, event: &SinkEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| IngestError::sink(format!("Failed to acquire writer lock: {}", e)))?;

        writer
            .write(event)
            .and_then(|_| writer.flush())
            .map_err(|e| IngestError::sink(format!("Failed to write event: {}", e)))
    }
}

/// Converts records into sink events
#[derive(Clone)]
pub struct EventEmitter {
    sink: std::sync::Arc<dyn EventSink>,
}

impl EventEmitter {
    pub fn new(sink: std::sync::Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Build the wire event for `item` without writing it
    pub fn to_event(source_name: &str, item: &LogItem) -> Result<SinkEvent> {
        let event_time = item.event_time()?;

        Ok(SinkEvent {
            source: source_name.to_string(),
            time: format_epoch_seconds(event_time),
            data: serde_json::to_string(item.raw())?,
            category: AUDIT_LOG_CATEGORY.to_string(),
            unbroken: true,
            done: true,
        })
    }

    /// Write `item` to the sink, tagged with `source_name`
    pub async fn emit(&self, source_name: &str, item: &LogItem) -> Result<()> {
        let event = Self::to_event(source_name, item)?;
        self.sink.write_event(&event).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_to_event_mapping() {
        let item = LogItem::new(json!({
            "event_time": "2024-01-01T00:00:00.123Z",
            "actor": "alice"
        }));

        let event = EventEmitter::to_event("workspace-a", &item).unwrap();
        assert_eq!(event.source, "workspace-a");
        assert_eq!(event.time, "1704067200.123");
        assert_eq!(event.category, AUDIT_LOG_CATEGORY);
        assert!(event.unbroken && event.done);

        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(&data, item.raw());
    }

    #[test]
    fn test_to_event_requires_event_time() {
        let item = LogItem::new(json!({"actor": "alice"}));
        assert!(EventEmitter::to_event("a", &item).is_err());
    }

    #[tokio::test]
    async fn test_jsonlines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("events.jsonl");

        let emitter = EventEmitter::new(Arc::new(JsonLinesSink::append_to(&path).unwrap()));
        for second in 0..3 {
            let item = LogItem::new(json!({"event_time": format!("2024-01-01T00:00:0{}Z", second)}));
            emitter.emit("a", &item).await.unwrap();
        }

        let events: Vec<SinkEvent> = serde_jsonlines::json_lines(&path)
            .unwrap()
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].time, "1704067202.000");
    }
}
