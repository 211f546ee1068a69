//! auditsync common library
//!
//! Shared pieces used by every auditsync workspace member:
//!
//! - **Error Handling**: [`SyncError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Time**: the UTC timestamp formats spoken by the audit-log API
//!
//! # Example
//!
//! ```
//! use auditsync_common::time::parse_event_time;
//!
//! let millis = parse_event_time("2024-01-01T00:00:00.123Z").unwrap();
//! assert_eq!(millis % 1000, 123);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod time;

pub use error::{Result, SyncError};
pub use time::EpochMillis;
