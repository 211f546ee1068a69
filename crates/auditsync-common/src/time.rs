//! UTC timestamp handling
//!
//! The audit-log API reports `event_time` either with or without fractional
//! seconds, always in UTC with a trailing `Z`. Operators configure start
//! times as `YYYY-MM-DD HH:MM:SS`, also UTC. Internally everything is
//! carried as milliseconds since the Unix epoch.

use crate::error::{Result, SyncError};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Milliseconds since the Unix epoch, UTC
pub type EpochMillis = i64;

const EVENT_TIME_FRACTIONAL: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const EVENT_TIME_WHOLE: &str = "%Y-%m-%dT%H:%M:%SZ";
const START_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an API `event_time` value into epoch milliseconds
pub fn parse_event_time(value: &str) -> Result<EpochMillis> {
    NaiveDateTime::parse_from_str(value, EVENT_TIME_FRACTIONAL)
        .or_else(|_| NaiveDateTime::parse_from_str(value, EVENT_TIME_WHOLE))
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| SyncError::InvalidTimestamp {
            value: value.to_string(),
            expected: "YYYY-MM-DDTHH:MM:SS[.fff]Z",
        })
}

/// Parse an operator supplied start time (`YYYY-MM-DD HH:MM:SS`, UTC)
pub fn parse_start_time(value: &str) -> Result<EpochMillis> {
    NaiveDateTime::parse_from_str(value.trim(), START_TIME)
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| SyncError::InvalidTimestamp {
            value: value.to_string(),
            expected: "YYYY-MM-DD HH:MM:SS",
        })
}

/// Render epoch milliseconds as seconds with millisecond precision ("1704067200.123")
pub fn format_epoch_seconds(millis: EpochMillis) -> String {
    let seconds = millis.div_euclid(1000);
    let fraction = millis.rem_euclid(1000);
    format!("{}.{:03}", seconds, fraction)
}

/// Render epoch milliseconds as RFC 3339, or the raw number if out of range
pub fn format_rfc3339(millis: EpochMillis) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> EpochMillis {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fractional_and_whole_seconds() {
        let whole = parse_event_time("2024-01-01T00:00:00Z").unwrap();
        let fractional = parse_event_time("2024-01-01T00:00:00.123Z").unwrap();

        assert_eq!(whole, 1_704_067_200_000);
        assert_eq!(fractional - whole, 123);
    }

    #[test]
    fn test_microsecond_fraction_truncates_to_millis() {
        let millis = parse_event_time("2024-01-01T00:00:00.123456Z").unwrap();
        assert_eq!(millis, 1_704_067_200_123);
    }

    #[test]
    fn test_rejects_offsets_and_garbage() {
        assert!(parse_event_time("2024-01-01T00:00:00+09:00").is_err());
        assert!(parse_event_time("2024-01-01 00:00:00").is_err());
        assert!(parse_event_time("").is_err());
    }

    #[test]
    fn test_start_time() {
        assert_eq!(parse_start_time("2024-01-01 00:00:00").unwrap(), 1_704_067_200_000);
        assert_eq!(parse_start_time(" 2024-01-01 00:00:01 ").unwrap(), 1_704_067_201_000);

        let err = parse_start_time("2024/01/01").unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD HH:MM:SS"));
    }

    #[test]
    fn test_format_epoch_seconds() {
        assert_eq!(format_epoch_seconds(1_704_067_200_123), "1704067200.123");
        assert_eq!(format_epoch_seconds(1_704_067_200_005), "1704067200.005");
        assert_eq!(format_epoch_seconds(0), "0.000");
    }

    #[test]
    fn test_format_rfc3339() {
        assert_eq!(format_rfc3339(1_704_067_200_000), "2024-01-01T00:00:00+00:00");
    }

    proptest! {
        #[test]
        fn prop_event_time_preserves_millis(millis in 0i64..4_102_444_800_000) {
            let dt = DateTime::<Utc>::from_timestamp_millis(millis).unwrap();
            let with_fraction = dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            let without_fraction = dt.format("%Y-%m-%dT%H:%M:%SZ").to_string();

            prop_assert_eq!(parse_event_time(&with_fraction).unwrap(), millis);
            prop_assert_eq!(parse_event_time(&without_fraction).unwrap(), millis - millis % 1000);
        }
    }
}
