//! Writer backend trait for window snapshots
//!
//! Defines the interface for emitting aggregates to different destinations.

use crate::aggregate::Aggregate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One emitted snapshot: the aggregate fields plus the clock reading it was taken at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    #[serde(flatten)]
    pub aggregate: Aggregate,
    pub timestamp: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn new(aggregate: Aggregate, timestamp: DateTime<Utc>) -> Self {
        Self {
            aggregate,
            timestamp,
        }
    }
}

#[derive(Debug)]
pub enum SnapshotWriterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for SnapshotWriterError {
    fn from(err: std::io::Error) -> Self {
        SnapshotWriterError::Io(err)
    }
}

impl From<serde_json::Error> for SnapshotWriterError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotWriterError::Serialization(err)
    }
}

impl std::fmt::Display for SnapshotWriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotWriterError::Io(e) => write!(f, "IO error: {}", e),
            SnapshotWriterError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SnapshotWriterError {}

/// Backend trait for writing snapshots
#[async_trait]
pub trait SnapshotSink: Send {
    /// Write a single snapshot
    async fn write_snapshot(&mut self, record: &SnapshotRecord) -> Result<(), SnapshotWriterError>;

    /// Flush pending writes
    async fn flush(&mut self) -> Result<(), SnapshotWriterError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    #[test]
    fn test_record_flattens_aggregate_fields() {
        let aggregate =
            Aggregate::from_values([Decimal::new(1025, 2), Decimal::new(24, 1)]).unwrap();
        let at = Utc.with_ymd_and_hms(2018, 6, 24, 6, 48, 25).unwrap();

        let json = serde_json::to_value(SnapshotRecord::new(aggregate, at)).unwrap();

        assert_eq!(json["count"], 2);
        assert!(json.get("aggregate").is_none());
        assert!(json["avg"].is_number());
        assert_eq!(json["timestamp"], "2018-06-24T06:48:25Z");
    }
}
