//! End-to-end flow: JSONL file -> reader task -> ingestion loop -> JSONL snapshots
//!
//! Mirrors what the window_runtime binary wires together, with a manual clock
//! so the expected aggregate is deterministic.

#[cfg(test)]
mod runtime_pipeline_tests {
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::sync::mpsc;
    use tokio::time::Duration;
    use windowstat::clock::{Clock, ManualClock};
    use windowstat::ingestion::{start_ingestion, IngestMessage};
    use windowstat::snapshot_writer::JsonlSnapshotWriter;
    use windowstat::source::{forward_lines, open_input};
    use windowstat::{WindowAggregator, WindowConfig};

    #[tokio::test]
    async fn test_file_to_snapshot_roundtrip() {
        let now = Utc.with_ymd_and_hms(2018, 6, 24, 6, 48, 25).unwrap();
        let now_ms = now.timestamp_millis();

        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, r#"{{"amount": 10.25, "timestamp": {}}}"#, now_ms - 200).unwrap();
        writeln!(input, r#"{{"amount": "2.40", "timestamp": "2018-06-24T06:48:24.500Z"}}"#).unwrap();
        writeln!(input).unwrap();
        writeln!(input, r#"{{"amount": 99, "timestamp": {}}}"#, now_ms - 61_000).unwrap();
        writeln!(input, r#"{{"amount": 99, "timestamp": {}}}"#, now_ms + 5_000).unwrap();
        writeln!(input, "garbage").unwrap();
        input.flush().unwrap();

        let out_dir = TempDir::new().unwrap();
        let out_path = out_dir.path().join("snapshots.jsonl");

        let config = WindowConfig::new(
            std::time::Duration::from_millis(100),
            std::time::Duration::from_secs(60),
        )
        .unwrap();
        let aggregator = Arc::new(WindowAggregator::new(config).unwrap());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
        let sink = Box::new(JsonlSnapshotWriter::open(&out_path).unwrap());

        let (tx, rx) = mpsc::channel::<IngestMessage>(4);
        let ingestion = tokio::spawn(start_ingestion(
            rx,
            aggregator.clone(),
            clock,
            sink,
            Duration::from_secs(3600),
        ));

        let reader = open_input(Some(input.path())).await.unwrap();
        let forwarded = forward_lines(reader, tx).await.unwrap();
        assert_eq!(forwarded, 5);

        let stats = ingestion.await.unwrap().unwrap();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.snapshots, 1);

        let contents = std::fs::read_to_string(&out_path).unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(contents.lines().last().unwrap()).unwrap();

        assert_eq!(snapshot["count"], 2);
        assert_eq!(snapshot["timestamp"], "2018-06-24T06:48:25Z");
        assert!((snapshot["sum"].as_f64().unwrap() - 12.65).abs() < 1e-9);
        assert!((snapshot["avg"].as_f64().unwrap() - 6.33).abs() < 1e-9);
        assert!((snapshot["min"].as_f64().unwrap() - 2.4).abs() < 1e-9);
        assert!((snapshot["max"].as_f64().unwrap() - 10.25).abs() < 1e-9);
    }
}
