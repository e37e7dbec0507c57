//! JSONL writer for window snapshots - appends one JSON object per line

use super::writer_backend::{SnapshotRecord, SnapshotSink, SnapshotWriterError};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonlSnapshotWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
    backend: &'static str,
    written: u64,
}

impl JsonlSnapshotWriter {
    /// Append to `path`, creating the file if needed
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        log::info!("📝 Writing snapshots to: {}", path.display());
        Ok(Self::from_writer(Box::new(file), "JSONL"))
    }

    pub fn stdout() -> Self {
        log::info!("📝 Writing snapshots to stdout");
        Self::from_writer(Box::new(std::io::stdout()), "JSONL (stdout)")
    }

    fn from_writer(inner: Box<dyn Write + Send>, backend: &'static str) -> Self {
        Self {
            writer: BufWriter::new(inner),
            backend,
            written: 0,
        }
    }

    /// Serialize and flush one snapshot line
    ///
    /// Snapshots arrive once per emission tick, so each line is pushed through
    /// to the file immediately for tailing consumers.
    pub fn write_record(&mut self, record: &SnapshotRecord) -> Result<(), SnapshotWriterError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Snapshots written since creation
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Drop for JsonlSnapshotWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[async_trait]
impl SnapshotSink for JsonlSnapshotWriter {
    async fn write_snapshot(&mut self, record: &SnapshotRecord) -> Result<(), SnapshotWriterError> {
        self.write_record(record)
    }

    async fn flush(&mut self) -> Result<(), SnapshotWriterError> {
        JsonlSnapshotWriter::flush(self)?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn record(values: &[i64]) -> SnapshotRecord {
        let aggregate =
            Aggregate::from_values(values.iter().map(|v| Decimal::new(*v, 2))).unwrap();
        SnapshotRecord::new(
            aggregate,
            Utc.with_ymd_and_hms(2018, 6, 24, 6, 48, 25).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_writes_one_line_per_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshots.jsonl");

        let mut writer = JsonlSnapshotWriter::open(&path).unwrap();
        writer.write_snapshot(&record(&[1025, 240])).await.unwrap();
        writer.write_snapshot(&record(&[])).await.unwrap();
        SnapshotSink::flush(&mut writer).await.unwrap();
        assert_eq!(writer.written(), 2);
        assert_eq!(writer.backend_type(), "JSONL");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["count"], 2);
        assert_eq!(lines[1]["count"], 0);
        assert!(lines[1]["min"].is_null());
    }

    #[tokio::test]
    async fn test_snapshot_is_visible_before_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshots.jsonl");

        let mut writer = JsonlSnapshotWriter::open(&path).unwrap();
        writer.write_snapshot(&record(&[1025, 240])).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let line: serde_json::Value = serde_json::from_str(contents.trim_end()).unwrap();
        assert_eq!(line["count"], 2);

        drop(writer);
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshots.jsonl");

        {
            let mut writer = JsonlSnapshotWriter::open(&path).unwrap();
            writer.write_record(&record(&[100])).unwrap();
            // flushed on drop
        }
        {
            let mut writer = JsonlSnapshotWriter::open(&path).unwrap();
            writer.write_record(&record(&[200])).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("snapshots.jsonl");
        assert!(JsonlSnapshotWriter::open(&path).is_err());
    }
}
