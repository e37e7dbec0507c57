//! Snapshot egress - serialized window aggregates, one JSON object per emission

pub mod jsonl_writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlSnapshotWriter;
pub use writer_backend::{SnapshotRecord, SnapshotSink, SnapshotWriterError};
