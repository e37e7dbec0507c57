//! Sliding-window statistics over a stream of timestamped decimal observations
//!
//! Data flow:
//!
//! ```text
//! JSONL lines ──► source::forward_lines ──► mpsc ──► ingestion::start_ingestion
//!                                                       │            │
//!                                            WindowAggregator    emission timer
//!                                            (Mutex<BucketRing>)     │
//!                                                       └──► SnapshotSink (JSONL)
//! ```
//!
//! [`WindowAggregator::record`] admits an observation if its timestamp lies in
//! `[now - window, now]`, and [`WindowAggregator::snapshot`] folds every live
//! bucket into one [`Aggregate`] in time proportional to the bucket count.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod observation;
pub mod ring;
pub mod snapshot_writer;
pub mod source;
pub mod window;

pub use aggregate::Aggregate;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RuntimeConfig, WindowConfig, MAX_BUCKETS};
pub use error::WindowError;
pub use ingestion::{IngestMessage, IngestionStats, RejectReason, Verdict};
pub use observation::{Observation, ObservationError};
pub use window::{Admission, WindowAggregator};
