//! Ingestion loop - async channel processor for observations
//!
//! Lines arrive over an mpsc channel and are decoded, admitted into the shared
//! [`WindowAggregator`] and classified into a [`Verdict`]. A timer emits a
//! snapshot of the window to the configured [`SnapshotSink`] on every tick.

use crate::clock::Clock;
use crate::error::WindowError;
use crate::observation::Observation;
use crate::snapshot_writer::{SnapshotRecord, SnapshotSink};
use crate::window::{Admission, WindowAggregator};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Messages accepted by the ingestion loop
#[derive(Debug)]
pub enum IngestMessage {
    /// Raw JSONL line
    Line(String),
    /// Already decoded observation
    Observation(Observation),
    /// Drop all window state
    Reset,
    /// Emit a final snapshot and stop
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Malformed(String),
    FutureTimestamp,
    /// The amount would push a running sum out of the decimal range
    Overflow,
}

/// Caller-facing classification of a single observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Discarded,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Discarded => "discarded",
            Verdict::Rejected(_) => "rejected",
        }
    }

    /// HTTP-style status: 201 accepted, 204 discarded, 400 rejected
    pub fn status_code(&self) -> u16 {
        match self {
            Verdict::Accepted => 201,
            Verdict::Discarded => 204,
            Verdict::Rejected(_) => 400,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    pub accepted: u64,
    pub discarded: u64,
    pub rejected: u64,
    pub snapshots: u64,
}

impl IngestionStats {
    fn count(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Accepted => self.accepted += 1,
            Verdict::Discarded => self.discarded += 1,
            Verdict::Rejected(_) => self.rejected += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.accepted + self.discarded + self.rejected
    }
}

/// Decode and admit one JSONL line.
///
/// Only a fatal [`WindowError::InvariantViolation`] is returned as `Err`.
pub fn process_line(
    aggregator: &WindowAggregator,
    clock: &dyn Clock,
    line: &str,
) -> Result<Verdict, WindowError> {
    let verdict = match Observation::from_json(line) {
        Ok(observation) => process_observation(aggregator, clock, observation)?,
        Err(e) => {
            log::warn!("⚠️  {} (line: {})", e, line);
            Verdict::Rejected(RejectReason::Malformed(e.to_string()))
        }
    };
    log::debug!("{} {} <- {}", verdict.status_code(), verdict.as_str(), line);
    Ok(verdict)
}

pub fn process_observation(
    aggregator: &WindowAggregator,
    clock: &dyn Clock,
    observation: Observation,
) -> Result<Verdict, WindowError> {
    match aggregator.record_now(observation, clock) {
        Ok(Admission::Accepted) => Ok(Verdict::Accepted),
        Ok(Admission::Discarded) => Ok(Verdict::Discarded),
        Err(e @ WindowError::FutureTimestamp { .. }) => {
            log::warn!("⚠️  {}", e);
            Ok(Verdict::Rejected(RejectReason::FutureTimestamp))
        }
        Err(e @ WindowError::Overflow(_)) => {
            log::warn!("⚠️  {}", e);
            Ok(Verdict::Rejected(RejectReason::Overflow))
        }
        Err(e) => Err(e),
    }
}

/// Start ingestion from the observation channel
///
/// Main loop:
/// 1. Receives lines or observations via mpsc channel
/// 2. Admits each one into the shared aggregator
/// 3. Emits a snapshot to `sink` on every `emission_interval` tick
///
/// Runs until the channel is closed or a `Shutdown` message arrives, then
/// writes one final snapshot and flushes the sink. Returns early with the
/// error if the window reports an invariant violation.
pub async fn start_ingestion(
    mut rx: mpsc::Receiver<IngestMessage>,
    aggregator: Arc<WindowAggregator>,
    clock: Arc<dyn Clock>,
    mut sink: Box<dyn SnapshotSink>,
    emission_interval: Duration,
) -> Result<IngestionStats, WindowError> {
    log::info!("🚀 Starting ingestion");
    log::info!("   ├─ Emission interval: {}ms", emission_interval.as_millis());
    log::info!("   └─ Snapshot backend: {}", sink.backend_type());

    let mut emission_timer = interval(emission_interval);
    emission_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    emission_timer.tick().await;

    let mut stats = IngestionStats::default();
    let mut processed_since_log = 0u64;
    let mut last_log_time = Instant::now();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let verdict = match message {
                    Some(IngestMessage::Line(line)) => {
                        process_line(&aggregator, clock.as_ref(), &line).map_err(fatal)?
                    }
                    Some(IngestMessage::Observation(observation)) => {
                        process_observation(&aggregator, clock.as_ref(), observation)
                            .map_err(fatal)?
                    }
                    Some(IngestMessage::Reset) => {
                        aggregator.reset();
                        log::info!("🔄 Window reset");
                        continue;
                    }
                    Some(IngestMessage::Shutdown) => {
                        log::info!("🛑 Shutdown requested");
                        break;
                    }
                    None => {
                        log::info!("Channel closed");
                        break;
                    }
                };

                stats.count(&verdict);
                processed_since_log += 1;

                if last_log_time.elapsed().as_secs() >= 10 {
                    let per_sec = processed_since_log as f64 / last_log_time.elapsed().as_secs_f64();
                    log::info!(
                        "📊 Ingestion rate: {:.1} observations/sec (accepted: {}, discarded: {}, rejected: {})",
                        per_sec,
                        stats.accepted,
                        stats.discarded,
                        stats.rejected
                    );
                    last_log_time = Instant::now();
                    processed_since_log = 0;
                }
            }

            _ = emission_timer.tick() => {
                emit_snapshot(&aggregator, clock.as_ref(), sink.as_mut(), &mut stats).await?;
            }
        }
    }

    emit_snapshot(&aggregator, clock.as_ref(), sink.as_mut(), &mut stats).await?;
    if let Err(e) = sink.flush().await {
        log::error!("❌ Failed to flush {} sink: {}", sink.backend_type(), e);
    }

    log::info!(
        "✅ Ingestion finished: {} accepted, {} discarded, {} rejected, {} snapshots",
        stats.accepted,
        stats.discarded,
        stats.rejected,
        stats.snapshots
    );

    Ok(stats)
}

async fn emit_snapshot(
    aggregator: &WindowAggregator,
    clock: &dyn Clock,
    sink: &mut dyn SnapshotSink,
    stats: &mut IngestionStats,
) -> Result<(), WindowError> {
    let taken_at = clock.now();
    let aggregate = match aggregator.snapshot(taken_at) {
        Ok(aggregate) => aggregate,
        Err(e) if e.is_fatal() => return Err(fatal(e)),
        Err(e) => {
            log::warn!("⚠️  Skipping snapshot: {}", e);
            return Ok(());
        }
    };
    let record = SnapshotRecord::new(aggregate, taken_at);

    match sink.write_snapshot(&record).await {
        Ok(()) => {
            stats.snapshots += 1;
            log::debug!(
                "Snapshot: count={} sum={} avg={}",
                record.aggregate.count,
                record.aggregate.sum,
                record.aggregate.average
            );
        }
        Err(e) => log::error!("❌ Failed to write snapshot: {}", e),
    }

    Ok(())
}

fn fatal(err: WindowError) -> WindowError {
    log::error!("❌ {}", err);
    err
}
