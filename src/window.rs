//! Sliding-window aggregator: admission policy over a mutex-guarded ring
//!
//! Every operation takes the single lock, slides the ring against the caller's
//! clock reading and only then looks up or folds buckets, so eviction and
//! lookup are atomic with respect to each other.

use crate::aggregate::Aggregate;
use crate::clock::Clock;
use crate::config::{ConfigError, WindowConfig};
use crate::error::WindowError;
use crate::observation::Observation;
use crate::ring::BucketRing;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

/// Non-error outcomes of [`WindowAggregator::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Observation precedes the trailing window
    Discarded,
}

pub struct WindowAggregator {
    ring: Mutex<BucketRing>,
}

impl WindowAggregator {
    pub fn new(config: WindowConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ring: Mutex::new(BucketRing::new(config)?),
        })
    }

    /// Record an observation against a clock reading taken by the caller.
    ///
    /// Fails with [`WindowError::FutureTimestamp`] when the observation is
    /// newer than `now`, whatever state the ring is in, and with
    /// [`WindowError::Overflow`] when its bucket's sum would leave the decimal
    /// range (the bucket is left as it was).
    pub fn record(
        &self,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<Admission, WindowError> {
        let mut ring = self.lock()?;
        record_locked(&mut ring, observation, now)
    }

    /// Like [`record`](Self::record), sampling `clock` inside the critical
    /// section so readings are ordered the same way as lock acquisition.
    pub fn record_now(
        &self,
        observation: Observation,
        clock: &dyn Clock,
    ) -> Result<Admission, WindowError> {
        let mut ring = self.lock()?;
        let now = clock.now();
        record_locked(&mut ring, observation, now)
    }

    /// Aggregate over `[now - window, now]`.
    ///
    /// Fails with [`WindowError::Overflow`] while the live buckets together sum
    /// past the decimal range; no state is lost and later snapshots recover
    /// once those buckets expire.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<Aggregate, WindowError> {
        let mut ring = self.lock()?;
        snapshot_locked(&mut ring, now)
    }

    pub fn snapshot_now(&self, clock: &dyn Clock) -> Result<Aggregate, WindowError> {
        let mut ring = self.lock()?;
        let now = clock.now();
        snapshot_locked(&mut ring, now)
    }

    /// Drop all bucket state. Also clears a lock poisoned by a panic.
    pub fn reset(&self) {
        let mut ring = self.ring.lock().unwrap_or_else(|poisoned| {
            self.ring.clear_poison();
            poisoned.into_inner()
        });
        ring.clear();
        log::debug!("Window state reset");
    }

    pub fn is_empty(&self) -> Result<bool, WindowError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BucketRing>, WindowError> {
        self.ring
            .lock()
            .map_err(|_| WindowError::invariant("aggregator lock poisoned"))
    }
}

fn record_locked(
    ring: &mut BucketRing,
    observation: Observation,
    now: DateTime<Utc>,
) -> Result<Admission, WindowError> {
    if observation.timestamp > now {
        log::debug!(
            "Rejecting observation from the future: {} > {}",
            observation.timestamp.to_rfc3339(),
            now.to_rfc3339()
        );
        return Err(WindowError::FutureTimestamp {
            timestamp: observation.timestamp,
            now,
        });
    }

    ring.ensure_initialized(now);
    ring.advance(now);
    if cfg!(debug_assertions) {
        ring.check_invariants()?;
    }

    if now - ring.window_duration() > observation.timestamp {
        return Ok(Admission::Discarded);
    }

    let oldest = ring
        .oldest_start()
        .ok_or_else(|| WindowError::invariant("ring empty after initialization"))?;

    // A caller whose clock reading lags one the ring already advanced to
    if observation.timestamp < oldest {
        log::debug!(
            "Discarding observation at {} behind ring start {}",
            observation.timestamp.to_rfc3339(),
            oldest.to_rfc3339()
        );
        return Ok(Admission::Discarded);
    }

    match ring.locate(observation.timestamp) {
        Some(bucket) => {
            bucket.add(observation.amount).map_err(|e| {
                WindowError::Overflow(format!(
                    "adding {} to bucket at {}: {}",
                    observation.amount,
                    bucket.start().to_rfc3339(),
                    e
                ))
            })?;
            Ok(Admission::Accepted)
        }
        None => {
            let err = WindowError::invariant(format!(
                "no bucket for admitted timestamp {} (now {}, oldest {})",
                observation.timestamp.to_rfc3339(),
                now.to_rfc3339(),
                oldest.to_rfc3339()
            ));
            log::error!("{}", err);
            Err(err)
        }
    }
}

fn snapshot_locked(ring: &mut BucketRing, now: DateTime<Utc>) -> Result<Aggregate, WindowError> {
    if ring.is_empty() {
        return Ok(Aggregate::zero());
    }

    ring.advance(now);
    if cfg!(debug_assertions) {
        ring.check_invariants()?;
    }

    ring.fold_all()
        .map_err(|e| WindowError::Overflow(format!("window total at {}: {}", now.to_rfc3339(), e)))
}
