//! Fixed-capacity ring of time buckets covering the trailing window
//!
//! The ring holds `capacity = floor(window / width) + 1` contiguous buckets,
//! each covering the half-open interval `[start, start + width)`. It is either
//! empty (uninitialised or reset) or full; there is no partially filled state.
//!
//! ```text
//!   head (oldest)                           newest
//!     │                                       │
//!  [ t0 ][ t0+w ][ t0+2w ] ... [ t0+(capacity-1)w ]
//!     └─ evicted first when now - window passes t0 + w
//! ```

use crate::aggregate::{Aggregate, Overflow};
use crate::config::{ConfigError, WindowConfig};
use crate::error::WindowError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// One time slice of the window
#[derive(Debug, Clone)]
pub struct Bucket {
    start: DateTime<Utc>,
    aggregate: Aggregate,
}

impl Bucket {
    fn empty(start: DateTime<Utc>) -> Self {
        Self {
            start,
            aggregate: Aggregate::zero(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn add(&mut self, amount: Decimal) -> Result<(), Overflow> {
        self.aggregate.add(amount)
    }
}

/// Outcome of [`BucketRing::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Ring was empty, nothing to slide
    Uninitialized,
    /// Ring still covers the window
    Current,
    /// `n` expired buckets were recycled at the newest end
    Slid(usize),
    /// Every bucket had expired; ring re-anchored at `now`
    Reset,
}

#[derive(Debug)]
pub struct BucketRing {
    slots: Vec<Bucket>,
    /// Slot index of the oldest bucket
    head: usize,
    capacity: usize,
    bucket_width: Duration,
    window_duration: Duration,
    width_nanos: i64,
}

impl BucketRing {
    pub fn new(config: WindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let bucket_width = Duration::from_std(config.bucket_width)
            .map_err(|e| ConfigError::InvalidValue(format!("bucket width: {}", e)))?;
        let window_duration = Duration::from_std(config.window_duration)
            .map_err(|e| ConfigError::InvalidValue(format!("window duration: {}", e)))?;
        let width_nanos = bucket_width.num_nanoseconds().ok_or_else(|| {
            ConfigError::InvalidValue("bucket width overflows nanoseconds".to_string())
        })?;
        let capacity = config.capacity();

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
            bucket_width,
            window_duration,
            width_nanos,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    /// Buckets from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Bucket> + '_ {
        let (newer, older) = self.slots.split_at(self.head.min(self.slots.len()));
        older.iter().chain(newer.iter())
    }

    fn nth(&self, age: usize) -> Option<&Bucket> {
        if age >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + age) % self.slots.len())
    }

    pub fn oldest_start(&self) -> Option<DateTime<Utc>> {
        self.nth(0).map(Bucket::start)
    }

    pub fn penultimate_start(&self) -> Option<DateTime<Utc>> {
        self.nth(1).map(Bucket::start)
    }

    pub fn newest_start(&self) -> Option<DateTime<Utc>> {
        self.slots
            .len()
            .checked_sub(1)
            .and_then(|age| self.nth(age))
            .map(Bucket::start)
    }

    /// Populate an empty ring anchored at `now - window`. No-op when live.
    pub fn ensure_initialized(&mut self, now: DateTime<Utc>) {
        if self.slots.is_empty() {
            self.fill(now);
        }
    }

    fn fill(&mut self, now: DateTime<Utc>) {
        self.slots.clear();
        self.head = 0;

        let mut start = now - self.window_duration;
        for _ in 0..self.capacity {
            self.slots.push(Bucket::empty(start));
            start += self.bucket_width;
        }

        log::debug!(
            "Initialized {} buckets from {}",
            self.capacity,
            (now - self.window_duration).to_rfc3339()
        );
    }

    /// Slide the window so it covers `[now - window, now]`.
    ///
    /// Buckets whose end is at or before `now - window` are recycled as empty
    /// buckets after the newest one. If even the newest bucket has ended by
    /// the cutoff the whole ring is rebuilt around `now`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Advance {
        let (Some(penultimate), Some(newest)) = (self.penultimate_start(), self.newest_start())
        else {
            return Advance::Uninitialized;
        };

        let cutoff = now - self.window_duration;

        // Oldest bucket ends at `penultimate`
        if cutoff < penultimate {
            return Advance::Current;
        }

        if newest + self.bucket_width <= cutoff {
            log::debug!(
                "All {} buckets expired (newest started {}), rebuilding ring",
                self.capacity,
                newest.to_rfc3339()
            );
            self.fill(now);
            return Advance::Reset;
        }

        let mut next_start = newest + self.bucket_width;
        let mut evicted = 0;

        while evicted + 1 < self.capacity {
            let oldest = &mut self.slots[self.head];
            if oldest.start + self.bucket_width > cutoff {
                break;
            }

            *oldest = Bucket::empty(next_start);
            next_start += self.bucket_width;
            self.head = (self.head + 1) % self.capacity;
            evicted += 1;
        }

        log::trace!("Evicted {} expired buckets", evicted);
        Advance::Slid(evicted)
    }

    /// Bucket whose interval contains `timestamp`, or `None` outside coverage
    pub fn locate(&mut self, timestamp: DateTime<Utc>) -> Option<&mut Bucket> {
        let oldest = self.oldest_start()?;
        let delta = (timestamp - oldest).num_nanoseconds()?;
        let offset = delta.div_euclid(self.width_nanos);

        if offset < 0 || offset as u64 >= self.capacity as u64 {
            return None;
        }

        let index = (self.head + offset as usize) % self.capacity;
        self.slots.get_mut(index)
    }

    /// Merge every bucket into a single aggregate.
    ///
    /// Each bucket's sum fits in a `Decimal`, but the window-wide sum may not;
    /// that case is an error rather than a saturated total.
    pub fn fold_all(&self) -> Result<Aggregate, Overflow> {
        let mut total = Aggregate::zero();
        for bucket in &self.slots {
            total.merge(&bucket.aggregate)?;
        }
        Ok(total)
    }

    /// Drop all buckets; the next access re-initialises the ring
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Length is 0 or `capacity`, starts are spaced exactly one width apart
    pub fn check_invariants(&self) -> Result<(), WindowError> {
        if self.slots.is_empty() {
            return Ok(());
        }

        if self.slots.len() != self.capacity {
            return Err(WindowError::invariant(format!(
                "ring holds {} buckets, capacity is {}",
                self.slots.len(),
                self.capacity
            )));
        }

        if self.head >= self.capacity {
            return Err(WindowError::invariant(format!(
                "head index {} out of range for capacity {}",
                self.head, self.capacity
            )));
        }

        let mut previous: Option<DateTime<Utc>> = None;
        for bucket in self.iter() {
            if let Some(prev) = previous {
                if bucket.start - prev != self.bucket_width {
                    return Err(WindowError::invariant(format!(
                        "bucket at {} does not follow bucket at {}",
                        bucket.start.to_rfc3339(),
                        prev.to_rfc3339()
                    )));
                }
            }
            previous = Some(bucket.start);
        }

        Ok(())
    }
}
