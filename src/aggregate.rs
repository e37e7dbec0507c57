//! Mergeable summary statistics (count, sum, min, max, average)

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Fractional digits kept in `average`
pub const AVERAGE_SCALE: u32 = 2;

/// Running statistics over a set of decimal values.
///
/// `min`/`max` are `None` exactly when `count == 0`. `average` is derived from
/// `sum / count` on every update (rounded half away from zero to
/// [`AVERAGE_SCALE`] digits) and is `0` for an empty aggregate. It is never
/// merged directly, which keeps `merge` associative and commutative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    #[serde(rename = "avg", with = "rust_decimal::serde::float")]
    pub average: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub max: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub min: Option<Decimal>,
    pub count: u64,
}

/// The sum left the representable decimal range; the aggregate is unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

impl std::fmt::Display for Overflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decimal sum out of range")
    }
}

impl std::error::Error for Overflow {}

impl Aggregate {
    /// The identity element for `merge`
    pub fn zero() -> Self {
        Self {
            sum: Decimal::ZERO,
            average: Decimal::ZERO,
            max: None,
            min: None,
            count: 0,
        }
    }

    pub fn from_values<I>(values: I) -> Result<Self, Overflow>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut aggregate = Aggregate::zero();
        for value in values {
            aggregate.add(value)?;
        }
        Ok(aggregate)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, value: Decimal) -> Result<(), Overflow> {
        let sum = self.sum.checked_add(value).ok_or(Overflow)?;
        let count = self.count + 1;
        let average = average_of(sum, count)?;

        self.min = Some(match self.min {
            Some(min) if min <= value => min,
            _ => value,
        });
        self.max = Some(match self.max {
            Some(max) if max >= value => max,
            _ => value,
        });
        self.count = count;
        self.sum = sum;
        self.average = average;
        Ok(())
    }

    pub fn merge(&mut self, other: &Aggregate) -> Result<(), Overflow> {
        if other.is_empty() {
            return Ok(());
        }

        let sum = self.sum.checked_add(other.sum).ok_or(Overflow)?;
        let count = self.count + other.count;
        let average = average_of(sum, count)?;

        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.count = count;
        self.sum = sum;
        self.average = average;
        Ok(())
    }
}

fn average_of(sum: Decimal, count: u64) -> Result<Decimal, Overflow> {
    if count == 0 {
        return Ok(Decimal::ZERO);
    }
    let average = sum.checked_div(Decimal::from(count)).ok_or(Overflow)?;
    Ok(average.round_dp_with_strategy(AVERAGE_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::zero()
    }
}
