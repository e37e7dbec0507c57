//! Error taxonomy for the window aggregator
//!
//! Admission outcomes (`Accepted`/`Discarded`) are plain return values.
//! Only the two cases below travel through `Err`.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Observation timestamp is after the caller's clock reading.
    FutureTimestamp {
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// Adding the observation would take a sum out of the decimal range.
    /// The window is left unchanged.
    Overflow(String),
    /// Ring bookkeeping is broken. Never recovered.
    InvariantViolation(String),
}

impl WindowError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        WindowError::InvariantViolation(msg.into())
    }

    /// Whether the runtime must stop after seeing this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, WindowError::InvariantViolation(_))
    }
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::FutureTimestamp { timestamp, now } => write!(
                f,
                "Observation timestamp {} is after current time {}",
                timestamp.to_rfc3339(),
                now.to_rfc3339()
            ),
            WindowError::Overflow(msg) => write!(f, "Decimal overflow: {}", msg),
            WindowError::InvariantViolation(msg) => {
                write!(f, "Window invariant violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for WindowError {}
