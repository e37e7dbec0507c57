//! Observation model and JSONL decoding
//!
//! One observation per line:
//!
//! ```text
//! {"amount": 12.3, "timestamp": 1529822905186}
//! {"amount": "4.20", "timestamp": "2018-06-24T06:48:25.186Z"}
//! ```
//!
//! `amount` may be a JSON number or a decimal string. `timestamp` is either
//! epoch milliseconds or an RFC 3339 string.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// A timestamped decimal value offered to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { amount, timestamp }
    }

    /// Decode a single JSON object
    pub fn from_json(line: &str) -> Result<Self, ObservationError> {
        let payload: ObservationPayload = serde_json::from_str(line)?;
        Ok(Self {
            amount: payload.amount,
            timestamp: payload.timestamp.into_datetime()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ObservationPayload {
    amount: Decimal,
    timestamp: RawTimestamp,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    EpochMillis(i64),
    Text(String),
}

impl RawTimestamp {
    fn into_datetime(self) -> Result<DateTime<Utc>, ObservationError> {
        match self {
            RawTimestamp::EpochMillis(millis) => DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| {
                    ObservationError::InvalidTimestamp(format!(
                        "{} ms is outside the representable range",
                        millis
                    ))
                }),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ObservationError::InvalidTimestamp(format!("'{}': {}", text, e))),
        }
    }
}

#[derive(Debug)]
pub enum ObservationError {
    Json(serde_json::Error),
    InvalidTimestamp(String),
}

impl std::fmt::Display for ObservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationError::Json(e) => write!(f, "Malformed observation: {}", e),
            ObservationError::InvalidTimestamp(msg) => write!(f, "Invalid timestamp {}", msg),
        }
    }
}

impl std::error::Error for ObservationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ObservationError::Json(e) => Some(e),
            ObservationError::InvalidTimestamp(_) => None,
        }
    }
}

impl From<serde_json::Error> for ObservationError {
    fn from(err: serde_json::Error) -> Self {
        ObservationError::Json(err)
    }
}
