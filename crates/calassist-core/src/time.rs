//! Time windows for calendar queries.
//!
//! [`TimeWindow`] is the half-open `[start, end)` interval the calendar
//! reader passes to the provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building a [`TimeWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeWindowError {
    /// A bound could not be parsed as an RFC 3339 instant.
    #[error("invalid {field} instant '{value}': expected RFC 3339")]
    InvalidInstant { field: &'static str, value: String },

    /// The window ends before it starts.
    #[error("time window start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeWindowError> {
        if start > end {
            return Err(TimeWindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from RFC 3339 strings (any offset, stored as UTC).
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeWindowError> {
        let start = parse_instant("start", start)?;
        let end = parse_instant("end", end)?;
        Self::new(start, end)
    }

    /// Creates a window reaching `back` into the past and `ahead` into the
    /// future from `now`.
    pub fn around(now: DateTime<Utc>, back: Duration, ahead: Duration) -> Self {
        Self {
            start: now - back,
            end: now + ahead,
        }
    }
}

fn parse_instant(field: &'static str, value: &str) -> Result<DateTime<Utc>, TimeWindowError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimeWindowError::InvalidInstant {
            field,
            value: value.to_string(),
        })
}
