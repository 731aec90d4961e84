//! Raw event type from calendar providers.
//!
//! [`RawEvent`] keeps an event exactly as the provider described it, with
//! every field optional. Malformed entries are only discarded later, during
//! normalization, so the provider client never has to decide what counts as
//! a usable event.

use serde::{Deserialize, Serialize};

/// The start or end of a raw event.
///
/// Timed events carry `date_time`; all-day events carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventTime {
    /// RFC 3339 timestamp, e.g. `2024-01-02T09:00:00-05:00`.
    pub date_time: Option<String>,
    /// All-day date, `YYYY-MM-DD`.
    pub date: Option<String>,
}

impl RawEventTime {
    /// Creates a timed event bound.
    pub fn timestamp(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Self::default()
        }
    }

    /// Creates an all-day event bound.
    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Self::default()
        }
    }

    /// Returns the timestamp if present, otherwise the all-day date.
    pub fn preferred(&self) -> Option<&str> {
        self.date_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.date.as_deref().filter(|s| !s.is_empty()))
    }
}

/// An attendee of a calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttendee {
    /// The attendee's email address, when the provider exposes one.
    pub email: Option<String>,
}

impl RawAttendee {
    /// Creates an attendee with the given email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

/// A raw event from a calendar provider, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Provider event identifier.
    pub id: Option<String>,
    /// The event title.
    pub summary: Option<String>,
    pub start: Option<RawEventTime>,
    pub end: Option<RawEventTime>,
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
}

impl RawEvent {
    /// Creates a complete raw event.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: RawEventTime,
        end: RawEventTime,
    ) -> Self {
        Self {
            id: Some(id.into()),
            summary: Some(summary.into()),
            start: Some(start),
            end: Some(end),
            attendees: Vec::new(),
        }
    }

    /// Builder method to set attendees.
    pub fn with_attendees(mut self, attendees: Vec<RawAttendee>) -> Self {
        self.attendees = attendees;
        self
    }
}
