//! Normalized calendar events.
//!
//! A [`NormalizedEvent`] is the stable shape every downstream consumer sees:
//! the HTTP API returns it verbatim and the assistant renders it into its
//! grounding prompt. It is derived on every read and never persisted.

use serde::{Deserialize, Serialize};

/// A provider calendar event reduced to the fields the application uses.
///
/// `start` and `end` carry the provider's own strings: an RFC 3339 timestamp
/// for timed events, or a `YYYY-MM-DD` date for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Provider event identifier.
    pub id: String,
    /// Event title (the provider's summary).
    pub title: String,
    /// Start timestamp or all-day date.
    pub start: String,
    /// End timestamp or all-day date.
    pub end: String,
    /// Attendee identifiers (email addresses), possibly empty.
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl NormalizedEvent {
    /// Creates an event without attendees.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start: start.into(),
            end: end.into(),
            attendees: Vec::new(),
        }
    }

    /// Builder method to set the attendee list.
    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the event lists at least one attendee.
    pub fn has_attendees(&self) -> bool {
        !self.attendees.is_empty()
    }
}
