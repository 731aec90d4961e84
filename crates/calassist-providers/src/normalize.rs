//! RawEvent to NormalizedEvent conversion.
//!
//! Normalization is a filter and a projection:
//! 1. Events missing an id, title, start or end are dropped silently
//! 2. Start/end prefer the provider timestamp and fall back to the all-day date
//! 3. Attendees reduce to the email identifiers that are present
//!
//! Provider order is preserved.

use calassist_core::NormalizedEvent;
use tracing::debug;

use crate::raw_event::RawEvent;

/// Converts a [`RawEvent`] to a [`NormalizedEvent`].
///
/// Returns `None` when any of id, title, start or end is missing or empty.
pub fn normalize_event(raw: &RawEvent) -> Option<NormalizedEvent> {
    let id = non_empty(raw.id.as_deref())?;
    let title = non_empty(raw.summary.as_deref())?;
    let start = raw.start.as_ref()?.preferred()?;
    let end = raw.end.as_ref()?.preferred()?;

    let attendees = raw
        .attendees
        .iter()
        .filter_map(|a| non_empty(a.email.as_deref()))
        .map(str::to_string);

    Some(NormalizedEvent::new(id, title, start, end).with_attendees(attendees))
}

/// Batch normalize provider events, dropping malformed entries.
pub fn normalize_events(raw_events: &[RawEvent]) -> Vec<NormalizedEvent> {
    let events: Vec<NormalizedEvent> = raw_events.iter().filter_map(normalize_event).collect();

    let dropped = raw_events.len() - events.len();
    if dropped > 0 {
        debug!(dropped, kept = events.len(), "dropped malformed provider events");
    }

    events
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
