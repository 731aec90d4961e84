//! System prompt construction for the assistant.

use calassist_core::NormalizedEvent;

/// Grounding text when no events are in range.
pub const NO_EVENTS: &str = "You have no events in the selected time range.";

/// Header preceding the event list.
pub const EVENTS_HEADER: &str = "Here are the user's events:";

const PERSONA: &[&str] = &[
    "You are a helpful calendar assistant.",
    "You can see the user's recent and upcoming events. Reason about time spent in meetings, focus time and personal commitments such as workouts.",
    "When asked to draft an email, write a clear and polite template the user can copy and send themselves.",
    "When asked about meeting load, estimate the time spent in meetings and suggest concrete ways to cut unnecessary meetings and protect focus blocks.",
    "Keep your answers concise and helpful.",
];

/// Renders `events` as the grounding block, one line per event in the given
/// order.
pub fn summarize_events(events: &[NormalizedEvent]) -> String {
    if events.is_empty() {
        return NO_EVENTS.to_string();
    }

    let mut out = String::from(EVENTS_HEADER);
    for event in events {
        out.push_str("\n- ");
        out.push_str(&event.title);
        out.push_str(": ");
        out.push_str(&event.start);
        out.push_str(" to ");
        out.push_str(&event.end);
        if event.has_attendees() {
            out.push_str(" with ");
            out.push_str(&event.attendees.join(", "));
        }
    }
    out
}

/// Persona and guidance, a blank line, then the grounding block.
pub fn system_prompt(events: &[NormalizedEvent]) -> String {
    let mut lines: Vec<String> = PERSONA.iter().map(|s| s.to_string()).collect();
    lines.push(String::new());
    lines.push(summarize_events(events));
    lines.join("\n")
}
