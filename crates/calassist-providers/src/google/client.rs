//! Google Calendar API client.
//!
//! Low-level HTTP access to the events.list endpoint: request building,
//! pagination and response parsing into [`RawEvent`]s.

use std::collections::HashSet;

use calassist_core::TimeWindow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{RawAttendee, RawEvent, RawEventTime};

use super::config::GoogleConfig;
use super::{PROVIDER_NAME, build_http_client, status_error};

/// Upper bound on pages fetched for one window.
const MAX_PAGES: usize = 50;

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    /// Creates a new Google Calendar client.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            api_base: config.endpoints.calendar_api_base.clone(),
        })
    }

    /// Lists events of `calendar_id` overlapping `window`.
    ///
    /// Recurring events are expanded into instances and ordered by start
    /// time. Pages are followed until the provider stops returning a token,
    /// repeats one, or [`MAX_PAGES`] is reached. Cancelled instances are
    /// skipped.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
    ) -> ProviderResult<Vec<RawEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .list_events_page(access_token, calendar_id, window, page_token.as_deref())
                .await?;
            pages += 1;

            all_events.extend(page.items.into_iter().filter_map(convert_event));

            let token = match page.next_page_token {
                Some(token) if !token.is_empty() => token,
                _ => break,
            };
            if !seen_tokens.insert(token.clone()) {
                warn!(calendar_id, pages, "calendar returned a repeated page token, stopping");
                break;
            }
            if pages >= MAX_PAGES {
                warn!(calendar_id, pages, "calendar page limit reached, results truncated");
                break;
            }
            page_token = Some(token);
        }

        debug!(
            calendar_id,
            pages,
            events = all_events.len(),
            "fetched calendar events"
        );
        Ok(all_events)
    }

    /// Fetches a single page of events.
    async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", format_instant(window.start)),
                ("timeMax", format_instant(window.end)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(|e| {
            ProviderError::from_transport("calendar request failed", e).with_provider(PROVIDER_NAME)
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            ))
            .with_provider(PROVIDER_NAME));
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::from_transport("failed to read calendar response", e)
                .with_provider(PROVIDER_NAME)
        })?;

        if !status.is_success() {
            return Err(status_error("calendar API error", status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse events response: {}", e))
                .with_provider(PROVIDER_NAME)
        })
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Converts an API event to a RawEvent, skipping cancelled instances.
fn convert_event(event: ApiEvent) -> Option<RawEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let attendees = event
        .attendees
        .unwrap_or_default()
        .into_iter()
        .map(|a| RawAttendee { email: a.email })
        .collect();

    Some(RawEvent {
        id: event.id,
        summary: event.summary,
        start: event.start.map(ApiEventTime::into_raw),
        end: event.end.map(ApiEventTime::into_raw),
        attendees,
    })
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    status: Option<String>,
    attendees: Option<Vec<ApiAttendee>>,
}

/// Event time from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

impl ApiEventTime {
    fn into_raw(self) -> RawEventTime {
        RawEventTime {
            date_time: self.date_time,
            date: self.date,
        }
    }
}

/// Attendee from the API.
#[derive(Debug, Deserialize)]
struct ApiAttendee {
    email: Option<String>,
}
