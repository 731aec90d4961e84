//! Google Calendar source.
//!
//! Implements [`CalendarSource`] on top of the OAuth and Calendar clients.
//! Each listing starts from the stored refresh token: an access token is
//! minted for the call and dropped afterwards.

use calassist_core::TimeWindow;
use tracing::debug;

use crate::error::ProviderResult;
use crate::provider::{BoxFuture, CalendarSource};
use crate::raw_event::RawEvent;

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::GoogleOAuthClient;

/// Primary-calendar reader authorized by refresh tokens.
#[derive(Debug, Clone)]
pub struct GoogleCalendarSource {
    oauth: GoogleOAuthClient,
    calendar: GoogleCalendarClient,
}

impl GoogleCalendarSource {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let calendar = GoogleCalendarClient::new(&config)?;
        let oauth = GoogleOAuthClient::new(config)?;
        Ok(Self { oauth, calendar })
    }

    async fn list(&self, refresh_token: &str, window: TimeWindow) -> ProviderResult<Vec<RawEvent>> {
        let tokens = self.oauth.refresh_access_token(refresh_token).await?;
        debug!(start = %window.start, end = %window.end, "listing primary calendar");
        self.calendar
            .list_events(
                &tokens.access_token,
                GoogleConfig::PRIMARY_CALENDAR,
                window,
            )
            .await
    }
}

impl CalendarSource for GoogleCalendarSource {
    fn list_primary_events<'a>(
        &'a self,
        refresh_token: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(self.list(refresh_token, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::google::config::{GoogleEndpoints, OAuthCredentials};
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> GoogleCalendarSource {
        let config = GoogleConfig::new(
            OAuthCredentials::new("test.apps.googleusercontent.com", "shh"),
            "http://localhost:4000/auth/google/callback",
        )
        .with_endpoints(GoogleEndpoints::with_base(&server.uri()));
        GoogleCalendarSource::new(config).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn refreshes_then_lists_with_fresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-at",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer fresh-at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "e1",
                    "summary": "Standup",
                    "start": {"dateTime": "2024-01-02T09:00:00Z"},
                    "end": {"dateTime": "2024-01-02T09:15:00Z"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = source_for(&server)
            .list_primary_events("rt-1", window())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Standup"));
    }

    #[tokio::test]
    async fn revoked_refresh_token_fails_before_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = source_for(&server)
            .list_primary_events("revoked", window())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::BadRequest);
    }
}
