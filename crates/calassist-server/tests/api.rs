// Router-level tests: in-memory store, fake Google providers, fake LLM.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use calassist_providers::{ProviderError, RawAttendee, RawEvent, RawEventTime, TokenSet};
use calassist_server::testing::{FakeCalendarSource, FakeCompletionBackend, FakeIdentityProvider};
use calassist_server::{AppState, AssistantResponder, AssistantSettings, SessionIssuer, router};
use calassist_store::{NewCredential, NewIdentity, Store};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

const ORIGIN: &str = "http://localhost:5173";
const SECRET: &str = "integration-secret";

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    app: Router,
    store: Arc<Store>,
    sessions: Arc<SessionIssuer>,
}

fn harness(
    identity: FakeIdentityProvider,
    calendar: Arc<FakeCalendarSource>,
    assistant: AssistantResponder,
) -> Harness {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let sessions = Arc::new(SessionIssuer::new(SECRET));
    let state = AppState::new(
        Arc::clone(&store),
        Arc::clone(&sessions),
        Arc::new(identity),
        calendar,
        assistant,
        ORIGIN,
    );
    Harness {
        app: router(state),
        store,
        sessions,
    }
}

fn week_events() -> Vec<RawEvent> {
    vec![
        RawEvent::new(
            "evt-standup",
            "Standup",
            RawEventTime::timestamp("2024-01-02T09:00:00Z"),
            RawEventTime::timestamp("2024-01-02T09:15:00Z"),
        )
        .with_attendees(vec![
            RawAttendee::new("ana@example.com"),
            RawAttendee::new("bo@example.com"),
        ]),
        RawEvent::new(
            "evt-offsite",
            "Offsite",
            RawEventTime::all_day("2024-01-05"),
            RawEventTime::all_day("2024-01-06"),
        ),
    ]
}

fn signed_in_identity() -> FakeIdentityProvider {
    FakeIdentityProvider::new()
        .with_grant("abc123", TokenSet::new("at-1").with_refresh_token("rt-1"))
        .with_profile("at-1", "g1", "a@b.com", None)
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

fn redirect_params(response: &Response) -> Vec<(String, String)> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!(url.path(), "/auth/callback");
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// ── End to end ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_then_list_week() {
    let calendar = Arc::new(FakeCalendarSource::new().with_events("rt-1", week_events()));
    let h = harness(signed_in_identity(), Arc::clone(&calendar), AssistantResponder::stub());

    let response = get(&h.app, "/auth/google/callback?code=abc123", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let params = redirect_params(&response);

    let identity = h.store.find_identity_by_external_id("g1").unwrap().unwrap();
    assert_eq!(identity.email, "a@b.com");
    assert_eq!(param(&params, "id"), Some(identity.id.as_str()));
    assert_eq!(param(&params, "email"), Some("a@b.com"));
    assert_eq!(param(&params, "googleAccessToken"), Some("at-1"));
    assert_eq!(param(&params, "name"), None);

    let token = param(&params, "token").unwrap().to_string();
    assert_eq!(h.sessions.verify(&token).unwrap(), identity.id);

    let credential = h.store.find_active_credential(&identity.id).unwrap().unwrap();
    assert_eq!(credential.refresh_secret, "rt-1");

    let response = get(
        &h.app,
        "/api/calendar/events?start=2024-01-01T00:00:00Z&end=2024-01-08T00:00:00Z",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "events": [
                {
                    "id": "evt-standup",
                    "title": "Standup",
                    "start": "2024-01-02T09:00:00Z",
                    "end": "2024-01-02T09:15:00Z",
                    "attendees": ["ana@example.com", "bo@example.com"]
                },
                {
                    "id": "evt-offsite",
                    "title": "Offsite",
                    "start": "2024-01-05",
                    "end": "2024-01-06",
                    "attendees": []
                }
            ]
        })
    );

    let calls = calendar.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "rt-1");
    assert_eq!(calls[0].1.end - calls[0].1.start, Duration::days(7));
}

#[tokio::test]
async fn repeated_sign_in_keeps_one_identity() {
    let identity = FakeIdentityProvider::new()
        .with_grant("code-1", TokenSet::new("at-1").with_refresh_token("rt-1"))
        .with_grant("code-2", TokenSet::new("at-2").with_refresh_token("rt-2"))
        .with_profile("at-1", "g1", "a@b.com", Some("Ada"))
        .with_profile("at-2", "g1", "a@b.com", Some("Ada"));
    let h = harness(identity, Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    let first = redirect_params(&get(&h.app, "/auth/google/callback?code=code-1", None).await);
    let second = redirect_params(&get(&h.app, "/auth/google/callback?code=code-2", None).await);

    assert_eq!(param(&first, "id"), param(&second, "id"));
    assert_eq!(param(&second, "name"), Some("Ada"));
    assert_eq!(h.store.count_identities().unwrap(), 1);

    let id = param(&second, "id").unwrap();
    let credential = h.store.find_active_credential(id).unwrap().unwrap();
    assert_eq!(credential.refresh_secret, "rt-2");
}

// ── Sign-in ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn auth_url_is_public() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let response = get(&h.app, "/auth/google/url", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["url"].as_str().unwrap().contains("access_type=offline"));
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let response = get(&h.app, "/health", None).await;
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn callback_without_code() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let response = get(&h.app, "/auth/google/callback", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Missing code");
}

#[tokio::test]
async fn callback_with_rejected_code() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let response = get(&h.app, "/auth/google/callback?code=reused", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.count_identities().unwrap(), 0);
}

#[tokio::test]
async fn callback_with_incomplete_profile() {
    let identity = FakeIdentityProvider::new()
        .with_grant("abc123", TokenSet::new("at-1").with_refresh_token("rt-1"))
        .with_profile("at-1", "", "a@b.com", None);
    let h = harness(identity, Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    let response = get(&h.app, "/auth/google/callback?code=abc123", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid Google profile");
}

#[tokio::test]
async fn callback_provider_outage_is_generic() {
    let identity = FakeIdentityProvider::new()
        .with_exchange_error("abc123", ProviderError::server("token endpoint down"));
    let h = harness(identity, Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    let response = get(&h.app, "/auth/google/callback?code=abc123", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_text(response).await,
        "Failed to complete Google authentication"
    );
}

// ── Session gate ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn calendar_requires_bearer() {
    let calendar = Arc::new(FakeCalendarSource::new());
    let h = harness(FakeIdentityProvider::new(), Arc::clone(&calendar), AssistantResponder::stub());

    let response = get(
        &h.app,
        "/api/calendar/events?start=2024-01-01T00:00:00Z&end=2024-01-08T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Missing Authorization header"})
    );
    assert!(calendar.calls().is_empty());
}

#[tokio::test]
async fn forged_and_expired_tokens_are_rejected() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let uri = "/api/calendar/events?start=2024-01-01T00:00:00Z&end=2024-01-08T00:00:00Z";

    let forged = SessionIssuer::new("other-secret").mint("someone").unwrap();
    let response = get(&h.app, uri, Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({"error": "Invalid token"}));

    let expired = h
        .sessions
        .mint_at("someone", Utc::now() - Duration::hours(9))
        .unwrap();
    let response = get(&h.app, uri, Some(&expired)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_requires_bearer() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let response = post_json(&h.app, "/api/chat", None, json!({"message": "hi"})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ── Calendar ──────────────────────────────────────────────────────────────────

fn seeded(calendar: Arc<FakeCalendarSource>, assistant: AssistantResponder) -> (Harness, String) {
    let h = harness(FakeIdentityProvider::new(), calendar, assistant);
    let identity = h
        .store
        .create_identity(NewIdentity::new("g1", "a@b.com"))
        .unwrap();
    h.store
        .upsert_credential(NewCredential::new(&identity.id, "rt-1"))
        .unwrap();
    let token = h.sessions.mint(&identity.id).unwrap();
    (h, token)
}

#[tokio::test]
async fn events_need_both_bounds() {
    let (h, token) = seeded(Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    for uri in [
        "/api/calendar/events",
        "/api/calendar/events?start=2024-01-01T00:00:00Z",
        "/api/calendar/events?start=monday&end=2024-01-08T00:00:00Z",
    ] {
        let response = get(&h.app, uri, Some(&token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing start or end"})
        );
    }
}

#[tokio::test]
async fn events_without_credential_ask_to_sign_in_again() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );
    let identity = h
        .store
        .create_identity(NewIdentity::new("g1", "a@b.com"))
        .unwrap();
    let token = h.sessions.mint(&identity.id).unwrap();

    let response = get(
        &h.app,
        "/api/calendar/events?start=2024-01-01T00:00:00Z&end=2024-01-08T00:00:00Z",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("sign in"));
}

#[tokio::test]
async fn events_provider_failure_is_500_with_cause() {
    let calendar =
        Arc::new(FakeCalendarSource::new().failing(ProviderError::rate_limited("quota exceeded")));
    let (h, token) = seeded(calendar, AssistantResponder::stub());

    let response = get(
        &h.app,
        "/api/calendar/events?start=2024-01-01T00:00:00Z&end=2024-01-08T00:00:00Z",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

// ── Chat ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_without_backend_is_stubbed() {
    let (h, token) = seeded(Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    let response = post_json(&h.app, "/api/chat", Some(&token), json!({"message": "hello"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"reply": "Stubbed assistant response (LLM_API_KEY missing) for: \"hello\""})
    );
}

#[tokio::test]
async fn chat_rejects_missing_message() {
    let (h, token) = seeded(Arc::new(FakeCalendarSource::new()), AssistantResponder::stub());

    for body in [json!({}), json!({"message": ""}), json!({"history": []})] {
        let response = post_json(&h.app, "/api/chat", Some(&token), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Missing message"}));
    }
}

#[tokio::test]
async fn chat_grounds_reply_in_recent_events() {
    let calendar = Arc::new(FakeCalendarSource::new().with_events("rt-1", week_events()));
    let backend = Arc::new(FakeCompletionBackend::new().replying("gemini-2.5-flash", "You have two events."));
    let assistant = AssistantResponder::new(Some(backend.clone()), AssistantSettings::default());
    let (h, token) = seeded(Arc::clone(&calendar), assistant);

    let response = post_json(
        &h.app,
        "/api/chat",
        Some(&token),
        json!({
            "message": "What is on my plate?",
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"reply": "You have two events."}));

    let window = calendar.calls()[0].1;
    assert_eq!(window.end - window.start, Duration::days(21));
    let now = Utc::now();
    assert!(window.start <= now && now < window.end);

    let call = backend.calls().remove(0);
    assert_eq!(call.history.len(), 2);
    assert!(call.system_prompt.contains("- Standup: 2024-01-02T09:00:00Z to 2024-01-02T09:15:00Z with ana@example.com, bo@example.com"));
    assert!(call.system_prompt.contains("- Offsite: 2024-01-05 to 2024-01-06"));
}

#[tokio::test]
async fn chat_survives_calendar_failure() {
    let calendar = Arc::new(FakeCalendarSource::new().failing(ProviderError::server("calendar down")));
    let backend = Arc::new(FakeCompletionBackend::new().replying("gemini-2.5-flash", "No events, but hi."));
    let assistant = AssistantResponder::new(Some(backend.clone()), AssistantSettings::default());
    let (h, token) = seeded(calendar, assistant);

    let response = post_json(&h.app, "/api/chat", Some(&token), json!({"message": "hi"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"reply": "No events, but hi."}));
    assert!(backend.calls()[0]
        .system_prompt
        .ends_with("You have no events in the selected time range."));
}

#[tokio::test]
async fn chat_falls_back_then_apologizes() {
    let backend = Arc::new(
        FakeCompletionBackend::new()
            .failing("gemini-2.5-flash", ProviderError::authentication("API key not valid"))
            .failing("gemini-flash-latest", ProviderError::authentication("API key not valid")),
    );
    let assistant = AssistantResponder::new(Some(backend.clone()), AssistantSettings::default());
    let (h, token) = seeded(Arc::new(FakeCalendarSource::new()), assistant);

    let response = post_json(&h.app, "/api/chat", Some(&token), json!({"message": "hi"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"reply": calassist_server::assistant::DEFAULT_FALLBACK_REPLY})
    );
    assert_eq!(
        backend.attempted_models(),
        vec!["gemini-2.5-flash", "gemini-flash-latest"]
    );
}

// ── CORS ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cors_allows_only_client_origin() {
    let h = harness(
        FakeIdentityProvider::new(),
        Arc::new(FakeCalendarSource::new()),
        AssistantResponder::stub(),
    );

    let allowed = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        ORIGIN
    );

    let foreign = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(foreign
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
