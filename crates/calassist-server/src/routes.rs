//! HTTP routes.
//!
//! | method | path                    | auth   |
//! |--------|-------------------------|--------|
//! | GET    | `/health`               | none   |
//! | GET    | `/auth/google/url`      | none   |
//! | GET    | `/auth/google/callback` | none   |
//! | GET    | `/api/calendar/events`  | bearer |
//! | POST   | `/api/chat`             | bearer |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use calassist_core::{ChatTurn, NormalizedEvent, TimeWindow, TimeWindowError};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use url::Url;

use crate::auth::AuthenticatedIdentity;
use crate::error::{ApiError, CallbackError};
use crate::exchange::ExchangeOutcome;
use crate::state::AppState;

/// Days of history given to the assistant.
const CHAT_CONTEXT_DAYS_BACK: i64 = 7;
/// Days of upcoming events given to the assistant.
const CHAT_CONTEXT_DAYS_AHEAD: i64 = 14;

/// Builds the application router with CORS restricted to the client origin.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.client_origin);

    Router::new()
        .route("/health", get(health))
        .route("/auth/google/url", get(google_auth_url))
        .route("/auth/google/callback", get(google_callback))
        .route("/api/calendar/events", get(calendar_events))
        .route("/api/chat", post(chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(origin, "client origin is not a valid header value, CORS disabled");
            layer
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn google_auth_url(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "url": state.exchange.authorize() }))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, CallbackError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::validation("Missing code"))?;

    let outcome = state.exchange.callback(&code).await?;
    let location = client_redirect(&state.client_origin, &outcome)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// `{origin}/auth/callback` carrying the session and profile.
fn client_redirect(origin: &str, outcome: &ExchangeOutcome) -> Result<String, ApiError> {
    let mut url = Url::parse(&format!("{}/auth/callback", origin))
        .map_err(|e| ApiError::internal(format!("invalid client origin '{}': {}", origin, e)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", &outcome.session_token);
        query.append_pair("id", &outcome.identity_id);
        if let Some(ref access) = outcome.access_secret {
            query.append_pair("googleAccessToken", access);
        }
        query.append_pair("email", &outcome.email);
        if let Some(ref name) = outcome.name {
            query.append_pair("name", name);
        }
    }

    Ok(url.into())
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Serialize)]
struct EventsResponse {
    events: Vec<NormalizedEvent>,
}

async fn calendar_events(
    AuthenticatedIdentity(identity_id): AuthenticatedIdentity,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let window = match (query.start, query.end) {
        (Some(start), Some(end)) => TimeWindow::parse(&start, &end).map_err(|e| match e {
            TimeWindowError::InvalidInstant { .. } => ApiError::validation("Missing start or end"),
            inverted => ApiError::validation(inverted.to_string()),
        })?,
        _ => return Err(ApiError::validation("Missing start or end")),
    };

    let events = state.calendar.list_events(&identity_id, window).await?;
    debug!(identity_id = %identity_id, events = events.len(), "serving calendar events");
    Ok(Json(EventsResponse { events }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: Option<String>,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
}

async fn chat(
    AuthenticatedIdentity(identity_id): AuthenticatedIdentity,
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "rejected chat body");
        ApiError::validation("Missing message")
    })?;
    let message = request
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::validation("Missing message"))?;

    let window = TimeWindow::around(
        Utc::now(),
        Duration::days(CHAT_CONTEXT_DAYS_BACK),
        Duration::days(CHAT_CONTEXT_DAYS_AHEAD),
    );
    let events = match state.calendar.list_events(&identity_id, window).await {
        Ok(events) => events,
        Err(err) => {
            warn!(identity_id = %identity_id, error = %err, "calendar context unavailable, chatting without events");
            Vec::new()
        }
    };

    let reply = state
        .assistant
        .reply(&message, &request.history, &events)
        .await;
    Ok(Json(ChatResponse { reply }))
}
