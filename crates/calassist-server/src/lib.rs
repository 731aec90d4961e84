//! Calendar assistant HTTP API.
//!
//! This crate wires the credential store, the Google providers and the
//! completion backend into an axum service:
//! - Google sign-in (authorization URL and callback) issuing session tokens
//! - Bearer-authenticated calendar event listing
//! - Bearer-authenticated assistant chat grounded in the user's events
//!
//! # Example
//!
//! ```rust,no_run
//! use calassist_server::{ServerConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ServerConfig::load_default()?.resolve()?;
//!     serve(settings).await?;
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod auth;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod exchange;
pub mod prompt;
pub mod routes;
pub mod secret;
pub mod session;
pub mod signals;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;

use calassist_providers::{
    CompletionBackend, GeminiClient, GoogleCalendarSource, GoogleOAuthClient,
};
use calassist_store::Store;
use tracing::info;

pub use assistant::{AssistantResponder, AssistantSettings};
pub use auth::AuthenticatedIdentity;
pub use calendar::CalendarReader;
pub use cli::Cli;
pub use config::{ConfigOverrides, ServerConfig, Settings};
pub use error::{ApiError, CallbackError, ServerError, ServerResult};
pub use exchange::{ExchangeOutcome, OAuthExchange};
pub use routes::router;
pub use session::{SessionClaims, SessionError, SessionIssuer};
pub use signals::{ShutdownSignal, SignalHandler};
pub use state::AppState;

/// Builds the production state: Google providers, Gemini backend when an
/// API key is configured, stub responder otherwise.
pub fn build_state(settings: &Settings, store: Arc<Store>) -> ServerResult<AppState> {
    let identity = GoogleOAuthClient::new(settings.google.clone())?;
    let calendar = GoogleCalendarSource::new(settings.google.clone())?;

    let backend: Option<Arc<dyn CompletionBackend>> = match settings.gemini {
        Some(ref config) => Some(Arc::new(GeminiClient::new(config.clone())?)),
        None => None,
    };
    if backend.is_none() {
        info!("LLM_API_KEY not set, assistant will return stub replies");
    }
    let assistant = AssistantResponder::new(backend, settings.assistant.clone());

    Ok(AppState::new(
        store,
        Arc::new(SessionIssuer::new(&settings.jwt_secret)),
        Arc::new(identity),
        Arc::new(calendar),
        assistant,
        settings.client_origin.clone(),
    ))
}

/// Opens the store, binds the listener and serves until SIGTERM/SIGINT.
pub async fn serve(settings: Settings) -> ServerResult<()> {
    let store = Arc::new(Store::open(&settings.database_path)?);

    let state = build_state(&settings, store)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen).await?;
    info!(address = %settings.listen, origin = %settings.client_origin, "listening");

    let signals = SignalHandler::new();
    signals.spawn_listener();

    axum::serve(listener, app)
        .with_graceful_shutdown(signals.shutdown().wait())
        .await?;

    info!("server stopped");
    Ok(())
}
