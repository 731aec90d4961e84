//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use calassist_providers::{CalendarSource, IdentityProvider};
use calassist_store::Store;

use crate::assistant::AssistantResponder;
use crate::calendar::CalendarReader;
use crate::exchange::OAuthExchange;
use crate::session::SessionIssuer;

#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<OAuthExchange>,
    pub sessions: Arc<SessionIssuer>,
    pub calendar: Arc<CalendarReader>,
    pub assistant: Arc<AssistantResponder>,
    /// Browser client origin without a trailing `/`.
    pub client_origin: String,
}

impl AppState {
    /// Wires the components around one store and one session issuer.
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionIssuer>,
        identity: Arc<dyn IdentityProvider>,
        calendar: Arc<dyn CalendarSource>,
        assistant: AssistantResponder,
        client_origin: impl Into<String>,
    ) -> Self {
        Self {
            exchange: Arc::new(OAuthExchange::new(
                identity,
                Arc::clone(&store),
                Arc::clone(&sessions),
            )),
            sessions,
            calendar: Arc::new(CalendarReader::new(store, calendar)),
            assistant: Arc::new(assistant),
            client_origin: client_origin.into().trim_end_matches('/').to_string(),
        }
    }
}
