//! Capability traits for the external collaborators.
//!
//! The application never reaches a provider SDK or a global client: it is
//! handed small, object-safe capabilities that can be swapped for fakes.
//!
//! - [`IdentityProvider`] - OAuth authorization URL, code exchange, profile
//! - [`CalendarSource`] - primary-calendar event listing
//! - [`CompletionBackend`] - one chat completion against one model

use std::future::Future;
use std::pin::Pin;

use calassist_core::{ChatTurn, TimeWindow};
use chrono::{DateTime, Utc};

use crate::error::ProviderResult;
use crate::raw_event::RawEvent;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so they can be stored as
/// `Arc<dyn Trait>` in application state.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The token set returned by an authorization-code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Short-lived access token for API calls.
    pub access_token: String,
    /// Long-lived refresh token. Providers may omit it on repeat consent.
    pub refresh_token: Option<String>,
    /// Space-separated scopes actually granted.
    pub scope: Option<String>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            scope: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns the refresh token if present and non-empty.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// The user profile as reported by the identity provider.
///
/// Every field is optional on the wire; the exchange decides which are
/// required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    /// The provider's stable account identifier.
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// OAuth 2.0 authorization-code identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Builds the consent URL the user agent is sent to.
    ///
    /// Requests offline access and forces the consent screen so a refresh
    /// token is issued even for returning users.
    fn authorization_url(&self) -> String;

    /// Exchanges a one-shot authorization code for a token set.
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenSet>>;

    /// Fetches the profile of the account that granted `access_token`.
    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<ProviderProfile>>;
}

/// Read access to a user's primary calendar.
pub trait CalendarSource: Send + Sync {
    /// Lists events of the primary calendar inside `window`.
    ///
    /// Authorizes with `refresh_token` alone. Recurring events are expanded
    /// into instances and results are ordered by start time.
    fn list_primary_events<'a>(
        &'a self,
        refresh_token: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>>;
}

/// A chat-completion backend.
pub trait CompletionBackend: Send + Sync {
    /// Returns the backend name used in logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Runs one completion: `history` is the prior conversation and
    /// `message` the new user turn.
    fn complete_chat<'a>(
        &'a self,
        model: &'a str,
        system_prompt: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>>;
}
