//! Google identity and calendar provider.
//!
//! Two clients share one [`GoogleConfig`]:
//!
//! - [`GoogleOAuthClient`] - authorization URL, code exchange, token refresh
//!   and userinfo lookup; implements [`IdentityProvider`](crate::IdentityProvider)
//! - [`GoogleCalendarClient`] - paginated event listing for one calendar
//!
//! [`GoogleCalendarSource`] combines them into a
//! [`CalendarSource`](crate::CalendarSource) that authorizes every listing
//! with a stored refresh token.

mod client;
mod config;
mod oauth;
mod provider;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, GoogleCredentialsFile, GoogleEndpoints, OAuthCredentials};
pub use oauth::GoogleOAuthClient;
pub use provider::GoogleCalendarSource;

use reqwest::StatusCode;

use crate::error::{ProviderError, ProviderResult};

/// Provider name attached to errors.
pub(crate) const PROVIDER_NAME: &str = "google";

pub(crate) fn build_http_client(config: &GoogleConfig) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| {
            ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                .with_provider(PROVIDER_NAME)
        })
}

/// Maps a non-success Google status to a provider error.
pub(crate) fn status_error(context: &str, status: StatusCode, body: &str) -> ProviderError {
    ProviderError::from_status(status, format!("{} ({}): {}", context, status, body))
        .with_provider(PROVIDER_NAME)
}
