//! OAuth 2.0 authorization-code flow for Google web clients.
//!
//! The server never holds intermediate flow state: the authorization URL is
//! built on demand and the code arrives on the registered redirect URI.
//!
//! # Flow Overview
//!
//! 1. Send the user agent to [`GoogleOAuthClient::authorization_url`]
//! 2. Google redirects back with a one-shot `code`
//! 3. Exchange the code for an access token and a refresh token
//! 4. Look up the account profile with the access token
//! 5. Later requests trade the stored refresh token for fresh access tokens

use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, IdentityProvider, ProviderProfile, TokenSet};

use super::config::GoogleConfig;
use super::{PROVIDER_NAME, build_http_client, status_error};

/// OAuth client for Google APIs.
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    config: GoogleConfig,
    http_client: reqwest::Client,
}

impl GoogleOAuthClient {
    /// Creates a new OAuth client.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let http_client = build_http_client(&config)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Builds the consent URL with offline access and a forced consent screen.
    pub fn build_auth_url(&self) -> String {
        let scope = self.config.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.config.endpoints.auth_url,
            urlencoding::encode(&self.config.credentials.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope),
        )
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_authorization_code(&self, code: &str) -> ProviderResult<TokenSet> {
        let params = [
            ("client_id", self.config.credentials.client_id.as_str()),
            ("client_secret", self.config.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let token_response = self.post_token_form(&params, "token exchange failed").await?;
        info!("successfully obtained tokens");
        Ok(token_response.into_token_set())
    }

    /// Trades a refresh token for a fresh access token.
    ///
    /// Google does not rotate refresh tokens here, so the returned set
    /// normally carries no refresh token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> ProviderResult<TokenSet> {
        let params = [
            ("client_id", self.config.credentials.client_id.as_str()),
            ("client_secret", self.config.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.post_token_form(&params, "token refresh failed").await?;
        debug!("refreshed access token");
        Ok(token_response.into_token_set())
    }

    /// Fetches the userinfo profile for the account behind `access_token`.
    pub async fn userinfo(&self, access_token: &str) -> ProviderResult<ProviderProfile> {
        let response = self
            .http_client
            .get(&self.config.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                ProviderError::from_transport("userinfo request failed", e)
                    .with_provider(PROVIDER_NAME)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::from_transport("failed to read userinfo response", e)
                .with_provider(PROVIDER_NAME)
        })?;

        if !status.is_success() {
            return Err(status_error("userinfo lookup failed", status, &body));
        }

        let info: UserInfoResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid userinfo response: {}", e))
                .with_provider(PROVIDER_NAME)
        })?;

        Ok(ProviderProfile {
            external_id: info.id,
            email: info.email,
            name: info.name,
        })
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.config.endpoints.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::from_transport("token request failed", e)
                    .with_provider(PROVIDER_NAME)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::from_transport("failed to read token response", e)
                .with_provider(PROVIDER_NAME)
        })?;

        if !status.is_success() {
            return Err(status_error(context, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_provider(PROVIDER_NAME)
        })
    }
}

impl IdentityProvider for GoogleOAuthClient {
    fn authorization_url(&self) -> String {
        self.build_auth_url()
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenSet>> {
        Box::pin(self.exchange_authorization_code(code))
    }

    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<ProviderProfile>> {
        Box::pin(self.userinfo(access_token))
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_token_set(self) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        }
    }
}

/// Response from the userinfo v2 endpoint.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
}
