//! OAuth exchange orchestration.
//!
//! Two transitions with no persisted intermediate state:
//!
//! 1. [`OAuthExchange::authorize`] hands out the provider consent URL
//! 2. [`OAuthExchange::callback`] turns a one-shot code into a linked
//!    identity, a stored refresh credential and a fresh session

use std::sync::Arc;

use calassist_providers::{IdentityProvider, ProviderProfile, TokenSet};
use calassist_store::{Identity, IdentityUpdate, NewCredential, NewIdentity, Store};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::session::SessionIssuer;

/// Result of a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub session_token: String,
    pub identity_id: String,
    /// Provider access token from this exchange, passed through to the client.
    pub access_secret: Option<String>,
    pub email: String,
    pub name: Option<String>,
}

pub struct OAuthExchange {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<Store>,
    sessions: Arc<SessionIssuer>,
}

impl OAuthExchange {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<Store>,
        sessions: Arc<SessionIssuer>,
    ) -> Self {
        Self {
            provider,
            store,
            sessions,
        }
    }

    pub fn authorize(&self) -> String {
        self.provider.authorization_url()
    }

    pub async fn callback(&self, code: &str) -> Result<ExchangeOutcome, ApiError> {
        let tokens = self.provider.exchange_code(code).await.map_err(|e| {
            if e.code().is_grant_rejection() {
                ApiError::InvalidGrant(e)
            } else {
                ApiError::internal(format!("code exchange failed: {}", e))
            }
        })?;

        let profile = self
            .provider
            .fetch_profile(&tokens.access_token)
            .await
            .map_err(|e| ApiError::internal(format!("profile lookup failed: {}", e)))?;
        let (external_id, email) = required_profile_fields(&profile)?;

        let identity = self.link_identity(external_id, email, profile.name.as_deref())?;
        self.store_credential(&identity, &tokens)?;

        let session_token = self
            .sessions
            .mint(&identity.id)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        info!(identity_id = %identity.id, "completed Google sign-in");
        Ok(ExchangeOutcome {
            session_token,
            identity_id: identity.id,
            access_secret: Some(tokens.access_token).filter(|t| !t.is_empty()),
            email: identity.email,
            name: identity.name,
        })
    }

    /// Finds the identity for `external_id`, creating it on first sign-in.
    ///
    /// Returning users get email and name overwritten with whatever the
    /// provider reported, so a missing name clears the stored one.
    fn link_identity(
        &self,
        external_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<Identity, ApiError> {
        let name = name.filter(|n| !n.is_empty());

        let Some(existing) = self.store.find_identity_by_external_id(external_id)? else {
            let mut new = NewIdentity::new(external_id, email);
            new.name = name.map(str::to_string);
            let created = self.store.create_identity(new)?;
            debug!(identity_id = %created.id, "linked new Google account");
            return Ok(created);
        };

        let update = IdentityUpdate {
            email: Some(email.to_string()),
            name: Some(name.map(str::to_string)),
        };
        self.store.update_identity(&existing.id, update)?;

        Ok(Identity {
            email: email.to_string(),
            name: name.map(str::to_string),
            ..existing
        })
    }

    /// Replaces the stored credential when the grant carries a refresh token.
    fn store_credential(&self, identity: &Identity, tokens: &TokenSet) -> Result<(), ApiError> {
        let Some(refresh) = tokens.usable_refresh_token() else {
            debug!(identity_id = %identity.id, "grant has no refresh token, keeping stored credential");
            return Ok(());
        };

        let credential = NewCredential::new(&identity.id, refresh)
            .with_access_secret(Some(tokens.access_token.clone()).filter(|t| !t.is_empty()))
            .with_scope(tokens.scope.clone())
            .with_expires_at(tokens.expires_at);
        self.store.upsert_credential(credential)?;
        Ok(())
    }
}

fn required_profile_fields(profile: &ProviderProfile) -> Result<(&str, &str), ApiError> {
    let external_id = profile.external_id.as_deref().filter(|s| !s.is_empty());
    let email = profile.email.as_deref().filter(|s| !s.is_empty());
    match (external_id, email) {
        (Some(id), Some(email)) => Ok((id, email)),
        _ => Err(ApiError::InvalidProfile),
    }
}
