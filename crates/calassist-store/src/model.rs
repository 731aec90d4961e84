//! Persisted records and their write payloads.

use chrono::{DateTime, Utc};

/// One end user, linked to exactly one provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Internal id (UUIDv4), immutable.
    pub id: String,
    /// Provider account id, unique across identities.
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for [`Store::create_identity`](crate::Store::create_identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
}

impl NewIdentity {
    pub fn new(external_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Partial update of the mutable identity fields.
///
/// `None` leaves a field as it is. `name: Some(None)` clears the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub email: Option<String>,
    pub name: Option<Option<String>>,
}

impl IdentityUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none()
    }
}

/// The active refresh-capable grant of one identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub identity_id: String,
    pub refresh_secret: String,
    pub access_secret: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identity_id", &self.identity_id)
            .field("refresh_secret", &"<redacted>")
            .field("access_secret", &self.access_secret.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Payload for [`Store::upsert_credential`](crate::Store::upsert_credential).
#[derive(Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub identity_id: String,
    pub refresh_secret: String,
    pub access_secret: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCredential {
    pub fn new(identity_id: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            refresh_secret: refresh_secret.into(),
            access_secret: None,
            scope: None,
            expires_at: None,
        }
    }

    pub fn with_access_secret(mut self, secret: Option<String>) -> Self {
        self.access_secret = secret;
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

impl std::fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewCredential")
            .field("identity_id", &self.identity_id)
            .field("refresh_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
