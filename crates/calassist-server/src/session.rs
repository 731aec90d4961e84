//! Session tokens.
//!
//! A session is a stateless HS256 JWT `{sub, iat, exp}` whose subject is the
//! internal identity id. Validity is a fixed eight-hour window with no leeway
//! and no server-side revocation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session lifetime in seconds.
pub const SESSION_TTL_SECS: i64 = 8 * 3600;

pub fn session_ttl() -> Duration {
    Duration::seconds(SESSION_TTL_SECS)
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal identity id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(identity_id: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            sub: identity_id.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + session_ttl()).timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("session token expired")]
    Expired,

    #[error("invalid session token")]
    Invalid,
}

/// Mints and verifies session tokens with one shared secret.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer").finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mints a token for `identity_id`, valid from now.
    pub fn mint(&self, identity_id: &str) -> Result<String, SessionError> {
        self.mint_at(identity_id, Utc::now())
    }

    /// Mints a token as if issued at `issued_at`.
    pub fn mint_at(&self, identity_id: &str, issued_at: DateTime<Utc>) -> Result<String, SessionError> {
        let claims = SessionClaims::new(identity_id, issued_at);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(SessionError::Signing)
    }

    /// Verifies `token` and returns the identity id it was minted for.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            },
        )?;

        if data.claims.sub.is_empty() {
            return Err(SessionError::Invalid);
        }
        Ok(data.claims.sub)
    }
}
