//! Server error types.
//!
//! [`ServerError`] covers startup (config, database, listener). [`ApiError`]
//! is the request-level taxonomy and knows how to render itself as an HTTP
//! response.

use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use calassist_core::TracingError;
use calassist_providers::ProviderError;
use calassist_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Result type for server startup operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, config file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tracing error: {0}")]
    Tracing(#[from] TracingError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Request-level failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The identity provider rejected the authorization code.
    #[error("Invalid authorization code")]
    InvalidGrant(#[source] ProviderError),

    /// The provider profile lacks an account id or an email.
    #[error("Invalid Google profile")]
    InvalidProfile,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The identity has no stored refresh credential.
    #[error("No Google credentials on file; sign in with Google again")]
    NoCredential,

    #[error("{0}")]
    CalendarFetchFailed(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidGrant(_) | Self::InvalidProfile | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated(_) | Self::NoCredential => StatusCode::UNAUTHORIZED,
            Self::ConstraintViolation(_) => StatusCode::CONFLICT,
            Self::CalendarFetchFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            Self::Internal(detail) => error!(detail = %detail, "internal error"),
            Self::CalendarFetchFailed(cause) => error!(cause = %cause, "calendar fetch failed"),
            _ => {}
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation { message } => Self::ConstraintViolation(message),
            StoreError::InvalidInput { message } => Self::Validation(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Plain-text rendering for the browser-facing OAuth callback.
///
/// Only the provider-rejection and input cases keep their own message; every
/// other failure collapses to one generic 500.
#[derive(Debug)]
pub struct CallbackError(pub ApiError);

impl From<ApiError> for CallbackError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self.0 {
            err @ (ApiError::InvalidGrant(_) | ApiError::InvalidProfile | ApiError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            err => {
                error!(error = %err, detail = ?err, "Google authentication failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to complete Google authentication",
                )
                    .into_response()
            }
        }
    }
}
