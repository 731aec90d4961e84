//! Provider capabilities and their Google/Gemini implementations.
//!
//! This crate provides the seams between the application and the outside
//! world:
//!
//! - [`IdentityProvider`] - OAuth authorization URL, code exchange, profile
//! - [`CalendarSource`] - primary-calendar listing authorized by a refresh token
//! - [`CompletionBackend`] - one chat completion against one model
//! - [`RawEvent`] / [`normalize_events`] - provider events and their normalization
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ GoogleOAuthClient│   │ GoogleCalendarSource │   │ GeminiClient │
//! └────────┬─────────┘   └──────────┬───────────┘   └──────┬───────┘
//!          │                        │                      │
//!   IdentityProvider          CalendarSource       CompletionBackend
//!                                   │
//!                                   ▼
//!                             ┌───────────┐
//!                             │ RawEvent  │
//!                             └─────┬─────┘
//!                                   ▼ normalize_events()
//!                          ┌──────────────────┐
//!                          │ NormalizedEvent  │
//!                          └──────────────────┘
//! ```

pub mod error;
pub mod gemini;
pub mod google;
pub mod normalize;
pub mod provider;
pub mod raw_event;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use google::{
    GoogleCalendarClient, GoogleCalendarSource, GoogleConfig, GoogleEndpoints, GoogleOAuthClient,
    OAuthCredentials,
};
pub use normalize::{normalize_event, normalize_events};
pub use provider::{
    BoxFuture, CalendarSource, CompletionBackend, IdentityProvider, ProviderProfile, TokenSet,
};
pub use raw_event::{RawAttendee, RawEvent, RawEventTime};
