//! Gemini chat-completion backend.

mod client;
mod config;

pub use client::GeminiClient;
pub use config::GeminiConfig;

/// Provider name attached to errors.
pub(crate) const PROVIDER_NAME: &str = "gemini";
