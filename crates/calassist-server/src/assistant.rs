//! Assistant Responder.
//!
//! Grounds the conversation in the user's events and walks an ordered list
//! of candidate models until one answers. The responder never fails: without
//! a backend it returns a deterministic stub, and when every candidate fails
//! it returns the configured apology.

use std::sync::Arc;
use std::time::Duration;

use calassist_core::{ChatTurn, NormalizedEvent};
use calassist_providers::CompletionBackend;
use tracing::{debug, error, warn};

use crate::prompt::system_prompt;

/// Candidate models tried in order.
pub const DEFAULT_MODELS: [&str; 2] = ["gemini-2.5-flash", "gemini-flash-latest"];

/// Reply returned when every candidate model failed.
pub const DEFAULT_FALLBACK_REPLY: &str = "I apologize, but I am having trouble connecting to my brain right now. Please ensure your API key is valid.";

pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// Fallback chain settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSettings {
    pub models: Vec<String>,
    pub fallback_reply: String,
    /// Upper bound for one model attempt.
    pub attempt_timeout: Duration,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
        }
    }
}

pub struct AssistantResponder {
    backend: Option<Arc<dyn CompletionBackend>>,
    settings: AssistantSettings,
}

impl AssistantResponder {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>, settings: AssistantSettings) -> Self {
        Self { backend, settings }
    }

    /// A responder without a backend; every reply is the stub.
    pub fn stub() -> Self {
        Self::new(None, AssistantSettings::default())
    }

    pub async fn reply(
        &self,
        message: &str,
        history: &[ChatTurn],
        events: &[NormalizedEvent],
    ) -> String {
        let Some(backend) = self.backend.as_deref() else {
            warn!("no LLM API key configured, returning stub reply");
            return stub_reply(message);
        };

        let prompt = system_prompt(events);

        for model in &self.settings.models {
            let attempt = backend.complete_chat(model, &prompt, history, message);
            match tokio::time::timeout(self.settings.attempt_timeout, attempt).await {
                Ok(Ok(reply)) => {
                    debug!(backend = backend.name(), model = %model, "assistant replied");
                    return reply;
                }
                Ok(Err(err)) => {
                    warn!(backend = backend.name(), model = %model, error = %err, "model failed, trying next candidate");
                }
                Err(_) => {
                    warn!(
                        backend = backend.name(),
                        model = %model,
                        timeout_secs = self.settings.attempt_timeout.as_secs(),
                        "model timed out, trying next candidate"
                    );
                }
            }
        }

        error!(
            backend = backend.name(),
            candidates = self.settings.models.len(),
            "all candidate models failed"
        );
        self.settings.fallback_reply.clone()
    }
}

/// Deterministic reply used when no backend is configured.
pub fn stub_reply(message: &str) -> String {
    format!(
        "Stubbed assistant response (LLM_API_KEY missing) for: \"{}\"",
        message
    )
}
