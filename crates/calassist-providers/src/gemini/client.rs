//! HTTP client for the Gemini `generateContent` endpoint.

use calassist_core::{ChatRole, ChatTurn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CompletionBackend};

use super::PROVIDER_NAME;
use super::config::GeminiConfig;

/// Gemini completion backend.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_provider(PROVIDER_NAME)
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Generates a reply for `message` given the prior conversation.
    pub async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url,
            urlencoding::encode(model)
        );
        let request = GenerateContentRequest::new(system_prompt, history, message);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::from_transport("generateContent request failed", e)
                    .with_provider(PROVIDER_NAME)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::from_transport("failed to read generateContent response", e)
                .with_provider(PROVIDER_NAME)
        })?;

        if !status.is_success() {
            return Err(ProviderError::from_status(
                status,
                format!("model {} failed ({}): {}", model, status, body),
            )
            .with_provider(PROVIDER_NAME));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider(PROVIDER_NAME)
        })?;

        let text = parsed.text().ok_or_else(|| {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidate text".to_string());
            ProviderError::invalid_response(format!("model {} returned no reply: {}", model, reason))
                .with_provider(PROVIDER_NAME)
        })?;

        debug!(model, chars = text.len(), "received completion");
        Ok(text)
    }
}

impl CompletionBackend for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn complete_chat<'a>(
        &'a self,
        model: &'a str,
        system_prompt: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(self.generate(model, system_prompt, history, message))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(system_prompt: &'a str, history: &'a [ChatTurn], message: &'a str) -> Self {
        let mut contents: Vec<Content<'a>> = history
            .iter()
            .map(|turn| Content::new(Some(gemini_role(turn.role)), &turn.content))
            .collect();
        contents.push(Content::new(Some("user"), message));

        Self {
            system_instruction: Content::new(None, system_prompt),
            contents,
        }
    }
}

/// Gemini names the assistant side of a conversation `model`.
fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn new(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if non-empty.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
