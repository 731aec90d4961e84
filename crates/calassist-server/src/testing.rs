//! In-memory implementations of the provider capabilities.
//!
//! Compiled for unit tests and behind the `test-utils` feature, which the
//! integration tests enable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use calassist_core::{ChatTurn, TimeWindow};
use calassist_providers::{
    BoxFuture, CalendarSource, CompletionBackend, IdentityProvider, ProviderError,
    ProviderErrorCode, ProviderProfile, ProviderResult, RawEvent, TokenSet,
};

/// A provider error recipe. `ProviderError` is not `Clone`, so fakes rebuild
/// the error on every call.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    code: ProviderErrorCode,
    message: String,
}

impl ScriptedFailure {
    fn from_error(err: &ProviderError) -> Self {
        Self {
            code: err.code(),
            message: err.message().to_string(),
        }
    }

    fn build(&self) -> ProviderError {
        ProviderError::new(self.code, self.message.clone()).with_provider("fake")
    }
}

/// Identity provider with scripted grants and profiles.
///
/// Unknown codes are rejected like a reused authorization code.
#[derive(Debug, Default)]
pub struct FakeIdentityProvider {
    grants: HashMap<String, TokenSet>,
    exchange_failures: HashMap<String, ScriptedFailure>,
    profiles: HashMap<String, ProviderProfile>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, code: &str, tokens: TokenSet) -> Self {
        self.grants.insert(code.to_string(), tokens);
        self
    }

    pub fn with_exchange_error(mut self, code: &str, err: ProviderError) -> Self {
        self.exchange_failures
            .insert(code.to_string(), ScriptedFailure::from_error(&err));
        self
    }

    /// Registers the profile returned for `access_token`. Empty strings are
    /// reported as missing fields.
    pub fn with_profile(
        mut self,
        access_token: &str,
        external_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Self {
        let present = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        self.profiles.insert(
            access_token.to_string(),
            ProviderProfile {
                external_id: present(external_id),
                email: present(email),
                name: name.and_then(present),
            },
        );
        self
    }
}

impl IdentityProvider for FakeIdentityProvider {
    fn authorization_url(&self) -> String {
        "https://accounts.example.test/o/oauth2/v2/auth?client_id=fake&access_type=offline&prompt=consent"
            .to_string()
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenSet>> {
        Box::pin(async move {
            if let Some(failure) = self.exchange_failures.get(code) {
                return Err(failure.build());
            }
            self.grants
                .get(code)
                .cloned()
                .ok_or_else(|| ProviderError::bad_request("invalid_grant").with_provider("fake"))
        })
    }

    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<ProviderProfile>> {
        Box::pin(async move {
            self.profiles.get(access_token).cloned().ok_or_else(|| {
                ProviderError::authentication("unknown access token").with_provider("fake")
            })
        })
    }
}

/// Calendar source serving fixed events per refresh token.
#[derive(Debug, Default)]
pub struct FakeCalendarSource {
    events: HashMap<String, Vec<RawEvent>>,
    failure: Option<ScriptedFailure>,
    calls: Mutex<Vec<(String, TimeWindow)>>,
}

impl FakeCalendarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events returned for `refresh_token`, in provider order.
    pub fn with_events(mut self, refresh_token: &str, events: Vec<RawEvent>) -> Self {
        self.events.insert(refresh_token.to_string(), events);
        self
    }

    /// Makes every listing fail with `err`.
    pub fn failing(mut self, err: ProviderError) -> Self {
        self.failure = Some(ScriptedFailure::from_error(&err));
        self
    }

    /// Refresh tokens and windows seen so far.
    pub fn calls(&self) -> Vec<(String, TimeWindow)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CalendarSource for FakeCalendarSource {
    fn list_primary_events<'a>(
        &'a self,
        refresh_token: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((refresh_token.to_string(), window));
            }
            if let Some(ref failure) = self.failure {
                return Err(failure.build());
            }
            self.events.get(refresh_token).cloned().ok_or_else(|| {
                ProviderError::bad_request("invalid_grant").with_provider("fake")
            })
        })
    }
}

/// One recorded completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCall {
    pub model: String,
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
}

#[derive(Debug, Clone)]
enum ModelBehavior {
    Reply(String),
    Fail(ScriptedFailure),
    Stall(Duration),
}

/// Completion backend with per-model scripted behavior.
///
/// Models without a script fail as unknown.
#[derive(Debug, Default)]
pub struct FakeCompletionBackend {
    models: HashMap<String, ModelBehavior>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl FakeCompletionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying(mut self, model: &str, reply: &str) -> Self {
        self.models
            .insert(model.to_string(), ModelBehavior::Reply(reply.to_string()));
        self
    }

    pub fn failing(mut self, model: &str, err: ProviderError) -> Self {
        self.models.insert(
            model.to_string(),
            ModelBehavior::Fail(ScriptedFailure::from_error(&err)),
        );
        self
    }

    /// Makes `model` sleep for `delay` before answering.
    pub fn stalling(mut self, model: &str, delay: Duration) -> Self {
        self.models
            .insert(model.to_string(), ModelBehavior::Stall(delay));
        self
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn attempted_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }
}

impl CompletionBackend for FakeCompletionBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn complete_chat<'a>(
        &'a self,
        model: &'a str,
        system_prompt: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(CompletionCall {
                    model: model.to_string(),
                    system_prompt: system_prompt.to_string(),
                    history: history.to_vec(),
                    message: message.to_string(),
                });
            }

            match self.models.get(model) {
                Some(ModelBehavior::Reply(reply)) => Ok(reply.clone()),
                Some(ModelBehavior::Fail(failure)) => Err(failure.build()),
                Some(ModelBehavior::Stall(delay)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(format!("late reply from {}", model))
                }
                None => Err(ProviderError::invalid_response(format!("unknown model {}", model))
                    .with_provider("fake")),
            }
        })
    }
}
