//! Server configuration.
//!
//! Settings live in an optional `config.toml` (by default
//! `~/.config/calassist/config.toml`). Command-line flags and environment
//! variables override the file, then [`ServerConfig::resolve`] expands secret
//! references and validates everything into runtime [`Settings`].
//!
//! Secret values (`jwt_secret`, `google.client_secret`, `llm.api_key`)
//! support secret references:
//! - `pass::path/in/store` - resolved via `pass show`
//! - `env::VAR_NAME` - resolved from the environment
//! - plain text - used as-is

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use calassist_providers::{GeminiConfig, GoogleConfig, GoogleEndpoints, OAuthCredentials};
use serde::{Deserialize, Serialize};

use crate::assistant::{AssistantSettings, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_FALLBACK_REPLY, DEFAULT_MODELS};
use crate::error::{ServerError, ServerResult};
use crate::secret;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:4000";
pub const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:4000/auth/google/callback";
pub const DEFAULT_DATABASE_PATH: &str = "data/calendar-assistant.db";

// ---------------------------------------------------------------------------
// ServerConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the calassist server, as written in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub listen: String,

    /// Replaces the port of `listen` when set.
    pub port: Option<u16>,

    /// Browser client origin.
    pub client_origin: String,

    /// Session signing secret (supports `pass::` and `env::` prefixes).
    pub jwt_secret: Option<String>,

    pub google: GoogleSettings,

    pub llm: LlmSettings,

    pub database: DatabaseSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: None,
            client_origin: DEFAULT_CLIENT_ORIGIN.to_string(),
            jwt_secret: None,
            google: GoogleSettings::default(),
            llm: LlmSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

/// Google OAuth and Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Google Cloud Console credentials JSON, used when the inline client
    /// id is not set.
    pub credentials_file: Option<PathBuf>,

    pub redirect_uri: String,

    pub timeout_secs: u64,

    /// Points every Google endpoint at another host.
    pub api_base: Option<String>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            credentials_file: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            api_base: None,
        }
    }
}

/// Completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API key; unset means stub replies.
    pub api_key: Option<String>,

    pub base_url: Option<String>,

    /// Candidate models, tried in order.
    pub models: Vec<String>,

    /// Reply used once every model has failed.
    pub fallback_reply: String,

    pub attempt_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// Values from flags and environment that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub port: Option<u16>,
    pub client_origin: Option<String>,
    pub jwt_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub llm_api_key: Option<String>,
    pub db_path: Option<PathBuf>,
}

/// Fully resolved runtime settings.
pub struct Settings {
    pub listen: SocketAddr,
    /// Client origin without a trailing `/`.
    pub client_origin: String,
    pub jwt_secret: String,
    pub google: GoogleConfig,
    /// `None` when no LLM API key is configured.
    pub gemini: Option<GeminiConfig>,
    pub assistant: AssistantSettings,
    pub database_path: PathBuf,
}

impl ServerConfig {
    /// Loads configuration from the default path, or defaults when the file
    /// does not exist.
    pub fn load_default() -> ServerResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ServerError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calassist")
            .join("config.toml")
    }

    /// Applies command-line and environment overrides.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if overrides.port.is_some() {
            self.port = overrides.port;
        }
        if let Some(origin) = overrides.client_origin {
            self.client_origin = origin;
        }
        if overrides.jwt_secret.is_some() {
            self.jwt_secret = overrides.jwt_secret;
        }
        if overrides.google_client_id.is_some() {
            self.google.client_id = overrides.google_client_id;
        }
        if overrides.google_client_secret.is_some() {
            self.google.client_secret = overrides.google_client_secret;
        }
        if let Some(uri) = overrides.google_redirect_uri {
            self.google.redirect_uri = uri;
        }
        if overrides.llm_api_key.is_some() {
            self.llm.api_key = overrides.llm_api_key;
        }
        if let Some(path) = overrides.db_path {
            self.database.path = path;
        }
    }

    /// Resolves secret references and validates the configuration.
    pub fn resolve(&self) -> ServerResult<Settings> {
        let mut listen: SocketAddr = self.listen.parse().map_err(|e| {
            ServerError::config(format!("invalid listen address '{}': {}", self.listen, e))
        })?;
        if let Some(port) = self.port {
            listen.set_port(port);
        }

        let client_origin = self.client_origin.trim_end_matches('/').to_string();
        url::Url::parse(&client_origin).map_err(|e| {
            ServerError::config(format!("invalid client_origin '{}': {}", client_origin, e))
        })?;

        let jwt_secret = secret::resolve_optional(self.jwt_secret.as_deref())
            .map_err(|e| ServerError::config(format!("failed to resolve jwt_secret: {}", e)))?
            .ok_or_else(|| ServerError::config("jwt_secret is required (set JWT_SECRET)"))?;

        let google = self.google.to_provider_config()?;
        let gemini = self.llm.to_gemini_config()?;

        if self.llm.models.is_empty() {
            return Err(ServerError::config("llm.models must list at least one model"));
        }
        if self.llm.attempt_timeout_secs == 0 {
            return Err(ServerError::config("llm.attempt_timeout_secs must be greater than 0"));
        }
        let assistant = AssistantSettings {
            models: self.llm.models.clone(),
            fallback_reply: self.llm.fallback_reply.clone(),
            attempt_timeout: Duration::from_secs(self.llm.attempt_timeout_secs),
        };

        Ok(Settings {
            listen,
            client_origin,
            jwt_secret,
            google,
            gemini,
            assistant,
            database_path: self.database.path.clone(),
        })
    }
}

impl GoogleSettings {
    /// Builds the provider configuration, resolving credentials.
    pub fn to_provider_config(&self) -> ServerResult<GoogleConfig> {
        let credentials = self.resolve_credentials()?;

        let mut config = GoogleConfig::new(credentials, &self.redirect_uri)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(ref base) = self.api_base {
            config = config.with_endpoints(GoogleEndpoints::with_base(base));
        }

        config
            .validate()
            .map_err(|e| ServerError::config(format!("invalid [google] settings: {}", e)))?;
        Ok(config)
    }

    /// Resolves OAuth client credentials from the inline fields, falling
    /// back to `credentials_file`.
    fn resolve_credentials(&self) -> ServerResult<OAuthCredentials> {
        if self.client_id.is_none() {
            if let Some(ref path) = self.credentials_file {
                return OAuthCredentials::from_file(path).map_err(ServerError::config);
            }
        }

        let client_id = secret::resolve_optional(self.client_id.as_deref())
            .map_err(|e| ServerError::config(format!("failed to resolve client_id: {}", e)))?
            .ok_or_else(|| {
                ServerError::config("google.client_id is required (set GOOGLE_CLIENT_ID)")
            })?;
        let client_secret = secret::resolve_optional(self.client_secret.as_deref())
            .map_err(|e| ServerError::config(format!("failed to resolve client_secret: {}", e)))?
            .ok_or_else(|| {
                ServerError::config("google.client_secret is required (set GOOGLE_CLIENT_SECRET)")
            })?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}

impl LlmSettings {
    /// Returns the backend configuration, or `None` without an API key.
    pub fn to_gemini_config(&self) -> ServerResult<Option<GeminiConfig>> {
        let Some(api_key) = secret::resolve_optional(self.api_key.as_deref())
            .map_err(|e| ServerError::config(format!("failed to resolve llm.api_key: {}", e)))?
        else {
            return Ok(None);
        };

        let mut config = GeminiConfig::new(api_key);
        if let Some(ref base) = self.base_url {
            config = config.with_base_url(base);
        }
        Ok(Some(config))
    }
}
