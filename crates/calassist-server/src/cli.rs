//! Command-line interface definition.

use std::path::PathBuf;

use calassist_core::{TracingConfig, TracingError, TracingOutputFormat};
use clap::Parser;
use tracing::Level;

use crate::config::ConfigOverrides;

/// calassist - Google Calendar assistant API
#[derive(Debug, Parser)]
#[command(name = "calassist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Log filter directive; replaces RUST_LOG and --debug
    #[arg(long, env = "CALASSIST_LOG")]
    pub log_filter: Option<String>,

    // --- Listener ---
    /// Address to listen on
    #[arg(long, env = "CALASSIST_LISTEN")]
    pub listen: Option<String>,

    /// Port to listen on (replaces the port of the listen address)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Browser client origin, used for CORS and the sign-in redirect
    #[arg(long, env = "CLIENT_ORIGIN")]
    pub client_origin: Option<String>,

    // --- Secrets and credentials ---
    /// Session signing secret (supports `pass::` and `env::` references)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// OAuth client ID (from Google Cloud Console)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// OAuth client secret (from Google Cloud Console)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// OAuth redirect URI registered with Google
    #[arg(long, env = "GOOGLE_REDIRECT_URI")]
    pub google_redirect_uri: Option<String>,

    /// LLM API key; without one the assistant returns stub replies
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    // --- Storage ---
    /// Path to the SQLite database
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,
}

impl Cli {
    /// Logging setup for the chosen format. JSON output gets the service
    /// profile with source locations and request timings.
    pub fn tracing_config(&self) -> Result<TracingConfig, TracingError> {
        let format: TracingOutputFormat = self.log_format.parse()?;
        let level = if self.debug { Level::DEBUG } else { Level::INFO };

        let mut config = match format {
            TracingOutputFormat::Json => TracingConfig::service(),
            other => TracingConfig::default().with_format(other),
        }
        .with_level(level);

        if let Some(ref filter) = self.log_filter {
            config = config.with_env_filter(filter.clone());
        }
        Ok(config)
    }

    /// Settings given on the command line or through the environment.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            port: self.port,
            client_origin: self.client_origin.clone(),
            jwt_secret: self.jwt_secret.clone(),
            google_client_id: self.google_client_id.clone(),
            google_client_secret: self.google_client_secret.clone(),
            google_redirect_uri: self.google_redirect_uri.clone(),
            llm_api_key: self.llm_api_key.clone(),
            db_path: self.db_path.clone(),
        }
    }
}
