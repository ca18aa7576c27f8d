//! Runtime settings.
//!
//! Layered with the `config` crate: an optional TOML file, then `KAIZEN_*`
//! environment variables, then command-line overrides.
//!
//! ```toml
//! api_url = "http://localhost:3001/api/v1/kaizenpro"
//! session_file = "/home/me/.kaizen-session"
//! log = "kaizen_pulse=debug"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::credential::{CredentialSource, SessionFile, StaticCredential};

/// Prefix for environment variables (`KAIZEN_API_URL`, ...).
pub const ENV_PREFIX: &str = "KAIZEN";

/// Default tracing filter.
pub const DEFAULT_LOG: &str = "info";

/// Session file used when none is configured.
pub const DEFAULT_SESSION_FILE: &str = ".kaizen-session";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] config::ConfigError),
}

/// Values given on the command line. `None` leaves lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub session_file: Option<PathBuf>,
    pub log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Base URL of the KaizenPro API; the channel appends `/dashboard`.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Bearer token. Takes precedence over `session_file`.
    #[serde(default)]
    pub token: Option<String>,
    /// File holding the token written by the login flow.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// `tracing` filter directive.
    pub log: String,
}

impl Settings {
    /// Load settings from all layers.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().set_default("log", DEFAULT_LOG)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .set_override_option("api_url", overrides.api_url.clone())?
            .set_override_option("token", overrides.token.clone())?
            .set_override_option(
                "session_file",
                overrides
                    .session_file
                    .as_ref()
                    .map(|p| p.display().to_string()),
            )?
            .set_override_option("log", overrides.log.clone())?
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// The endpoint, or an empty string when unset.
    ///
    /// An empty endpoint is reported by the controller as a configuration
    /// error rather than rejected here.
    pub fn endpoint(&self) -> &str {
        self.api_url.as_deref().unwrap_or_default()
    }

    /// Static token when one is configured, otherwise the session file.
    pub fn credential_source(&self) -> Arc<dyn CredentialSource> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Arc::new(StaticCredential::new(token)),
            _ => {
                let path = self
                    .session_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
                Arc::new(SessionFile::new(path))
            }
        }
    }
}
