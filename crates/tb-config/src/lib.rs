//! # tb-config
//!
//! Layered runtime settings: built-in defaults, then an optional
//! `tallyboard.toml`, then `TALLYBOARD__*` environment variables
//! (`TALLYBOARD__AUTH__JWT_SECRET` sets `auth.jwt_secret`). A `.env` file in the
//! working directory is loaded into the environment first.

use config::{Config, Environment, File, Source};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "TALLYBOARD";
const DEFAULT_FILE: &str = "tallyboard";
const MIN_SECRET_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
    /// Overall per-request deadline; the only cancellation boundary.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_hours: i64,
    /// Accounts registered under these handles get the admin role.
    pub admin_handles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Settings {
    /// Reads `.env`, `tallyboard.toml` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.admin_handles")
            .try_parsing(true);
        Self::build(File::with_name(DEFAULT_FILE).required(false), env)
    }

    /// Defaults, then `file`, then `overrides`; later sources win.
    pub fn build<F, O>(file: F, overrides: O) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
        O: Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .set_default("server.bind", "0.0.0.0:3030")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("auth.token_ttl_hours", 24)?
            .set_default("auth.admin_handles", Vec::<String>::new())?
            .set_default("store.backend", "memory")?
            .set_default("store.sqlite_url", "sqlite://tallyboard.db")?
            .set_default("store.timeout_secs", 5)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(file)
            .add_source(overrides)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_hours must be positive".into()));
        }
        if self.server.request_timeout_secs == 0 || self.store.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}
