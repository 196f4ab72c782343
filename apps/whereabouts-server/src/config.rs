//! Server configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! # Store location (first match wins)
//! DATABASE_URL=sqlite:///var/lib/whereabouts/store.db
//! WHEREABOUTS_DB_PATH=/var/lib/whereabouts/store.db
//! # otherwise ~/.whereabouts/store.db
//!
//! # Log filter (falls back to RUST_LOG, then "info")
//! WHEREABOUTS_LOG=whereabouts_server=debug
//! ```

use std::env;
use thiserror::Error;
use whereabouts_storage::StoreError;
use whereabouts_store_sqlite::SqliteStore;

const DEFAULT_LOG_FILTER: &str = "info";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite URL; `None` means `~/.whereabouts/store.db`
    pub database_url: Option<String>,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is set but empty")]
    EmptyEnvVar(String),

    #[error("Unsupported database URL: {0}. Expected a sqlite: URL")]
    UnsupportedDatabaseUrl(String),
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = if let Some(url) = read_var("DATABASE_URL")? {
            Some(validate_url(url)?)
        } else {
            read_var("WHEREABOUTS_DB_PATH")?.map(|path| format!("sqlite://{}", path))
        };

        let log_filter = read_var("WHEREABOUTS_LOG")?
            .or(env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_url,
            log_filter,
        })
    }

    /// Override the store location (e.g. from a CLI flag).
    pub fn with_database_url(mut self, url: String) -> Result<Self, ConfigError> {
        self.database_url = Some(validate_url(url)?);
        Ok(self)
    }

    pub async fn open_store(&self) -> Result<SqliteStore, StoreError> {
        match &self.database_url {
            Some(url) => SqliteStore::open(url).await,
            None => SqliteStore::open_default().await,
        }
    }
}

fn read_var(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(v) if v.trim().is_empty() => Err(ConfigError::EmptyEnvVar(name.to_string())),
        Ok(v) => Ok(Some(v.trim().to_string())),
        Err(_) => Ok(None),
    }
}

fn validate_url(url: String) -> Result<String, ConfigError> {
    if url.starts_with("sqlite:") {
        Ok(url)
    } else {
        Err(ConfigError::UnsupportedDatabaseUrl(url))
    }
}
