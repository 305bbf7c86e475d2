//! Typed configuration from environment variables.
//!
//! Loads once at startup. The database path is required; the Anthropic key
//! is optional because the AI analysis call is best-effort and the engine
//! runs fine without it. Sensitive values wrapped in secrecy::SecretString
//! to prevent log leaks.

use secrecy::SecretString;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Optional key for the AI analysis call.
    pub anthropic_api_key: Option<SecretString>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_path: required_var("SITEOPS_DB")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
