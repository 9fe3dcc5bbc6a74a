//! Configuration types, read from the environment.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 8000;

/// Storage configuration.
///
/// A missing connection string is not an error: storage falls back to the
/// in-memory backend.
#[derive(Debug, Default)]
pub struct StorageConfig {
    /// External database connection string (`libsql://…`, `https://…`, a file path or `:memory:`).
    pub database_url: Option<String>,
    /// Auth token for remote libSQL databases.
    pub auth_token: Option<SecretString>,
}

impl StorageConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url =
            non_blank(lookup("EMOGO_DATABASE_URL")).or_else(|| non_blank(lookup("DATABASE_URL")));
        let auth_token = non_blank(lookup("EMOGO_DATABASE_AUTH_TOKEN")).map(SecretString::from);

        Self {
            database_url,
            auth_token,
        }
    }

    /// Configuration pointing at an external database.
    pub fn with_database_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            auth_token: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = non_blank(lookup("EMOGO_HOST")).unwrap_or(defaults.host);

        let port = match non_blank(lookup("EMOGO_PORT")).or_else(|| non_blank(lookup("PORT"))) {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "EMOGO_PORT".to_string(),
                message: format!("{raw:?} is not a valid port: {e}"),
            })?,
            None => defaults.port,
        };

        Ok(Self { host, port })
    }

    /// `host:port` string for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
