//! Configuration loading and representation.
//!
//! Everything is read once at startup and passed into constructors; nothing
//! here is process-global.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration for the store, engine and request layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    /// Extra commit attempts after a concurrent writer won the race.
    pub max_conflict_retries: u32,
    /// Deadline for one request-scoped engine operation.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let bind_addr = lookup("DEPOT_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let db_max_connections = parse_or(
            &lookup,
            "DEPOT_DB_MAX_CONNECTIONS",
            defaults.db_max_connections,
        )?;
        let max_conflict_retries = parse_or(
            &lookup,
            "DEPOT_MAX_CONFLICT_RETRIES",
            defaults.max_conflict_retries,
        )?;
        let timeout_ms = parse_or(
            &lookup,
            "DEPOT_REQUEST_TIMEOUT_MS",
            defaults.request_timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "DEPOT_REQUEST_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            max_conflict_retries,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
