//! Environment-driven configuration, read once at startup.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `CLASSGUARD_STORE` | `memory`, `postgres` | `memory` |
//! | `DATABASE_URL` | Postgres URL | required for `postgres` |
//! | `CLASSGUARD_DOC_SINK` | `off`, `memory`, `redis` | `memory` |
//! | `REDIS_URL` | Redis URL | `redis://localhost:6379` |
//! | `CLASSGUARD_DOC_RETENTION` | documents kept per in-memory collection | `10000` |
//! | `CLASSGUARD_STRICT_STATUS` | `true`, `false`, `1`, `0` | `false` |

use core::str::FromStr;

use thiserror::Error;

use crate::documents::DEFAULT_RETENTION;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set when {reason}")]
    Missing { var: &'static str, reason: String },

    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentBackend {
    Off,
    #[default]
    Memory,
    Redis,
}

impl FromStr for DocumentBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(DocumentBackend::Off),
            "memory" => Ok(DocumentBackend::Memory),
            "redis" => Ok(DocumentBackend::Redis),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub documents: DocumentBackend,
    pub redis_url: String,
    pub doc_retention: usize,
    pub strict_status_transitions: bool,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            documents: DocumentBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            doc_retention: DEFAULT_RETENTION,
            strict_status_transitions: false,
        }
    }
}

fn parse<T: FromStr>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var, value: v }),
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" || v.is_empty() => Ok(false),
        Some(v) => Err(ConfigError::Invalid { var, value: v }),
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let store = parse("CLASSGUARD_STORE", lookup("CLASSGUARD_STORE"), defaults.store)?;
        let documents = parse("CLASSGUARD_DOC_SINK", lookup("CLASSGUARD_DOC_SINK"), defaults.documents)?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());

        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing {
                var: "DATABASE_URL",
                reason: "CLASSGUARD_STORE=postgres".to_string(),
            });
        }

        Ok(Self {
            store,
            database_url,
            documents,
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            doc_retention: parse("CLASSGUARD_DOC_RETENTION", lookup("CLASSGUARD_DOC_RETENTION"), defaults.doc_retention)?,
            strict_status_transitions: parse_bool("CLASSGUARD_STRICT_STATUS", lookup("CLASSGUARD_STRICT_STATUS"))?,
        })
    }
}
