//! Configuration types for the SAP OData engine.
//!
//! Responsibilities:
//! - Define connection settings (base URL, TLS verification, timeout).
//! - Define optional basic-auth credentials.
//! - Define query limits consumed by the client's pagination loop.
//!
//! Does NOT handle:
//! - Loading from env/.env (see `loader` module).
//! - Actual network connections (see client crate).
//!
//! Invariants:
//! - Secrets use `secrecy::SecretString` to prevent accidental logging.
//! - Default values come from `constants`, not inline magic numbers.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_PAGES, DEFAULT_MAX_ROWS, DEFAULT_METADATA_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
};

/// Module for serializing Duration as seconds (integer).
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Basic-auth credentials for an SAP system.
///
/// Anonymous access (no credentials) is valid for some sandbox gateways,
/// so the whole struct is optional on [`Config`].
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Connection settings for the SAP system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the SAP gateway (e.g. `https://sap.example.com:44300`).
    pub base_url: String,
    /// Whether to skip TLS certificate verification (self-signed gateways).
    pub skip_verify: bool,
    /// Request timeout (serialized as seconds).
    #[serde(with = "duration_seconds")]
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            skip_verify: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Caps applied when a query runs with "all rows" semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Maximum rows accumulated across continuation pages.
    pub max_rows: usize,
    /// Maximum continuation pages followed for one query.
    pub max_pages: usize,
    /// Concurrent per-service metadata fetches during discovery.
    pub metadata_concurrency: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            max_pages: DEFAULT_MAX_PAGES,
            metadata_concurrency: DEFAULT_METADATA_CONCURRENCY,
        }
    }
}

/// Complete configuration consumed by the client and CLI.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub credentials: Option<Credentials>,
    pub limits: QueryLimits,
}

impl Config {
    /// Convenience constructor for an anonymous connection.
    pub fn anonymous(base_url: String) -> Self {
        Self {
            connection: ConnectionConfig {
                base_url,
                ..ConnectionConfig::default()
            },
            credentials: None,
            limits: QueryLimits::default(),
        }
    }

    /// Convenience constructor for a basic-auth connection.
    pub fn with_basic_auth(base_url: String, username: String, password: SecretString) -> Self {
        Self {
            connection: ConnectionConfig {
                base_url,
                ..ConnectionConfig::default()
            },
            credentials: Some(Credentials { username, password }),
            limits: QueryLimits::default(),
        }
    }
}
