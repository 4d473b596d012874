//! Environment variable loading for configuration.
//!
//! Responsibilities:
//! - Optionally load a `.env` file (missing file is not an error).
//! - Read `SAP_*` environment variables into a [`Config`].
//! - Validate the base URL and numeric settings.
//!
//! Does NOT handle:
//! - Building HTTP clients (see client crate).
//! - Persisting configuration anywhere.
//!
//! Invariants:
//! - Empty or whitespace-only environment variables are treated as unset.
//! - Explicit setters take precedence over environment values.
//! - Invalid numeric values return `ConfigError::InvalidValue`.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::constants::MAX_TIMEOUT_SECS;
use crate::error::ConfigError;
use crate::types::{Config, ConnectionConfig, Credentials, QueryLimits};

/// Read an environment variable, returning None if unset, empty, or
/// whitespace-only. The returned value is trimmed.
fn env_var_or_none(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_parse<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>, ConfigError> {
    match env_var_or_none(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: key.to_string(),
                message: format!("must be {expected}"),
            }),
        None => Ok(None),
    }
}

/// Builder-style loader combining env vars with explicit overrides.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    skip_verify: Option<bool>,
    timeout: Option<Duration>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` from the current directory if present. A missing file is
    /// fine; any other I/O or parse problem is logged and ignored so a broken
    /// `.env` never blocks explicitly-set environment variables.
    pub fn load_dotenv(self) -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => tracing::warn!("ignoring unreadable .env file: {err}"),
        }
        self
    }

    pub fn base_url(mut self, url: Option<String>) -> Self {
        self.base_url = url;
        self
    }

    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn password(mut self, password: Option<SecretString>) -> Self {
        self.password = password;
        self
    }

    pub fn skip_verify(mut self, skip: Option<bool>) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the final [`Config`], with explicit setters taking precedence
    /// over environment variables.
    pub fn load(self) -> Result<Config, ConfigError> {
        let base_url = self
            .base_url
            .or_else(|| env_var_or_none("SAP_URL"))
            .ok_or(ConfigError::MissingBaseUrl)?;

        Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;

        let username = self.username.or_else(|| env_var_or_none("SAP_USERNAME"));
        let password = self.password.or_else(|| {
            env_var_or_none("SAP_PASSWORD").map(|p| SecretString::new(p.into()))
        });

        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (Some(username), None) => Some(Credentials {
                username,
                password: SecretString::new(String::new().into()),
            }),
            (None, Some(_)) => return Err(ConfigError::PasswordWithoutUsername),
            (None, None) => None,
        };

        let timeout = match self.timeout {
            Some(t) => t,
            None => {
                let secs = env_parse::<u64>("SAP_TIMEOUT", "a number of seconds")?
                    .unwrap_or(crate::constants::DEFAULT_TIMEOUT_SECS);
                if secs == 0 || secs > MAX_TIMEOUT_SECS {
                    return Err(ConfigError::InvalidValue {
                        var: "SAP_TIMEOUT".to_string(),
                        message: format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
                    });
                }
                Duration::from_secs(secs)
            }
        };

        let skip_verify = match self.skip_verify {
            Some(v) => v,
            None => env_parse::<bool>("SAP_SKIP_VERIFY", "true or false")?.unwrap_or(false),
        };

        let mut limits = QueryLimits::default();
        if let Some(max_pages) = env_parse::<usize>("SAP_MAX_PAGES", "a positive integer")? {
            if max_pages == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "SAP_MAX_PAGES".to_string(),
                    message: "must be a positive integer".to_string(),
                });
            }
            limits.max_pages = max_pages;
        }
        if let Some(max_rows) = env_parse::<usize>("SAP_MAX_ROWS", "a positive integer")? {
            if max_rows == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "SAP_MAX_ROWS".to_string(),
                    message: "must be a positive integer".to_string(),
                });
            }
            limits.max_rows = max_rows;
        }

        Ok(Config {
            connection: ConnectionConfig {
                base_url,
                skip_verify,
                timeout,
            },
            credentials,
            limits,
        })
    }
}
