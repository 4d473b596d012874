//! Error types for configuration loading.
//!
//! Invariants:
//! - All error variants include context for debugging (variable names, etc.).
//! - Dotenv errors NEVER include raw `.env` line contents to prevent secret
//!   leakage.

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Base URL is required. Set SAP_URL or pass --url.")]
    MissingBaseUrl,

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("SAP_PASSWORD is set but SAP_USERNAME is missing")]
    PasswordWithoutUsername,
}
