//! Configuration for the SAP OData discovery engine.
//!
//! This crate provides types and loaders for the connection settings the
//! core engine consumes but does not own: base URL, credentials, timeouts,
//! and query limits, read from environment variables and an optional `.env`
//! file.

pub mod constants;
mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{Config, ConnectionConfig, Credentials, QueryLimits};
