//! Error types for the SAP OData client.
//!
//! All variants carry owned data so `ClientError` is `Clone`; the discovery
//! cache shares one coalesced discovery result (including its error) between
//! every concurrent waiter, which requires cloning out of an `Arc`. Transport
//! failures are therefore mapped to owned variants at the boundary instead of
//! wrapping `reqwest::Error` directly.

use thiserror::Error;

use crate::models::MatchResult;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during discovery, resolution, and query execution.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Connection failure or timeout before an HTTP response arrived.
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The system rejected the credentials (401/403).
    #[error("Authentication failed ({status}) at {url}")]
    Auth { status: u16, url: String },

    /// The remote system answered with a 5xx status.
    #[error("Remote server error ({status}) at {url}: {message}")]
    RemoteServer {
        status: u16,
        url: String,
        message: String,
    },

    /// The catalog response was neither a recognized JSON payload nor an
    /// Atom service document.
    #[error("Unrecognized service catalog payload: {0}")]
    CatalogParse(String),

    /// The catalog call succeeded but the system exposes no services.
    #[error("Service catalog at {url} lists no OData services")]
    EmptyCatalog { url: String },

    /// A single service's metadata document could not be parsed.
    #[error("Failed to parse metadata for service '{service}': {message}")]
    MetadataParse { service: String, message: String },

    /// No entity set scored above the resolver threshold.
    #[error(
        "No entity set matched hint '{hint}' (best score {best_score:.2}, threshold {threshold:.2})"
    )]
    NoMatch {
        hint: String,
        best_score: f64,
        threshold: f64,
    },

    /// Several entity sets scored within the tie margin of each other.
    #[error("Hint '{hint}' is ambiguous between {} candidates", candidates.len())]
    AmbiguousMatch {
        hint: String,
        candidates: Vec<MatchResult>,
    },

    /// A filter, selection, or ordering referenced a field the entity set
    /// does not declare. Raised before any network call.
    #[error(
        "Unknown field '{field}' on entity set '{entity_set}'; valid fields: {}",
        valid_fields.join(", ")
    )]
    UnknownField {
        field: String,
        entity_set: String,
        valid_fields: Vec<String>,
    },

    /// The remote system rejected a query; carries the original OData
    /// error message, not a re-interpretation.
    #[error("Remote query failed ({status}): {message}")]
    RemoteQuery { status: u16, message: String },

    /// A write operation was missing a value for one of the entity set's
    /// key fields.
    #[error("Missing value for key field '{field}' of entity set '{entity_set}'")]
    MissingKeyField { field: String, entity_set: String },

    /// The catalog does not list the requested service.
    #[error("Unknown service '{service}'")]
    UnknownService { service: String },

    /// Malformed caller-supplied URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Stable short name of the error kind, used in diagnostics reports and
    /// per-service failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Auth { .. } => "auth",
            Self::RemoteServer { .. } => "remote-server",
            Self::CatalogParse(_) => "catalog-parse",
            Self::EmptyCatalog { .. } => "empty-catalog",
            Self::MetadataParse { .. } => "metadata-parse",
            Self::NoMatch { .. } => "no-match",
            Self::AmbiguousMatch { .. } => "ambiguous-match",
            Self::UnknownField { .. } => "unknown-field",
            Self::RemoteQuery { .. } => "remote-query",
            Self::MissingKeyField { .. } => "missing-key-field",
            Self::UnknownService { .. } => "unknown-service",
            Self::InvalidUrl(_) => "invalid-url",
        }
    }

    /// Whether this error indicates the remote host answered at all.
    /// Used by diagnostics: an auth rejection still proves reachability.
    pub fn is_response(&self) -> bool {
        !matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable() {
        let err = ClientError::EmptyCatalog {
            url: "https://sap.example.com".to_string(),
        };
        assert_eq!(err.kind(), "empty-catalog");
    }

    #[test]
    fn auth_error_counts_as_response() {
        let err = ClientError::Auth {
            status: 401,
            url: "https://sap.example.com".to_string(),
        };
        assert!(err.is_response());

        let err = ClientError::Network {
            url: "https://sap.example.com".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(!err.is_response());
    }

    #[test]
    fn unknown_field_lists_valid_fields() {
        let err = ClientError::UnknownField {
            field: "Customr".to_string(),
            entity_set: "BillingDocument".to_string(),
            valid_fields: vec!["Customer".to_string(), "Amount".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("Customr"));
        assert!(text.contains("Customer, Amount"));
    }
}
