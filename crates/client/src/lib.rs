//! SAP OData service discovery and smart-resolution client.
//!
//! Given a system base URL and credentials, this crate enumerates the OData
//! services the system exposes, learns their entity sets and field schemas,
//! resolves free-form hints like "billing documents" onto concrete entity
//! sets, and builds, executes, and normalizes OData queries against them.
//!
//! Entry point is [`SapClient`]; see [`SapClientBuilder`] for construction.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod diagnostics;
pub mod error;
pub mod metadata;
pub mod models;
pub mod query;
pub mod resolve;
pub mod transport;

pub use cache::DiscoveryCache;
pub use client::{QueryOutcome, SapClient, SapClientBuilder};
pub use diagnostics::{ConnectionReport, DiagnosticStep};
pub use error::{ClientError, Result};
pub use models::{
    DiscoveryReport, EntitySetDescriptor, FieldDescriptor, FieldKind, MatchResult, MatchedTerm,
    Row, ServiceDescriptor, ServiceFailure, SystemSnapshot,
};
pub use query::{Filter, FilterOp, QueryResult, QuerySpec};
pub use resolve::ResolverConfig;
pub use transport::Transport;
