//! Data model for discovered services, entity sets, and reports.
//!
//! Responsibilities:
//! - Descriptor types produced by catalog and metadata parsing.
//! - The immutable per-system discovery snapshot held by the cache.
//! - Serializable report types returned to the tool layer.
//!
//! Invariants:
//! - `ServiceDescriptor` identity is its `name`; descriptors are immutable
//!   once discovered.
//! - Every `EntitySetDescriptor` has at least one key field; when the key was
//!   inferred (metadata omitted key annotations) `inferred_key` is set.
//! - Entity set names are unique within a service, not globally.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// One normalized result row: plain field -> value with the OData envelope
/// stripped away.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A discovered OData service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique technical identifier, e.g. `API_SALES_ORDER_SRV`.
    pub name: String,
    /// Human-readable label from the catalog (may be empty).
    pub title: String,
    /// Absolute service root URL.
    pub url: String,
}

/// Coarse field classification mapped from EDM primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Date,
    Boolean,
}

impl FieldKind {
    /// Map an EDM primitive type name (e.g. `Edm.Int32`) to a [`FieldKind`].
    /// Unrecognized types fall back to `String`.
    pub fn from_edm(edm_type: &str) -> Self {
        match edm_type {
            "Edm.Boolean" => Self::Boolean,
            "Edm.Byte" | "Edm.SByte" | "Edm.Int16" | "Edm.Int32" | "Edm.Int64" | "Edm.Single"
            | "Edm.Double" | "Edm.Decimal" => Self::Number,
            "Edm.Date" | "Edm.DateTime" | "Edm.DateTimeOffset" | "Edm.Time"
            | "Edm.TimeOfDay" => Self::Date,
            _ => Self::String,
        }
    }
}

/// A single field of an entity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub is_key: bool,
}

/// A discovered entity set with its structural schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySetDescriptor {
    /// Owning service name. Weak reference: resolve through the snapshot.
    pub service_name: String,
    pub name: String,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Key field names, ordered (order matters for composite keys).
    pub key_fields: Vec<String>,
    /// True when the metadata omitted key annotations and the first declared
    /// field was used as a low-confidence key.
    pub inferred_key: bool,
}

impl EntitySetDescriptor {
    /// Look up a field by name (case-sensitive, OData field names are).
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All declared field names, in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// An isolated per-service discovery failure, recorded alongside successes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFailure {
    pub service: String,
    pub kind: String,
    pub message: String,
}

impl ServiceFailure {
    pub fn new(service: &str, error: &ClientError) -> Self {
        Self {
            service: service.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Immutable discovery result for one system, held by the cache as an
/// `Arc<SystemSnapshot>` and replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub services: Vec<ServiceDescriptor>,
    /// Entity sets keyed by owning service name. Services whose metadata
    /// failed to parse have no entry here; see `failures`.
    pub entity_sets: HashMap<String, Vec<EntitySetDescriptor>>,
    pub failures: Vec<ServiceFailure>,
    pub refreshed_at: DateTime<Utc>,
}

impl SystemSnapshot {
    /// Look up a service descriptor by name.
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Iterate every known entity set with its owning service.
    pub fn all_entity_sets(
        &self,
    ) -> impl Iterator<Item = (&ServiceDescriptor, &EntitySetDescriptor)> {
        self.services.iter().flat_map(|svc| {
            self.entity_sets
                .get(&svc.name)
                .into_iter()
                .flatten()
                .map(move |es| (svc, es))
        })
    }

    /// Total number of known entity sets across all services.
    pub fn entity_set_count(&self) -> usize {
        self.entity_sets.values().map(Vec::len).sum()
    }
}

/// One token-level match recorded during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTerm {
    /// Token from the caller's hint.
    pub hint: String,
    /// Token of the entity set name / service title it matched.
    pub matched: String,
    /// True for a substring (partial) match rather than an exact token hit.
    pub partial: bool,
}

/// A scored resolution candidate. Transient: produced during resolution and
/// either returned to the caller or carried inside an ambiguity error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub entity_set: EntitySetDescriptor,
    /// Similarity in `0.0..=1.0`; exact name matches always score 1.0.
    pub score: f64,
    pub matched_terms: Vec<MatchedTerm>,
}

/// Serializable discovery report returned by the `discover` tool call.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub base_url: String,
    pub service_count: usize,
    pub entity_set_count: usize,
    pub services: Vec<ServiceDescriptor>,
    pub entity_sets: HashMap<String, Vec<EntitySetDescriptor>>,
    pub failures: Vec<ServiceFailure>,
    pub refreshed_at: DateTime<Utc>,
}

impl DiscoveryReport {
    pub fn from_snapshot(base_url: &str, snapshot: &SystemSnapshot) -> Self {
        Self {
            base_url: base_url.to_string(),
            service_count: snapshot.services.len(),
            entity_set_count: snapshot.entity_set_count(),
            services: snapshot.services.clone(),
            entity_sets: snapshot.entity_sets.clone(),
            failures: snapshot.failures.clone(),
            refreshed_at: snapshot.refreshed_at,
        }
    }
}
