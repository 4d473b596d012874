//! High-level SAP OData client.
//!
//! [`SapClient`] is the facade tying discovery, resolution, and query
//! execution together: it owns the transport, the discovery cache, and the
//! configured limits, and exposes the operations a tool layer calls.

mod builder;

pub use builder::SapClientBuilder;

use std::sync::Arc;

use tracing::debug;

use sap_odata_config::{Config, QueryLimits};

use crate::cache::DiscoveryCache;
use crate::diagnostics::{self, ConnectionReport};
use crate::error::{ClientError, Result};
use crate::models::{
    DiscoveryReport, EntitySetDescriptor, MatchResult, Row, ServiceDescriptor, SystemSnapshot,
};
use crate::query::{self, QueryResult, QuerySpec};
use crate::resolve::{self, ResolverConfig};
use crate::transport::Transport;

/// Outcome of a smart query. Ambiguity is an expected outcome, not a failure:
/// the caller is supposed to show the candidates and ask for a narrower hint.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Rows {
        resolution: MatchResult,
        result: QueryResult,
    },
    Ambiguous {
        hint: String,
        candidates: Vec<MatchResult>,
    },
}

/// Client for one SAP system: discovery, hint resolution, queries, writes,
/// and diagnostics. Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct SapClient {
    pub(crate) transport: Transport,
    pub(crate) cache: DiscoveryCache,
    pub(crate) base_url: String,
    pub(crate) limits: QueryLimits,
    pub(crate) resolver: ResolverConfig,
}

impl SapClient {
    pub fn builder() -> SapClientBuilder {
        SapClientBuilder::new()
    }

    /// Build a client straight from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        SapClientBuilder::from_config(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The current discovery snapshot, running discovery on first access.
    pub async fn snapshot(&self) -> Result<Arc<SystemSnapshot>> {
        self.cache.snapshot(&self.transport, &self.base_url).await
    }

    /// Discover (or return the cached view of) the system's services and
    /// entity sets.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let snapshot = self.snapshot().await?;
        Ok(DiscoveryReport::from_snapshot(&self.base_url, &snapshot))
    }

    /// Force a fresh discovery run and replace the cached snapshot.
    pub async fn refresh(&self) -> Result<DiscoveryReport> {
        let snapshot = self.cache.refresh(&self.transport, &self.base_url).await?;
        Ok(DiscoveryReport::from_snapshot(&self.base_url, &snapshot))
    }

    /// All discovered services, in catalog order.
    pub async fn services(&self) -> Result<Vec<ServiceDescriptor>> {
        Ok(self.snapshot().await?.services.clone())
    }

    /// Entity sets of one service, by technical service name.
    pub async fn entity_sets(&self, service: &str) -> Result<Vec<EntitySetDescriptor>> {
        let snapshot = self.snapshot().await?;
        if snapshot.service(service).is_none() {
            return Err(ClientError::UnknownService {
                service: service.to_string(),
            });
        }
        Ok(snapshot.entity_sets.get(service).cloned().unwrap_or_default())
    }

    /// Resolve a free-form hint to exactly one entity set.
    pub async fn resolve(
        &self,
        hint: &str,
        service_hint: Option<&str>,
    ) -> Result<MatchResult> {
        let snapshot = self.snapshot().await?;
        resolve::resolve(&snapshot, hint, service_hint, &self.resolver)
    }

    /// Resolve a hint and run a query against the resolved entity set in one
    /// step. Ambiguity comes back as [`QueryOutcome::Ambiguous`] so callers
    /// can present the candidates; every other failure is an error.
    pub async fn smart_query(
        &self,
        hint: &str,
        service_hint: Option<&str>,
        spec: &QuerySpec,
    ) -> Result<QueryOutcome> {
        let snapshot = self.snapshot().await?;
        let resolution = match resolve::resolve(&snapshot, hint, service_hint, &self.resolver) {
            Ok(resolution) => resolution,
            Err(ClientError::AmbiguousMatch { hint, candidates }) => {
                return Ok(QueryOutcome::Ambiguous { hint, candidates });
            }
            Err(other) => return Err(other),
        };

        debug!(
            hint,
            entity_set = %resolution.entity_set.name,
            service = %resolution.entity_set.service_name,
            score = resolution.score,
            "hint resolved"
        );

        let service_url = self
            .service_url(&snapshot, &resolution.entity_set.service_name)?;
        let result = query::execute_query(
            &self.transport,
            &service_url,
            &resolution.entity_set,
            spec,
            &self.limits,
        )
        .await?;

        Ok(QueryOutcome::Rows { resolution, result })
    }

    /// Run a query against an entity set addressed by exact service and
    /// entity set names, bypassing resolution.
    pub async fn execute(
        &self,
        service: &str,
        entity_set: &str,
        spec: &QuerySpec,
    ) -> Result<QueryResult> {
        let snapshot = self.snapshot().await?;
        let (service_url, descriptor) = self.lookup(&snapshot, service, entity_set)?;
        query::execute_query(&self.transport, &service_url, &descriptor, spec, &self.limits).await
    }

    /// Create an entity in the named entity set.
    pub async fn create(&self, service: &str, entity_set: &str, payload: &Row) -> Result<Row> {
        let snapshot = self.snapshot().await?;
        let (service_url, descriptor) = self.lookup(&snapshot, service, entity_set)?;
        query::create_entity(&self.transport, &service_url, &descriptor, payload).await
    }

    /// Update an entity addressed by its key fields. `merge` selects a
    /// partial (PATCH) update over full replacement.
    pub async fn update(
        &self,
        service: &str,
        entity_set: &str,
        key_values: &Row,
        payload: &Row,
        merge: bool,
    ) -> Result<Row> {
        let snapshot = self.snapshot().await?;
        let (service_url, descriptor) = self.lookup(&snapshot, service, entity_set)?;
        query::update_entity(
            &self.transport,
            &service_url,
            &descriptor,
            key_values,
            payload,
            merge,
        )
        .await
    }

    /// Delete an entity addressed by its key fields.
    pub async fn delete(&self, service: &str, entity_set: &str, key_values: &Row) -> Result<()> {
        let snapshot = self.snapshot().await?;
        let (service_url, descriptor) = self.lookup(&snapshot, service, entity_set)?;
        query::delete_entity(&self.transport, &service_url, &descriptor, key_values).await
    }

    /// Invoke a function import on a service. Parameters go into the query
    /// string as OData literals typed by JSON shape; `use_post` selects a
    /// POST invocation (with CSRF negotiation) over GET.
    pub async fn call_function(
        &self,
        service: &str,
        function: &str,
        parameters: &Row,
        use_post: bool,
    ) -> Result<Vec<Row>> {
        let snapshot = self.snapshot().await?;
        let service_url = self.service_url(&snapshot, service)?;
        query::call_function(&self.transport, &service_url, function, parameters, use_post).await
    }

    /// Run the layered connection diagnostics. Never fails; problems are
    /// reported as failed steps.
    pub async fn test_connection(&self) -> ConnectionReport {
        diagnostics::run_diagnostics(&self.transport, &self.cache, &self.base_url).await
    }

    fn service_url(&self, snapshot: &SystemSnapshot, service: &str) -> Result<String> {
        snapshot
            .service(service)
            .map(|s| s.url.clone())
            .ok_or_else(|| ClientError::UnknownService {
                service: service.to_string(),
            })
    }

    fn lookup(
        &self,
        snapshot: &SystemSnapshot,
        service: &str,
        entity_set: &str,
    ) -> Result<(String, EntitySetDescriptor)> {
        let service_url = self.service_url(snapshot, service)?;
        let descriptor = snapshot
            .entity_sets
            .get(service)
            .and_then(|sets| sets.iter().find(|s| s.name == entity_set))
            .cloned()
            .ok_or_else(|| ClientError::NoMatch {
                hint: entity_set.to_string(),
                best_score: 0.0,
                threshold: self.resolver.threshold,
            })?;
        Ok((service_url, descriptor))
    }
}
