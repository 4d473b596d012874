//! Discovery cache.
//!
//! Holds one immutable [`SystemSnapshot`] per system base URL. Concurrent
//! first-time lookups are coalesced into a single discovery run; every waiter
//! receives the same `Arc<SystemSnapshot>` (or the same error). Refresh builds
//! a complete replacement snapshot before swapping it in, so readers never
//! observe a partially populated cache.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use moka::future::Cache;
use tracing::{debug, info};

use crate::catalog;
use crate::error::{ClientError, Result};
use crate::metadata;
use crate::models::{ServiceFailure, SystemSnapshot};
use crate::transport::Transport;

/// Upper bound on cached systems; an engine instance rarely talks to more
/// than a handful.
const MAX_CACHED_SYSTEMS: u64 = 16;

#[derive(Debug)]
pub struct DiscoveryCache {
    snapshots: Cache<String, Arc<SystemSnapshot>>,
    metadata_concurrency: usize,
}

impl DiscoveryCache {
    /// Create a cache. `ttl` of `None` means snapshots live until an explicit
    /// refresh; discovery results only change when the remote system does.
    pub fn new(metadata_concurrency: usize, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(MAX_CACHED_SYSTEMS);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            snapshots: builder.build(),
            metadata_concurrency,
        }
    }

    /// Return the snapshot for a system, running discovery on first access.
    /// Concurrent callers for the same base URL share one discovery run.
    pub async fn snapshot(
        &self,
        transport: &Transport,
        base_url: &str,
    ) -> Result<Arc<SystemSnapshot>> {
        self.snapshots
            .try_get_with(base_url.to_string(), async {
                discover(transport, base_url, self.metadata_concurrency)
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e: Arc<ClientError>| (*e).clone())
    }

    /// Re-run discovery and atomically replace the cached snapshot. The old
    /// snapshot stays visible until the new one is complete.
    pub async fn refresh(
        &self,
        transport: &Transport,
        base_url: &str,
    ) -> Result<Arc<SystemSnapshot>> {
        let snapshot = Arc::new(
            discover(transport, base_url, self.metadata_concurrency).await?,
        );
        self.snapshots
            .insert(base_url.to_string(), Arc::clone(&snapshot))
            .await;
        Ok(snapshot)
    }

    /// Drop the cached snapshot for a system, if any.
    pub async fn invalidate(&self, base_url: &str) {
        self.snapshots.invalidate(base_url).await;
    }
}

/// Run full discovery for one system: fetch the catalog, then fetch every
/// service's metadata with bounded concurrency. Per-service metadata failures
/// are isolated into the snapshot's failure list; only catalog-level failures
/// abort discovery.
pub async fn discover(
    transport: &Transport,
    base_url: &str,
    metadata_concurrency: usize,
) -> Result<SystemSnapshot> {
    let services = catalog::fetch_catalog(transport, base_url).await?;
    info!(base_url, services = services.len(), "service catalog fetched");

    let results: Vec<_> = futures::stream::iter(services.iter().map(|service| async move {
        let outcome = metadata::fetch_entity_sets(transport, service).await;
        (service.name.clone(), outcome)
    }))
    .buffer_unordered(metadata_concurrency.max(1))
    .collect()
    .await;

    let mut entity_sets = std::collections::HashMap::new();
    let mut failures = Vec::new();
    for (service_name, outcome) in results {
        match outcome {
            Ok(sets) => {
                debug!(service = %service_name, entity_sets = sets.len(), "metadata parsed");
                entity_sets.insert(service_name, sets);
            }
            Err(error) => {
                debug!(service = %service_name, error = %error, "metadata fetch failed");
                failures.push(ServiceFailure::new(&service_name, &error));
            }
        }
    }

    info!(
        base_url,
        services = services.len(),
        failures = failures.len(),
        "discovery complete"
    );

    Ok(SystemSnapshot {
        services,
        entity_sets,
        failures,
        refreshed_at: chrono::Utc::now(),
    })
}
