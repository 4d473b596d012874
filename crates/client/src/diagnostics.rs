//! Connection diagnostics.
//!
//! Runs a layered connectivity check against a system and reports every step
//! instead of failing on the first problem: an operator reading the report
//! should see exactly where the chain breaks (network, credentials, catalog,
//! or metadata). This function never returns an error; failures are data.
//!
//! The catalog and metadata steps run through the discovery cache's refresh
//! path, so a passing diagnostic leaves behind the same warm snapshot later
//! queries use.

use serde::Serialize;
use tracing::info;

use crate::cache::DiscoveryCache;
use crate::error::ClientError;
use crate::transport::Transport;

/// One step of the diagnostics ladder.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticStep {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
    /// Error kind when the step failed, for programmatic inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl DiagnosticStep {
    fn pass(name: &'static str, detail: String) -> Self {
        Self {
            name,
            ok: true,
            detail,
            error_kind: None,
        }
    }

    fn fail(name: &'static str, error: &ClientError) -> Self {
        Self {
            name,
            ok: false,
            detail: error.to_string(),
            error_kind: Some(error.kind().to_string()),
        }
    }
}

/// Full diagnostics report for one system.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub base_url: String,
    pub healthy: bool,
    pub steps: Vec<DiagnosticStep>,
}

/// Probe the system in three steps: host reachability, catalog access, and
/// metadata readability. Later steps are skipped once an earlier one fails;
/// the report says how far the chain got.
pub async fn run_diagnostics(
    transport: &Transport,
    cache: &DiscoveryCache,
    base_url: &str,
) -> ConnectionReport {
    let mut steps = Vec::new();

    // Step 1: does the host answer at all? An auth rejection still proves
    // reachability; only transport-level failures fail this step.
    let reachability = match transport.get(base_url, &[]).await {
        Ok(_) => DiagnosticStep::pass("reachability", format!("{base_url} answered")),
        Err(error) if error.is_response() => DiagnosticStep::pass(
            "reachability",
            format!("{base_url} answered (HTTP error: {error})"),
        ),
        Err(error) => DiagnosticStep::fail("reachability", &error),
    };
    let reachable = reachability.ok;
    steps.push(reachability);

    if !reachable {
        return finish(base_url, steps);
    }

    // Steps 2 and 3: run a full discovery refresh. Catalog-level failures
    // fail step 2; per-service metadata outcomes make up step 3. On success
    // the refreshed snapshot is what subsequent queries will read.
    match cache.refresh(transport, base_url).await {
        Ok(snapshot) => {
            steps.push(DiagnosticStep::pass(
                "catalog",
                format!("{} services listed", snapshot.services.len()),
            ));

            if snapshot.entity_sets.is_empty() {
                // Every service's metadata failed; surface the first failure.
                match snapshot.failures.first() {
                    Some(failure) => steps.push(DiagnosticStep {
                        name: "metadata",
                        ok: false,
                        detail: failure.message.clone(),
                        error_kind: Some(failure.kind.clone()),
                    }),
                    None => steps.push(DiagnosticStep::pass(
                        "metadata",
                        "no service to probe".to_string(),
                    )),
                }
            } else if snapshot.failures.is_empty() {
                steps.push(DiagnosticStep::pass(
                    "metadata",
                    format!(
                        "{} entity sets across {} services",
                        snapshot.entity_set_count(),
                        snapshot.entity_sets.len()
                    ),
                ));
            } else {
                steps.push(DiagnosticStep::pass(
                    "metadata",
                    format!(
                        "{} entity sets across {} services ({} services failed)",
                        snapshot.entity_set_count(),
                        snapshot.entity_sets.len(),
                        snapshot.failures.len()
                    ),
                ));
            }
        }
        Err(error) => steps.push(DiagnosticStep::fail("catalog", &error)),
    }

    finish(base_url, steps)
}

fn finish(base_url: &str, steps: Vec<DiagnosticStep>) -> ConnectionReport {
    let healthy = steps.iter().all(|s| s.ok);
    info!(base_url, healthy, steps = steps.len(), "diagnostics complete");
    ConnectionReport {
        base_url: base_url.to_string(),
        healthy,
        steps,
    }
}
