//! Centralized defaults for the SAP OData workspace.
//!
//! This module contains default values used across crates to avoid
//! magic number duplication.

// =============================================================================
// Connection & Timeout Defaults
// =============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum allowed connection timeout in seconds (1 hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Default maximum number of HTTP redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

// =============================================================================
// Discovery Defaults
// =============================================================================

/// SAP Gateway catalog path listing every OData service on a system.
pub const CATALOG_SERVICE_PATH: &str = "/IWFND/CATALOGSERVICE;v=2/ServiceCollection";

/// Default number of concurrent per-service metadata fetches during discovery.
pub const DEFAULT_METADATA_CONCURRENCY: usize = 4;

// =============================================================================
// Query & Pagination Defaults
// =============================================================================

/// Default cap on rows accumulated while following continuation links.
pub const DEFAULT_MAX_ROWS: usize = 5000;

/// Default cap on continuation pages followed for one query.
pub const DEFAULT_MAX_PAGES: usize = 50;

// =============================================================================
// Resolver Defaults
// =============================================================================

/// Minimum score below which resolution reports no reasonable candidate.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.2;

/// Score margin within which the top two candidates count as tied.
pub const DEFAULT_TIE_MARGIN: f64 = 0.05;

/// Weight of a partial (substring) token match relative to an exact token hit.
pub const DEFAULT_PARTIAL_WEIGHT: f64 = 0.5;
