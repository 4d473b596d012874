//! Builder for [`SapClient`](super::SapClient).

use std::time::Duration;

use url::Url;

use sap_odata_config::constants::{
    DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS,
};
use sap_odata_config::{Config, Credentials, QueryLimits};

use crate::cache::DiscoveryCache;
use crate::error::{ClientError, Result};
use crate::resolve::ResolverConfig;
use crate::transport::Transport;

use super::SapClient;

/// Configures and constructs a [`SapClient`].
#[derive(Debug, Default)]
pub struct SapClientBuilder {
    base_url: Option<String>,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
    skip_verify: bool,
    limits: QueryLimits,
    resolver: ResolverConfig,
    snapshot_ttl: Option<Duration>,
}

impl SapClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: Some(config.connection.base_url.clone()),
            credentials: config.credentials.clone(),
            timeout: Some(config.connection.timeout),
            skip_verify: config.connection.skip_verify,
            limits: config.limits,
            resolver: ResolverConfig::default(),
            snapshot_ttl: None,
        }
    }

    /// System base URL, e.g. `https://sap.example.com:44300`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable TLS certificate verification. Only meaningful for systems with
    /// self-signed certificates; off by default.
    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Expire cached discovery snapshots after this duration. Without a TTL,
    /// snapshots live until an explicit refresh.
    pub fn snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<SapClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::InvalidUrl("no base URL configured".to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut http = reqwest::Client::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .redirect(reqwest::redirect::Policy::limited(DEFAULT_MAX_REDIRECTS))
            .cookie_store(true);
        if self.skip_verify {
            http = http.danger_accept_invalid_certs(true);
        }
        let http = http.build().map_err(|e| ClientError::Network {
            url: base_url.clone(),
            message: format!("failed to build HTTP client: {e}"),
        })?;

        let cache = DiscoveryCache::new(self.limits.metadata_concurrency, self.snapshot_ttl);

        Ok(SapClient {
            transport: Transport::new(http, self.credentials),
            cache,
            base_url,
            limits: self.limits,
            resolver: self.resolver,
        })
    }
}
