//! Authenticated HTTP transport.
//!
//! This module is responsible for:
//! - Issuing requests with basic-auth credential injection.
//! - Mapping response statuses onto the client error taxonomy
//!   (401/403 -> `Auth`, 5xx -> `RemoteServer`, other non-2xx ->
//!   `RemoteQuery` carrying the original OData error message).
//! - CSRF token negotiation for write methods.
//!
//! # What this module does NOT handle:
//! - Retries (callers own retry policy; the core never retries).
//! - Payload parsing (catalog / metadata / query modules).
//!
//! # Invariants
//! - Connection and timeout failures surface as `Network`, never panics.
//! - A successful (2xx) response is returned unread; body consumption is the
//!   caller's job.

use reqwest::{Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use tracing::debug;

use sap_odata_config::Credentials;

use crate::error::{ClientError, Result};

/// Header used by SAP gateways for CSRF token negotiation.
const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// Authenticated HTTP transport shared by all engine components.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl Transport {
    pub(crate) fn new(http: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self { http, credentials }
    }

    /// Issue a GET request with optional query parameters.
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<Response> {
        let mut builder = self.http.get(url).header("Accept", "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        self.dispatch(url, self.authorize(builder)).await
    }

    /// Issue a write request (POST/PUT/PATCH/DELETE) with CSRF negotiation
    /// against the given service root. A gateway that hands out no token is
    /// tolerated; the write proceeds without one.
    pub async fn send_write(
        &self,
        method: Method,
        url: &str,
        service_root: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/json");

        match self.fetch_csrf_token(service_root).await {
            Some(token) => builder = builder.header(CSRF_TOKEN_HEADER, token),
            None => debug!(service_root, "no CSRF token available, sending write without one"),
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        self.dispatch(url, self.authorize(builder)).await
    }

    /// Ask the service root for a CSRF token. Failures are swallowed: token
    /// support is optional on many gateways.
    async fn fetch_csrf_token(&self, service_root: &str) -> Option<String> {
        let builder = self
            .http
            .head(service_root)
            .header(CSRF_TOKEN_HEADER, "fetch");

        let response = self.authorize(builder).send().await.ok()?;
        response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => {
                builder.basic_auth(&creds.username, Some(creds.password.expose_secret()))
            }
            None => builder,
        }
    }

    async fn dispatch(&self, url: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;
        check_status(response).await
    }
}

/// Map a transport-level `reqwest` failure into a `Network` error.
fn network_error(url: &str, error: &reqwest::Error) -> ClientError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };
    ClientError::Network {
        url: url.to_string(),
        message,
    }
}

/// Convert non-success statuses into the error taxonomy; 2xx passes through.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let status = status.as_u16();

    match status {
        401 | 403 => Err(ClientError::Auth { status, url }),
        s if s >= 500 => Err(ClientError::RemoteServer {
            status: s,
            url,
            message: remote_error_message(&body),
        }),
        s => Err(ClientError::RemoteQuery {
            status: s,
            message: remote_error_message(&body),
        }),
    }
}

/// Extract the human-readable message from an OData error body, falling back
/// to the raw (truncated) body for non-OData payloads.
pub(crate) fn remote_error_message(body: &str) -> String {
    const MAX_RAW_LEN: usize = 500;

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        // OData v2 nests the text under message.value; v4 uses a flat string.
        if let Some(message) = error["message"]["value"].as_str() {
            return message.to_string();
        }
        if let Some(message) = error["message"].as_str() {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty error body)".to_string();
    }
    let mut message: String = trimmed.chars().take(MAX_RAW_LEN).collect();
    if trimmed.chars().count() > MAX_RAW_LEN {
        message.push('…');
    }
    message
}
