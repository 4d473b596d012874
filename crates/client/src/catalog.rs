//! Service catalog reader.
//!
//! Fetches the SAP Gateway service catalog and parses it into
//! [`ServiceDescriptor`] entries. The payload format varies by gateway
//! version: OData v2 JSON (`d.results`), v4 JSON (`value`), or an Atom
//! service document. Format selection is an explicit tagged choice driven by
//! content-type and body sniffing, not duck-typed branching.

use roxmltree::Document;
use serde_json::Value;
use url::Url;

use sap_odata_config::constants::CATALOG_SERVICE_PATH;

use crate::error::{ClientError, Result};
use crate::models::ServiceDescriptor;
use crate::transport::Transport;

/// Conventional service root prefix on SAP gateways, used when the catalog
/// entry carries no explicit service URL.
const SERVICE_ROOT_PREFIX: &str = "/sap/opu/odata/sap";

/// Recognized catalog payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogFormat {
    Json,
    Atom,
}

/// Fetch and parse the service catalog of a system.
pub async fn fetch_catalog(
    transport: &Transport,
    base_url: &str,
) -> Result<Vec<ServiceDescriptor>> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), CATALOG_SERVICE_PATH);
    let response = transport.get(&url, &[]).await?;
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::Network {
            url: url.clone(),
            message: format!("failed to read catalog body: {e}"),
        })?;

    parse_catalog(base_url, content_type.as_deref(), &body)
}

/// Parse a catalog payload into service descriptors.
///
/// Fails with [`ClientError::CatalogParse`] for unrecognized payloads and
/// [`ClientError::EmptyCatalog`] when the payload parses but lists nothing.
pub fn parse_catalog(
    base_url: &str,
    content_type: Option<&str>,
    body: &str,
) -> Result<Vec<ServiceDescriptor>> {
    let services = match sniff_format(content_type, body)? {
        CatalogFormat::Json => parse_json_catalog(base_url, body)?,
        CatalogFormat::Atom => parse_atom_catalog(base_url, body)?,
    };

    if services.is_empty() {
        return Err(ClientError::EmptyCatalog {
            url: base_url.to_string(),
        });
    }
    Ok(services)
}

fn sniff_format(content_type: Option<&str>, body: &str) -> Result<CatalogFormat> {
    if let Some(ct) = content_type {
        if ct.contains("json") {
            return Ok(CatalogFormat::Json);
        }
        if ct.contains("xml") {
            return Ok(CatalogFormat::Atom);
        }
    }
    match body.trim_start().chars().next() {
        Some('{') | Some('[') => Ok(CatalogFormat::Json),
        Some('<') => Ok(CatalogFormat::Atom),
        _ => Err(ClientError::CatalogParse(
            "payload is neither JSON nor XML".to_string(),
        )),
    }
}

fn parse_json_catalog(base_url: &str, body: &str) -> Result<Vec<ServiceDescriptor>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClientError::CatalogParse(format!("invalid JSON: {e}")))?;

    // v2 wraps entries in d.results; v4 uses a top-level value array.
    let entries = value["d"]["results"]
        .as_array()
        .or_else(|| value["value"].as_array())
        .ok_or_else(|| {
            ClientError::CatalogParse(
                "JSON payload has neither 'd.results' nor 'value'".to_string(),
            )
        })?;

    let mut services = Vec::new();
    for entry in entries {
        let Some(name) = entry["TechnicalServiceName"]
            .as_str()
            .or_else(|| entry["ServiceId"].as_str())
            .or_else(|| entry["name"].as_str())
        else {
            continue;
        };
        // Identity is the name; the catalog may list one service per version.
        if services.iter().any(|s: &ServiceDescriptor| s.name == name) {
            continue;
        }

        let title = entry["ServiceDescription"]
            .as_str()
            .or_else(|| entry["Title"].as_str())
            .or_else(|| entry["title"].as_str())
            .unwrap_or_default()
            .to_string();

        let url = entry["ServiceUrl"]
            .as_str()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_service_url(base_url, name));

        services.push(ServiceDescriptor {
            name: name.to_string(),
            title,
            url,
        });
    }
    Ok(services)
}

fn parse_atom_catalog(base_url: &str, body: &str) -> Result<Vec<ServiceDescriptor>> {
    let doc = Document::parse(body)
        .map_err(|e| ClientError::CatalogParse(format!("invalid XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "service" {
        return Err(ClientError::CatalogParse(format!(
            "expected an Atom service document, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut services = Vec::new();
    for collection in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "collection")
    {
        let Some(href) = collection.attribute("href") else {
            continue;
        };
        let name = href.trim_matches('/').to_string();
        if name.is_empty() || services.iter().any(|s: &ServiceDescriptor| s.name == name) {
            continue;
        }

        let title = collection
            .children()
            .find(|c| c.tag_name().name() == "title")
            .and_then(|t| t.text())
            .unwrap_or_default()
            .to_string();

        let url = resolve_href(base_url, href);
        services.push(ServiceDescriptor { name, title, url });
    }
    Ok(services)
}

fn default_service_url(base_url: &str, service_name: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        SERVICE_ROOT_PREFIX,
        service_name
    )
}

fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.trim_end_matches('/').to_string();
    }
    match Url::parse(base_url).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string().trim_end_matches('/').to_string(),
        Err(_) => format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_matches('/')
        ),
    }
}
