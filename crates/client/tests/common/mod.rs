//! Common test utilities for integration tests.
//!
//! Helpers to stand up a mocked SAP gateway: catalog and metadata payload
//! builders plus a client wired at a wiremock server. All integration tests
//! use these to keep mock payloads consistent.

use std::time::Duration;

use serde_json::json;

#[allow(unused_imports)]
pub use wiremock::matchers::{body_json, header, method, path, query_param};
#[allow(unused_imports)]
pub use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(unused_imports)]
pub use sap_odata_client::{
    ClientError, Filter, FilterOp, QueryOutcome, QuerySpec, SapClient, SapClientBuilder,
};

pub const CATALOG_PATH: &str = "/IWFND/CATALOGSERVICE;v=2/ServiceCollection";

/// Build a v2 JSON catalog payload listing the given technical service names.
#[allow(dead_code)]
pub fn catalog_body(base: &str, services: &[&str]) -> serde_json::Value {
    let results: Vec<serde_json::Value> = services
        .iter()
        .map(|name| {
            json!({
                "TechnicalServiceName": name,
                "ServiceDescription": format!("{name} service"),
                "ServiceUrl": format!("{base}/sap/opu/odata/sap/{name}"),
            })
        })
        .collect();
    json!({"d": {"results": results}})
}

/// Path of a mocked service's root.
#[allow(dead_code)]
pub fn service_path(service: &str) -> String {
    format!("/sap/opu/odata/sap/{service}")
}

/// EDMX metadata declaring one keyed `Orders` entity set.
#[allow(dead_code)]
pub fn orders_metadata() -> String {
    entity_metadata("Orders", "OrderType")
}

/// EDMX metadata declaring one keyed entity set with fields `OrderId` (key,
/// string), `Amount` (number), and `Customer` (string).
#[allow(dead_code)]
pub fn entity_metadata(set_name: &str, type_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="{type_name}">
        <Key><PropertyRef Name="OrderId"/></Key>
        <Property Name="OrderId" Type="Edm.String" Nullable="false"/>
        <Property Name="Amount" Type="Edm.Decimal"/>
        <Property Name="Customer" Type="Edm.String"/>
      </EntityType>
      <EntityContainer Name="NS_Entities">
        <EntitySet Name="{set_name}" EntityType="NS.{type_name}"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#
    )
}

/// Mount catalog and metadata mocks for one service exposing `Orders`.
#[allow(dead_code)]
pub async fn mount_orders_service(server: &MockServer, service: &str) {
    Mock::given(method("GET"))
        .and(path(CATALOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body(&server.uri(), &[service])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/$metadata", service_path(service))))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(orders_metadata())
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

/// Build a client pointed at the mock server with basic-auth credentials.
#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> SapClient {
    SapClientBuilder::new()
        .base_url(server.uri())
        .credentials(sap_odata_config::Credentials {
            username: "DEVELOPER".to_string(),
            password: secrecy::SecretString::new("secret".to_string().into()),
        })
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
