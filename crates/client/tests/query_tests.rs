//! Integration tests for resolution, query execution, pagination, and writes.

mod common;

use common::*;
use sap_odata_config::QueryLimits;
use serde_json::json;

fn rows_page(first: usize, count: usize, next: Option<&str>) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = (first..first + count)
        .map(|i| {
            json!({
                "__metadata": {"uri": format!("Orders('{i}')")},
                "OrderId": i.to_string(),
                "Customer": "ACME",
            })
        })
        .collect();
    match next {
        Some(next) => json!({"d": {"results": rows, "__next": next}}),
        None => json!({"d": {"results": rows}}),
    }
}

#[tokio::test]
async fn smart_query_resolves_hint_and_returns_rows() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("GET"))
        .and(path(format!("{}/Orders", service_path("SALES_SRV"))))
        .and(query_param("$filter", "Customer eq 'ACME'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_page(1, 2, None)))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let spec = QuerySpec {
        filters: vec![Filter {
            field: "Customer".to_string(),
            op: FilterOp::Eq,
            value: json!("ACME"),
        }],
        ..Default::default()
    };
    let outcome = client.smart_query("orders", None, &spec).await.unwrap();

    match outcome {
        QueryOutcome::Rows { resolution, result } => {
            assert_eq!(resolution.entity_set.name, "Orders");
            assert_eq!(resolution.score, 1.0);
            assert_eq!(result.rows.len(), 2);
            // Envelope bookkeeping is stripped from normalized rows.
            assert!(!result.rows[0].contains_key("__metadata"));
            assert_eq!(result.rows[0]["OrderId"], json!("1"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn smart_query_reports_ambiguity_with_candidates() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path(CATALOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body(&base, &["CUST_SRV"])))
        .mount(&server)
        .await;
    let metadata = r#"<Edmx><DataServices><Schema>
        <EntityType Name="OrderType">
          <Key><PropertyRef Name="Id"/></Key>
          <Property Name="Id" Type="Edm.String"/>
        </EntityType>
        <EntityContainer>
          <EntitySet Name="CustomerOrder" EntityType="NS.OrderType"/>
          <EntitySet Name="CustomerInvoice" EntityType="NS.OrderType"/>
        </EntityContainer>
    </Schema></DataServices></Edmx>"#;
    Mock::given(method("GET"))
        .and(path(format!("{}/$metadata", service_path("CUST_SRV"))))
        .respond_with(ResponseTemplate::new(200).set_body_string(metadata))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let outcome = client
        .smart_query("customer", None, &QuerySpec::default())
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Ambiguous { candidates, .. } => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn unresolvable_hint_is_an_error() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    let client = test_client(&server);
    let err = client
        .smart_query("warehouse stock levels", None, &QuerySpec::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoMatch { .. }));
}

#[tokio::test]
async fn pagination_follows_next_links() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_orders_service(&server, "SALES_SRV").await;

    let orders_path = format!("{}/Orders", service_path("SALES_SRV"));
    Mock::given(method("GET"))
        .and(path(&orders_path))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_page(
            11,
            10,
            Some(&format!("{base}{orders_path}?page=3")),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(&orders_path))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_page(21, 10, None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(&orders_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_page(
            1,
            10,
            Some(&format!("{base}{orders_path}?page=2")),
        )))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let spec = QuerySpec {
        fetch_all: true,
        ..Default::default()
    };
    let result = client.execute("SALES_SRV", "Orders", &spec).await.unwrap();

    assert_eq!(result.rows.len(), 30);
    assert_eq!(result.pages_fetched, 3);
    assert!(!result.truncated);
    assert_eq!(result.rows[29]["OrderId"], json!("30"));
}

#[tokio::test]
async fn page_limit_truncates_pagination() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_orders_service(&server, "SALES_SRV").await;

    let orders_path = format!("{}/Orders", service_path("SALES_SRV"));
    // Every page advertises another one; only the limit stops the walk.
    Mock::given(method("GET"))
        .and(path(&orders_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_page(
            1,
            10,
            Some(&format!("{base}{orders_path}?page=next")),
        )))
        .mount(&server)
        .await;

    let mut client_builder = SapClientBuilder::new().base_url(server.uri());
    client_builder = client_builder.limits(QueryLimits {
        max_pages: 2,
        ..QueryLimits::default()
    });
    let client = client_builder.build().unwrap();

    let spec = QuerySpec {
        fetch_all: true,
        ..Default::default()
    };
    let result = client.execute("SALES_SRV", "Orders", &spec).await.unwrap();
    assert_eq!(result.pages_fetched, 2);
    assert!(result.truncated);
}

#[tokio::test]
async fn unknown_field_fails_before_any_network_call() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    // Zero queries may reach the collection.
    Mock::given(method("GET"))
        .and(path(format!("{}/Orders", service_path("SALES_SRV"))))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let spec = QuerySpec {
        filters: vec![Filter {
            field: "Customr".to_string(),
            op: FilterOp::Eq,
            value: json!("ACME"),
        }],
        ..Default::default()
    };
    let err = client.execute("SALES_SRV", "Orders", &spec).await.unwrap_err();

    match err {
        ClientError::UnknownField { field, valid_fields, .. } => {
            assert_eq!(field, "Customr");
            assert_eq!(valid_fields, vec!["OrderId", "Amount", "Customer"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn remote_rejection_carries_the_gateway_message() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("GET"))
        .and(path(format!("{}/Orders", service_path("SALES_SRV"))))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "X", "message": {"lang": "en", "value": "Invalid filter expression"}}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .execute("SALES_SRV", "Orders", &QuerySpec::default())
        .await
        .unwrap_err();
    match err {
        ClientError::RemoteQuery { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid filter expression");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn create_negotiates_csrf_token() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("HEAD"))
        .and(path(service_path("SALES_SRV")))
        .respond_with(ResponseTemplate::new(200).insert_header("X-CSRF-Token", "token123"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/Orders", service_path("SALES_SRV"))))
        .and(header("X-CSRF-Token", "token123"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "d": {"__metadata": {"uri": "Orders('99')"}, "OrderId": "99", "Customer": "ACME"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut payload = sap_odata_client::Row::new();
    payload.insert("OrderId".to_string(), json!("99"));
    payload.insert("Customer".to_string(), json!("ACME"));

    let created = client.create("SALES_SRV", "Orders", &payload).await.unwrap();
    assert_eq!(created["OrderId"], json!("99"));
    assert!(!created.contains_key("__metadata"));
}

#[tokio::test]
async fn delete_addresses_entity_by_key() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("HEAD"))
        .and(path(service_path("SALES_SRV")))
        .respond_with(ResponseTemplate::new(200).insert_header("X-CSRF-Token", "token123"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/Orders('42')", service_path("SALES_SRV"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut keys = sap_odata_client::Row::new();
    keys.insert("OrderId".to_string(), json!("42"));
    client.delete("SALES_SRV", "Orders", &keys).await.unwrap();
}

#[tokio::test]
async fn function_import_passes_parameters_and_normalizes_rows() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("GET"))
        .and(path(format!("{}/CancelOrder", service_path("SALES_SRV"))))
        .and(query_param("OrderId", "'42'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {"__metadata": {"uri": "x"}, "OrderId": "42", "Status": "Cancelled"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut params = sap_odata_client::Row::new();
    params.insert("OrderId".to_string(), json!("42"));

    let rows = client
        .call_function("SALES_SRV", "CancelOrder", &params, false)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Status"], json!("Cancelled"));
    assert!(!rows[0].contains_key("__metadata"));
}

#[tokio::test]
async fn post_function_import_negotiates_csrf() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    Mock::given(method("HEAD"))
        .and(path(service_path("SALES_SRV")))
        .respond_with(ResponseTemplate::new(200).insert_header("X-CSRF-Token", "token123"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/ReleaseOrder", service_path("SALES_SRV"))))
        .and(query_param("OrderId", "'42'"))
        .and(header("X-CSRF-Token", "token123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut params = sap_odata_client::Row::new();
    params.insert("OrderId".to_string(), json!("42"));

    let rows = client
        .call_function("SALES_SRV", "ReleaseOrder", &params, true)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn missing_key_value_rejected_locally() {
    let server = MockServer::start().await;
    mount_orders_service(&server, "SALES_SRV").await;

    let client = test_client(&server);
    let keys = sap_odata_client::Row::new();
    let err = client.delete("SALES_SRV", "Orders", &keys).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingKeyField { .. }));
}
