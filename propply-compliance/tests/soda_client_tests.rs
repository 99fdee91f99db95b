//! SODA client and HTTP transport tests
//!
//! Tests:
//! - Pagination stops on a short page
//! - The record cap shrinks the last page instead of over-fetching
//! - 5xx and timeouts are retried once; 4xx is not retried
//! - Unmapped fields are rejected before any request
//! - `HttpTransport` against a loopback stub: query string, app token,
//!   error bodies, malformed bodies, timeouts

mod helpers;

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use helpers::*;
use propply_compliance::registry::{DatasetRegistry, Domain, SemanticField};
use propply_compliance::soda::{FilterClause, HttpTransport, SodaClient, SodaCredentials, SodaError, SodaTransport};
use serde_json::{json, Value};

fn rows(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "violationid": i.to_string() })).collect()
}

fn small_pages() -> DatasetRegistry {
    DatasetRegistry::nyc().unwrap().with_page_size(2)
}

#[tokio::test]
async fn test_pagination_until_short_page() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_rows(HPD, rows(2));
    transport.push_rows(HPD, rows(2));
    transport.push_rows(HPD, rows(1));

    let registry = small_pages();
    let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();
    let records = client(&transport).fetch_all(hpd, &[], None).await.unwrap();

    assert_eq!(records.len(), 5);
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    let offsets: Vec<_> = calls.iter().map(|c| c.param("$offset").unwrap()).collect();
    assert_eq!(offsets, vec!["0", "2", "4"]);
    assert!(calls.iter().all(|c| c.param("$limit") == Some("2")));
    assert_eq!(calls[0].param("$order"), Some("inspectiondate DESC"));
}

#[tokio::test]
async fn test_cap_shrinks_last_page() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_rows(HPD, rows(2));
    transport.push_rows(HPD, rows(1));

    let registry = small_pages();
    let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();
    let records = client(&transport).fetch_all(hpd, &[], Some(3)).await.unwrap();

    assert_eq!(records.len(), 3);
    let limits: Vec<_> = transport
        .calls()
        .iter()
        .map(|c| c.param("$limit").unwrap().to_string())
        .collect();
    assert_eq!(limits, vec!["2", "1"]);
}

#[tokio::test]
async fn test_server_error_retried_once() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(HPD, Err(http_error(503, HPD)));
    transport.push_rows(HPD, rows(1));

    let registry = registry();
    let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();
    let records = client(&transport).fetch(hpd, &[], &[], 10, 0).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_timeout_surfaces_after_one_retry() {
    let transport = Arc::new(ScriptedTransport::failing(timeout_error(HPD)));

    let registry = registry();
    let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();
    let err = client(&transport).fetch(hpd, &[], &[], 10, 0).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(HPD, Err(http_error(400, HPD)));
    transport.push_rows(HPD, rows(1));

    let registry = registry();
    let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();
    let err = client(&transport).fetch(hpd, &[], &[], 10, 0).await.unwrap_err();

    assert_eq!(err.status_code(), Some(400));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn test_unmapped_field_rejected_before_io() {
    let transport = Arc::new(ScriptedTransport::new());

    let registry = registry();
    let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();
    let filters = [FilterClause::eq(SemanticField::HouseNumber, "140")];
    let err = client(&transport).fetch(boiler, &filters, &[], 10, 0).await.unwrap_err();

    assert!(matches!(err, SodaError::UnmappedField { .. }));
    assert!(transport.calls().is_empty());
}

// ----------------------------------------------------------------------------
// HttpTransport against a loopback stub
// ----------------------------------------------------------------------------

async fn echo(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let token = headers
        .get("x-app-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!([{
        "token": token,
        "where": params.get("$where").cloned().unwrap_or_default(),
        "limit": params.get("$limit").cloned().unwrap_or_default(),
    }]))
}

async fn stub_transport(timeout: Duration) -> HttpTransport {
    let router = Router::new()
        .route("/resource/echo-0001.json", get(echo))
        .route(
            "/resource/bad-0001.json",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": true, "message": "No such column: house_number"})),
                )
            }),
        )
        .route("/resource/html-0001.json", get(|| async { "<html>maintenance</html>" }))
        .route(
            "/resource/slow-0001.json",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!([]))
            }),
        );
    let addr = spawn_stub(router).await;

    HttpTransport::new(
        format!("http://{}/resource/", addr),
        SodaCredentials {
            app_token: Some("test-token".to_string()),
            api_key: None,
        },
        timeout,
        NonZeroU32::new(100).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_http_transport_sends_query_and_token() {
    let transport = stub_transport(Duration::from_secs(5)).await;
    let params = vec![
        ("$where".to_string(), "bin_number = '4433339'".to_string()),
        ("$limit".to_string(), "10".to_string()),
    ];

    let rows = transport.get("echo-0001", &params).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["token"], "test-token");
    assert_eq!(rows[0]["where"], "bin_number = '4433339'");
    assert_eq!(rows[0]["limit"], "10");
}

#[tokio::test]
async fn test_http_transport_classifies_failures() {
    let transport = stub_transport(Duration::from_millis(300)).await;

    match transport.get("bad-0001", &[]).await.unwrap_err() {
        SodaError::UpstreamRequest {
            status_code,
            dataset_id,
            message,
        } => {
            assert_eq!(status_code, 400);
            assert_eq!(dataset_id, "bad-0001");
            assert_eq!(message, "No such column: house_number");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = transport.get("html-0001", &[]).await.unwrap_err();
    assert!(matches!(err, SodaError::MalformedResponse { .. }));

    let err = transport.get("slow-0001", &[]).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_client_over_http_transport() {
    let transport: Arc<dyn SodaTransport> = Arc::new(stub_transport(Duration::from_secs(5)).await);
    let client = SodaClient::new(transport, Default::default());

    let registry = registry();
    let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();
    // The registry maps the boiler dataset to its real id, which the stub does not serve
    let err = client
        .fetch(boiler, &[FilterClause::eq(SemanticField::Bin, "4433339")], &[], 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}
