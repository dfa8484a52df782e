//! Integration tests for live daemon telemetry over HTTP
//!
//! A mockito server plays the daemon so the real reqwest client, headers and
//! JSON decoding are exercised end to end.

use std::sync::Arc;
use std::time::Duration;

use billing_core::services::capacity::{CapacityCheckOutcome, HttpDaemonClient, NodeCapacityChecker};
use billing_core::services::quote::{QuoteEngine, QuoteLine, QuoteOptions};
use billing_core::{BillingConfig, Catalog, Error, Node, ResourceCatalogEntry};
use mockito::{Mock, Server, ServerGuard};

const GIB: u64 = 1024 * 1024 * 1024;
const TOKEN: &str = "daemon-token";

/// Node whose daemon is the mock server
fn node(server: &ServerGuard) -> Node {
    let address = server.host_with_port();
    let (host, port) = address.rsplit_once(':').expect("host:port");
    Node::new(1, "node-live", 65_536, 1_000_000).with_daemon(
        "http",
        host,
        port.parse().expect("port"),
        TOKEN,
    )
}

fn enabled() -> BillingConfig {
    BillingConfig {
        enabled: true,
        daemon_timeout_secs: 2,
        ..BillingConfig::default()
    }
}

fn checker() -> NodeCapacityChecker {
    let client = HttpDaemonClient::with_timeout(Duration::from_secs(2));
    NodeCapacityChecker::new(Arc::new(client), &enabled())
}

async fn mock_json(server: &mut ServerGuard, path: &str, body: serde_json::Value, hits: usize) -> Mock {
    server
        .mock("GET", path)
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_daemon_shortfall_rejects_quote() {
    let mut server = Server::new_async().await;
    let system = mock_json(&mut server, "/api/system", serde_json::json!({"system": {"supercharged": true}}), 1).await;
    let utilization = mock_json(
        &mut server,
        "/api/system/utilization",
        serde_json::json!({"memory_total": 4 * GIB, "memory_used": 7 * GIB / 2, "disk_total": 100 * GIB, "disk_used": 0}),
        1,
    )
    .await;

    let err = checker()
        .assert_can_allocate(&node(&server), 600, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientCapacity { ref node, .. } if node == "node-live"));
    assert!(err.to_string().contains("512 MB available"));

    system.assert_async().await;
    utilization.assert_async().await;
}

#[tokio::test]
async fn test_daemon_with_room_confirms_quote() {
    let mut server = Server::new_async().await;
    let system = mock_json(&mut server, "/api/system", serde_json::json!({"supercharged": true}), 1).await;
    let utilization = mock_json(
        &mut server,
        "/api/system/utilization",
        serde_json::json!({"memory_total": 16 * GIB, "memory_used": 2 * GIB, "disk_total": 200 * GIB, "disk_used": 50 * GIB}),
        1,
    )
    .await;

    let catalog = Catalog::new(vec![
        ResourceCatalogEntry::new("memory", 5.0).with_base_quantity(1024).with_step(1024),
        ResourceCatalogEntry::new("disk", 0.5).with_base_quantity(1024).with_step(1024),
    ]);
    let engine = QuoteEngine::new(catalog).with_capacity_checker(Arc::new(checker()));
    let options = QuoteOptions::new(true, true, Some(node(&server)));

    let (quote, outcome) = engine
        .quote_with_outcome(
            &[QuoteLine::new("memory", 4096), QuoteLine::new("disk", 20_480)],
            None,
            &options,
        )
        .await
        .unwrap();
    assert_eq!(quote.total(), 30.0);
    assert_eq!(outcome, Some(CapacityCheckOutcome::Confirmed));

    system.assert_async().await;
    utilization.assert_async().await;
}

#[tokio::test]
async fn test_daemon_error_status_fails_open() {
    let mut server = Server::new_async().await;
    let system = server
        .mock("GET", "/api/system")
        .with_status(500)
        .with_body("daemon exploded")
        .expect(1)
        .create_async()
        .await;

    let outcome = checker()
        .assert_can_allocate(&node(&server), 1024, 0)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CapacityCheckOutcome::SkippedDaemonError {
            reason: "Daemon returned HTTP 500".to_string()
        }
    );

    system.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_daemon_fails_open() {
    // Bind then drop so the port is very likely closed
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let node = Node::new(1, "node-gone", 65_536, 1_000_000).with_daemon("http", "127.0.0.1", port, TOKEN);

    let outcome = checker().assert_can_allocate(&node, 1024, 0).await.unwrap();
    assert!(matches!(outcome, CapacityCheckOutcome::SkippedDaemonError { .. }));
}

#[tokio::test]
async fn test_not_supercharged_skips_utilization_call() {
    let mut server = Server::new_async().await;
    let system = mock_json(&mut server, "/api/system", serde_json::json!({"system": {"supercharged": false}}), 1).await;
    let utilization = mock_json(&mut server, "/api/system/utilization", serde_json::json!({}), 0).await;

    let outcome = checker()
        .assert_can_allocate(&node(&server), 1024, 0)
        .await
        .unwrap();
    assert_eq!(outcome, CapacityCheckOutcome::SkippedNoTelemetry);

    system.assert_async().await;
    utilization.assert_async().await;
}
