//! End-to-end tests for the drive extension, with the gateway stubbed by wiremock.
//!
//! The probe guest opens one path and replies with `x` when the open is denied, `e` when
//! the read fails, or the number of bytes it read. Request expectations on the mock
//! server are verified when it drops, so admission and caching behavior is asserted at
//! the network boundary, not just at the API.

use serde_json::json;
use weft_loader::{
    drive::{DriveConfig, StoreMode},
    test_utils::{drive_probe_guest, environment, message},
    Loader, LoaderConfig, ResultBundle, SandboxInstance,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Drive configuration pointing at the mock gateway, in the flat test layout.
fn gateway_config(server: &MockServer, admitted: &[&str]) -> DriveConfig {
    DriveConfig {
        endpoint: server.uri(),
        mode: StoreMode::Test,
        admission: admitted.iter().copied().collect(),
        ..DriveConfig::default()
    }
}

/// Instantiates the probe guest against `drive` and runs it once.
async fn probe(drive: DriveConfig) -> (SandboxInstance, ResultBundle) {
    let config = LoaderConfig::default().with_drive(drive);
    let wat = drive_probe_guest("/data/item", 16);
    let mut instance = Loader::new(&wat, config).unwrap().instantiate().await.unwrap();
    let bundle = instance.invoke(None, &message("msg-1"), &environment()).await.unwrap();
    (instance, bundle)
}

// ============================================================================
// ADMISSION
// ============================================================================

#[tokio::test]
async fn test_unadmitted_open_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weave".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let (_, bundle) = probe(gateway_config(&server, &[])).await;
    assert_eq!(bundle.output, json!("x"));
}

#[tokio::test]
async fn test_admission_is_per_identifier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weave".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    // A non-empty list still denies identifiers it does not name.
    let (_, bundle) = probe(gateway_config(&server, &["other"])).await;
    assert_eq!(bundle.output, json!("x"));
}

// ============================================================================
// FETCH AND CACHE
// ============================================================================

#[tokio::test]
async fn test_admitted_content_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weave".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (mut instance, first) = probe(gateway_config(&server, &["item"])).await;
    assert_eq!(first.output, json!("5"));

    // The second invocation reopens the path; the body comes from the instance cache.
    let second = instance.invoke(Some(&first.memory), &message("msg-2"), &environment()).await;
    assert_eq!(second.unwrap().output, json!("5"));
}

#[tokio::test]
async fn test_production_mode_uses_the_raw_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw/item"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weave".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let drive = DriveConfig {
        mode: StoreMode::Production,
        ..gateway_config(&server, &["item"])
    };
    let (_, bundle) = probe(drive).await;
    assert_eq!(bundle.output, json!("5"));
}

// ============================================================================
// UPSTREAM FAILURES
// ============================================================================

#[tokio::test]
async fn test_upstream_failure_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    // The guest observes the read sentinel and still replies normally.
    let (_, bundle) = probe(gateway_config(&server, &["item"])).await;
    assert_eq!(bundle.output, json!("e"));
}
