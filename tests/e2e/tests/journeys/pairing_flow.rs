//! Journey: pairing a device from first start to connected

use std::time::Duration;

use serde_json::Value;
use wagate_core::{ConnectionState, SessionEvent};
use wagate_e2e_tests::harness::TestGateway;
use wagate_e2e_tests::mocks::fixtures::{SessionScripts, factory_with};

async fn get_json(url: String) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn test_viewer_follows_full_pairing() {
    let gateway = TestGateway::start(factory_with(SessionScripts::full_pairing())).await;
    let mut viewer = gateway.connect_viewer().await;

    let first = viewer.next_event().await;
    assert_eq!(first["event"], "status");
    assert_eq!(first["data"]["status"], "initializing");

    gateway.coordinator.initialize().await;

    let (_, before_ready) = viewer.next_named("ready").await;

    let qr = before_ready
        .iter()
        .find(|e| e["event"] == "qr")
        .expect("no qr event");
    assert!(qr["data"].as_str().unwrap().starts_with("data:image/svg+xml;base64,"));

    let states: Vec<&str> = before_ready
        .iter()
        .filter(|e| e["event"] == "status")
        .filter_map(|e| e["data"]["status"].as_str())
        .collect();
    for expected in ["qr_ready", "authenticated", "loading", "connected"] {
        assert!(states.contains(&expected), "missing {} in {:?}", expected, states);
    }

    let loading: Vec<&Value> = before_ready.iter().filter(|e| e["event"] == "loading").collect();
    assert_eq!(loading.len(), 2);
    assert_eq!(loading[1]["data"]["percent"], 100);

    // Exactly one ready per ready transition.
    let after = viewer.drain(Duration::from_millis(200)).await;
    assert!(after.iter().all(|e| e["event"] != "ready"));

    let status = get_json(gateway.url("/status")).await;
    assert_eq!(status["whatsapp"], "connected");
    assert_eq!(status["ready"], true);
    assert_eq!(status["qrAvailable"], false);
    assert_eq!(status["clientInitialized"], true);

    viewer.close().await;
    gateway.stop().await;
}

#[tokio::test]
async fn test_qr_available_only_while_pairing() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let qr = get_json(gateway.url("/qr")).await;
    assert_eq!(qr["success"], true);
    assert_eq!(qr["status"], "qr_ready");
    assert!(qr["qr"].as_str().unwrap().starts_with("data:image/"));

    assert!(gateway.factory.emit(SessionEvent::Authenticated));
    gateway.wait_for_state(ConnectionState::Authenticated).await;
    assert_eq!(get_json(gateway.url("/qr")).await["success"], true);

    assert!(gateway.factory.emit(SessionEvent::Ready));
    gateway.wait_for_state(ConnectionState::Connected).await;

    let qr = get_json(gateway.url("/qr")).await;
    assert_eq!(qr["success"], false);
    assert_eq!(qr["ready"], true);

    gateway.stop().await;
}

#[tokio::test]
async fn test_restored_session_skips_qr() {
    let gateway = TestGateway::start(factory_with(SessionScripts::restored_session())).await;
    let mut viewer = gateway.connect_viewer().await;
    gateway.coordinator.initialize().await;

    let (_, before_ready) = viewer.next_named("ready").await;
    assert!(before_ready.iter().all(|e| e["event"] != "qr"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_auth_failure_drops_qr() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;
    let mut viewer = gateway.connect_viewer().await;

    assert!(gateway.factory.emit(SessionEvent::AuthFailure("credentials rejected".to_string())));
    let status = viewer.next_status("auth_failed").await;
    assert!(
        status["data"]["message"]
            .as_str()
            .unwrap()
            .contains("credentials rejected")
    );

    let qr = get_json(gateway.url("/qr")).await;
    assert_eq!(qr["success"], false);
    assert_eq!(qr["status"], "auth_failed");

    gateway.stop().await;
}

#[tokio::test]
async fn test_failed_start_reports_error() {
    let factory = factory_with(SessionScripts::awaiting_scan());
    factory.fail_initialize(true);
    let gateway = TestGateway::start_initialized(factory).await;

    gateway.wait_for_state(ConnectionState::Error).await;
    let status = get_json(gateway.url("/status")).await;
    assert_eq!(status["whatsapp"], "error");
    assert_eq!(status["ready"], false);

    // A restart recovers once the client can start.
    gateway.factory.fail_initialize(false);
    let reply: Value = reqwest::Client::new()
        .post(gateway.url("/restart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["success"], true);
    gateway.wait_for_state(ConnectionState::QrReady).await;

    gateway.stop().await;
}
