//! Viewer channel: state replay for late joiners and live fan-out

use std::time::Duration;

use wagate_core::{ConnectionState, SessionEvent};
use wagate_e2e_tests::harness::TestGateway;
use wagate_e2e_tests::mocks::fixtures::{SessionScripts, factory_with};

#[tokio::test]
async fn test_late_viewer_after_connect_gets_snapshot_only() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::full_pairing())).await;
    gateway.wait_for_state(ConnectionState::Connected).await;

    let mut viewer = gateway.connect_viewer().await;
    let events = viewer.drain(Duration::from_millis(300)).await;

    assert_eq!(events.len(), 2, "unexpected replay: {:?}", events);
    assert_eq!(events[0]["event"], "status");
    assert_eq!(events[0]["data"]["status"], "connected");
    assert_eq!(events[1]["event"], "ready");
    assert!(events[1].get("data").is_none() || events[1]["data"].is_null());

    gateway.stop().await;
}

#[tokio::test]
async fn test_late_viewer_during_pairing_gets_qr() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let mut viewer = gateway.connect_viewer().await;
    let events = viewer.drain(Duration::from_millis(300)).await;

    assert_eq!(events.len(), 2, "unexpected replay: {:?}", events);
    assert_eq!(events[0]["data"]["status"], "qr_ready");
    assert_eq!(events[1]["event"], "qr");
    assert!(events[1]["data"].as_str().unwrap().starts_with("data:image/"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_live_events_reach_every_viewer() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let mut first = gateway.connect_viewer().await;
    let mut second = gateway.connect_viewer().await;
    first.next_named("qr").await;
    second.next_named("qr").await;

    assert!(gateway.factory.emit(SessionEvent::Authenticated));
    assert!(gateway.factory.emit(SessionEvent::Ready));

    for viewer in [&mut first, &mut second] {
        let (_, skipped) = viewer.next_named("ready").await;
        let states: Vec<&str> = skipped
            .iter()
            .filter_map(|e| e["data"]["status"].as_str())
            .collect();
        assert_eq!(states, vec!["authenticated", "connected"]);
    }

    gateway.stop().await;
}

#[tokio::test]
async fn test_departed_viewer_does_not_block_others() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let leaving = gateway.connect_viewer().await;
    let mut staying = gateway.connect_viewer().await;
    staying.next_named("qr").await;
    leaving.close().await;

    assert!(gateway.factory.emit(SessionEvent::Authenticated));
    assert!(gateway.factory.emit(SessionEvent::Ready));
    staying.next_named("ready").await;

    gateway.stop().await;
}
