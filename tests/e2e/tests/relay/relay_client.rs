//! Admin relay client against a live gateway

use std::time::Duration;

use wagate_core::{ConnectionState, GatewayError, SessionEvent};
use wagate_e2e_tests::harness::TestGateway;
use wagate_e2e_tests::mocks::fixtures::{SessionScripts, factory_with};
use wagate_server::relay::RelayClient;

#[tokio::test]
async fn test_status_probe() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let status = gateway.relay().status().await.unwrap();
    assert_eq!(status.server, "running");
    assert_eq!(status.whatsapp, ConnectionState::QrReady);
    assert!(status.qr_available);
    assert!(!status.ready);

    let qr = gateway.relay().qr().await.unwrap();
    assert!(qr.starts_with("data:image/svg+xml;base64,"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_wait_ready_until_connected() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let relay = gateway.relay();
    let waiter = tokio::spawn(async move { relay.wait_ready(Duration::from_secs(5), true).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gateway.factory.emit(SessionEvent::Authenticated));
    assert!(gateway.factory.emit(SessionEvent::Ready));

    let status = waiter.await.unwrap().unwrap();
    assert!(status.ready);
    assert_eq!(status.whatsapp, ConnectionState::Connected);

    gateway.stop().await;
}

#[tokio::test]
async fn test_wait_ready_reports_pairing_state() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let err = gateway
        .relay()
        .wait_ready(Duration::from_millis(600), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::NotReady {
            state: ConnectionState::QrReady
        }
    ));

    gateway.stop().await;
}

#[tokio::test]
async fn test_send_and_errors() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::full_pairing())).await;
    gateway.wait_for_state(ConnectionState::Connected).await;
    let relay = gateway.relay();

    assert_eq!(relay.send("0812-3456", "ping").await.unwrap(), "628123456");

    let err = relay.send("", "ping").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidInput(_)));

    gateway.factory.fail_next_send("rate limited");
    let err = relay.send("628123", "ping").await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamFailure(ref m) if m == "rate limited"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_logout_when_not_connected_is_not_ready() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let err = gateway.relay().logout().await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::NotReady {
            state: ConnectionState::QrReady
        }
    ));

    gateway.stop().await;
}

#[tokio::test]
async fn test_stopped_gateway_is_unreachable() {
    let gateway = TestGateway::start(factory_with(SessionScripts::awaiting_scan())).await;
    let url = gateway.url("");
    gateway.stop().await;

    let relay = RelayClient::new(&url, Duration::from_secs(1)).unwrap();
    assert!(matches!(
        relay.status().await,
        Err(GatewayError::Unreachable(_))
    ));
    assert!(matches!(
        relay.restart().await,
        Err(GatewayError::Unreachable(_))
    ));
}
