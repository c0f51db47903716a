//! Journey: sending messages through the HTTP API

use reqwest::StatusCode;
use serde_json::{Value, json};
use wagate_core::ConnectionState;
use wagate_e2e_tests::harness::TestGateway;
use wagate_e2e_tests::mocks::fixtures::{SessionScripts, factory_with};

async fn post_send(gateway: &TestGateway, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(gateway.url("/send-message"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let code = response.status();
    (code, response.json().await.unwrap())
}

async fn connected_gateway() -> TestGateway {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::full_pairing())).await;
    gateway.wait_for_state(ConnectionState::Connected).await;
    gateway
}

#[tokio::test]
async fn test_local_number_is_normalized() {
    let gateway = connected_gateway().await;

    let (code, reply) = post_send(&gateway, json!({ "nomor": "0821-195-09135", "pesan": "Halo" })).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(reply["success"], true);
    assert_eq!(reply["to"], "6282119509135");
    assert!(reply["timestamp"].is_string());

    assert_eq!(
        gateway.factory.sent_messages(),
        vec![("6282119509135@c.us".to_string(), "Halo".to_string())]
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_send_rejected_while_pairing() {
    let gateway = TestGateway::start_initialized(factory_with(SessionScripts::awaiting_scan())).await;
    gateway.wait_for_state(ConnectionState::QrReady).await;

    let (code, reply) = post_send(&gateway, json!({ "nomor": "628123", "pesan": "hi" })).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "WhatsApp client not ready. Status: qr_ready");
    assert!(gateway.factory.sent_messages().is_empty());

    gateway.stop().await;
}

#[tokio::test]
async fn test_missing_fields() {
    let gateway = connected_gateway().await;

    for body in [
        json!({ "nomor": "628123" }),
        json!({ "pesan": "hi" }),
        json!({ "nomor": "   ", "pesan": "hi" }),
        json!({}),
    ] {
        let (code, reply) = post_send(&gateway, body).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "Number and message are required");
    }
    assert!(gateway.factory.sent_messages().is_empty());

    gateway.stop().await;
}

#[tokio::test]
async fn test_upstream_failure_keeps_session() {
    let gateway = connected_gateway().await;
    gateway.factory.fail_next_send("Evaluation failed: chat not found");

    let (code, reply) = post_send(&gateway, json!({ "nomor": "628123", "pesan": "hi" })).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "Evaluation failed: chat not found");

    // The session is still usable afterwards.
    let (code, _) = post_send(&gateway, json!({ "nomor": "628123", "pesan": "again" })).await;
    assert_eq!(code, StatusCode::OK);

    gateway.stop().await;
}

#[tokio::test]
async fn test_form_encoded_body() {
    let gateway = connected_gateway().await;

    let response = reqwest::Client::new()
        .post(gateway.url("/send-message"))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("nomor=081234567&pesan=Tagihan+bulan+ini")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["to"], "6281234567");
    assert_eq!(
        gateway.factory.sent_messages(),
        vec![("6281234567@c.us".to_string(), "Tagihan bulan ini".to_string())]
    );

    gateway.stop().await;
}
