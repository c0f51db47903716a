//! Test Gateway
//!
//! Runs the real router on `127.0.0.1:0` with a scripted session client and
//! a short reconstruction delay. The server task stops on [`TestGateway::stop`]
//! or when the gateway is dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wagate_core::testing::ScriptedFactory;
use wagate_core::{ConnectionState, Coordinator, CoordinatorConfig};
use wagate_server::gateway;
use wagate_server::relay::RelayClient;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running gateway for one test.
pub struct TestGateway {
    pub factory: ScriptedFactory,
    pub coordinator: Coordinator,
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl TestGateway {
    /// Start a gateway without initializing the session client.
    pub async fn start(factory: ScriptedFactory) -> Self {
        Self::start_with_delay(factory, Duration::from_millis(20)).await
    }

    /// Start with a specific pause between teardown and reconstruction.
    pub async fn start_with_delay(factory: ScriptedFactory, reinit_delay: Duration) -> Self {
        let coordinator = Coordinator::new(
            Arc::new(factory.clone()),
            CoordinatorConfig {
                reinit_delay,
                ..CoordinatorConfig::default()
            },
        );
        let router = gateway::build_router(coordinator.clone(), &[]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let _ = gateway::serve(listener, router, async {
                let _ = rx.await;
            })
            .await;
        });

        Self {
            factory,
            coordinator,
            addr,
            shutdown: Some(tx),
            server,
        }
    }

    /// Start a gateway and initialize the session client.
    pub async fn start_initialized(factory: ScriptedFactory) -> Self {
        let gateway = Self::start(factory).await;
        gateway.coordinator.initialize().await;
        gateway
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn relay(&self) -> RelayClient {
        RelayClient::new(&self.url(""), Duration::from_secs(5)).unwrap()
    }

    pub async fn connect_viewer(&self) -> Viewer {
        let (stream, _) = connect_async(self.ws_url()).await.unwrap();
        Viewer { stream }
    }

    /// Poll until the connection state matches, or panic after a timeout.
    pub async fn wait_for_state(&self, expected: ConnectionState) {
        let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
        loop {
            let state = self.coordinator.status().await.connection_state;
            if state == expected {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("state stuck at {} while waiting for {}", state, expected);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until `check` holds, or panic after a timeout.
    pub async fn wait_until<F>(&self, what: &str, check: F)
    where
        F: Fn(&ScriptedFactory) -> bool,
    {
        let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
        while !check(&self.factory) {
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {}", what);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn stop(mut self) {
        self.coordinator.shutdown().await;
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut self.server).await;
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A WebSocket viewer.
pub struct Viewer {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Viewer {
    /// Next viewer event, or `None` if nothing arrives within `within`.
    pub async fn try_next(&mut self, within: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let msg = tokio::time::timeout(remaining, self.stream.next()).await.ok()??;
            match msg.ok()? {
                Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Next viewer event; panics if none arrives.
    pub async fn next_event(&mut self) -> Value {
        self.try_next(EVENT_TIMEOUT)
            .await
            .expect("viewer received no event")
    }

    /// Skip events until one named `name` arrives; returns it and the skipped ones.
    pub async fn next_named(&mut self, name: &str) -> (Value, Vec<Value>) {
        let mut skipped = Vec::new();
        loop {
            let event = self.next_event().await;
            if event["event"] == name {
                return (event, skipped);
            }
            skipped.push(event);
        }
    }

    /// Skip events until a status with the given state arrives.
    pub async fn next_status(&mut self, state: &str) -> Value {
        loop {
            let event = self.next_event().await;
            if event["event"] == "status" && event["data"]["status"] == state {
                return event;
            }
        }
    }

    /// Every event arriving within `within`.
    pub async fn drain(&mut self, within: Duration) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next(within).await {
            events.push(event);
        }
        events
    }

    pub async fn close(mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
    }
}
