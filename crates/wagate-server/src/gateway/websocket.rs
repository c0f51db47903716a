//! Viewer WebSocket
//!
//! Viewers connect to `/ws`, receive the events describing the current state,
//! then every viewer event as `{"event": ..., "data": ...}` JSON text frames.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::AppState;

/// WebSocket upgrade handler - GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let viewer_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Snapshot and receiver come from the same critical section: nothing is
    // missed between them and nothing is delivered twice.
    let (snapshot, mut event_rx) = state.coordinator.subscribe().await;
    info!(
        viewer = %viewer_id,
        viewers = state.coordinator.viewer_count(),
        "Viewer connected"
    );

    for event in snapshot {
        if sender.send(Message::Text(event.to_json().into())).await.is_err() {
            debug!(viewer = %viewer_id, "Viewer left during replay");
            return;
        }
    }

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if sender.send(Message::Text(event.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(viewer = %viewer_id, skipped, "Viewer fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(viewer = %viewer_id, "Ignoring viewer message: {}", text.as_str());
                    }
                    Some(Err(e)) => {
                        warn!(viewer = %viewer_id, "WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(event_rx);
    info!(
        viewer = %viewer_id,
        viewers = state.coordinator.viewer_count(),
        "Viewer disconnected"
    );
}
