//! Session Client events and viewer broadcast events.
//!
//! `SessionEvent` is what the wrapped client reports; `ViewerEvent` is what
//! every connected viewer receives over the realtime channel.

use serde::{Deserialize, Serialize};

use crate::state::ConnectionState;

/// Lifecycle events emitted by a Session Client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login QR string was generated (raw, not yet encoded).
    Qr(String),
    Authenticated,
    LoadingScreen { percent: u8, message: String },
    Ready,
    AuthFailure(String),
    Disconnected(String),
    /// Informational state report from the client; never changes our state.
    ChangeState(String),
}

impl SessionEvent {
    /// State this event maps to, `None` for purely informational events.
    pub fn target_state(&self) -> Option<ConnectionState> {
        match self {
            SessionEvent::Qr(_) => Some(ConnectionState::QrReady),
            SessionEvent::Authenticated => Some(ConnectionState::Authenticated),
            SessionEvent::LoadingScreen { .. } => Some(ConnectionState::Loading),
            SessionEvent::Ready => Some(ConnectionState::Connected),
            SessionEvent::AuthFailure(_) => Some(ConnectionState::AuthFailed),
            SessionEvent::Disconnected(_) => Some(ConnectionState::Disconnected),
            SessionEvent::ChangeState(_) => None,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Qr(_) => "qr",
            SessionEvent::Authenticated => "authenticated",
            SessionEvent::LoadingScreen { .. } => "loading_screen",
            SessionEvent::Ready => "ready",
            SessionEvent::AuthFailure(_) => "auth_failure",
            SessionEvent::Disconnected(_) => "disconnected",
            SessionEvent::ChangeState(_) => "change_state",
        }
    }
}

/// Events broadcast to viewers.
///
/// Serialized as `{"event": "<name>", "data": <payload>}`; `ready` carries no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ViewerEvent {
    /// QR image as a data URL.
    Qr(String),
    Ready,
    Status {
        status: ConnectionState,
        message: String,
    },
    Loading {
        percent: u8,
        message: String,
    },
}

impl ViewerEvent {
    pub fn status(status: ConnectionState, message: impl Into<String>) -> Self {
        ViewerEvent::Status {
            status,
            message: message.into(),
        }
    }

    /// Status event carrying the state's standard message.
    pub fn snapshot_status(status: ConnectionState) -> Self {
        ViewerEvent::status(status, status.message())
    }

    /// Serialize to JSON string for WebSocket transmission.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
