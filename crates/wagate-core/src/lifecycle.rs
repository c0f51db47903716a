//! Connection lifecycle state machine
//!
//! Pure transition logic: every input mutates the owned state and returns the
//! viewer events that must be published, in order. No IO, no clocks, so the
//! coordinator can run it under its lock and tests can drive it directly.
//!
//! | Input              | New state        | QR payload  |
//! |--------------------|------------------|-------------|
//! | `qr`               | `qr_ready`       | set         |
//! | `authenticated`    | `authenticated`  | kept        |
//! | `loading_screen`   | `loading`        | kept        |
//! | `ready`            | `connected`      | cleared     |
//! | `auth_failure`     | `auth_failed`    | cleared     |
//! | `disconnected`     | `disconnected`   | cleared     |
//! | `change_state`     | unchanged        | kept        |
//! | logout accepted    | `disconnected`   | cleared     |
//! | restart accepted   | `restarting`     | cleared     |
//! | reconstruction     | `reinitializing` | cleared     |
//! | initialize failed  | `error`          | cleared     |
//!
//! The QR payload only survives inside the pairing window
//! (`qr_ready`, `authenticated`, `loading`).

use tracing::{debug, warn};

use crate::event::{SessionEvent, ViewerEvent};
use crate::qr::QrPayload;
use crate::state::ConnectionState;

/// Owned connection state, QR payload and initialization guard.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: ConnectionState,
    qr: Option<QrPayload>,
    initialized: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn qr(&self) -> Option<&QrPayload> {
        self.qr.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Ready to send: the client reported `ready` and nothing has undone it.
    pub fn is_ready(&self) -> bool {
        self.state.is_connected()
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Connection state changed");
        }
        self.state = state;
        if !state.is_pairing() {
            self.qr = None;
        }
    }

    /// Apply a Session Client event.
    pub fn apply(&mut self, event: &SessionEvent) -> Vec<ViewerEvent> {
        match event {
            SessionEvent::Qr(raw) => match QrPayload::encode(raw) {
                Ok(payload) => {
                    self.set_state(ConnectionState::QrReady);
                    let url = payload.as_str().to_string();
                    self.qr = Some(payload);
                    vec![
                        ViewerEvent::Qr(url),
                        ViewerEvent::snapshot_status(ConnectionState::QrReady),
                    ]
                }
                Err(e) => {
                    warn!(qr_len = raw.len(), "{}", e);
                    self.set_state(ConnectionState::Error);
                    vec![ViewerEvent::status(ConnectionState::Error, e.to_string())]
                }
            },
            SessionEvent::Authenticated => {
                self.set_state(ConnectionState::Authenticated);
                vec![ViewerEvent::status(
                    ConnectionState::Authenticated,
                    "Authenticated, waiting for connection...",
                )]
            }
            SessionEvent::LoadingScreen { percent, message } => {
                self.set_state(ConnectionState::Loading);
                vec![
                    ViewerEvent::status(
                        ConnectionState::Loading,
                        format!("Loading WhatsApp... {}%", percent),
                    ),
                    ViewerEvent::Loading {
                        percent: *percent,
                        message: message.clone(),
                    },
                ]
            }
            SessionEvent::Ready => {
                self.set_state(ConnectionState::Connected);
                vec![
                    ViewerEvent::status(
                        ConnectionState::Connected,
                        "WhatsApp connected successfully!",
                    ),
                    ViewerEvent::Ready,
                ]
            }
            SessionEvent::AuthFailure(reason) => {
                self.set_state(ConnectionState::AuthFailed);
                vec![ViewerEvent::status(
                    ConnectionState::AuthFailed,
                    format!("Authentication failed: {}", reason),
                )]
            }
            SessionEvent::Disconnected(reason) => {
                self.set_state(ConnectionState::Disconnected);
                vec![ViewerEvent::status(
                    ConnectionState::Disconnected,
                    format!("WhatsApp disconnected: {}", reason),
                )]
            }
            SessionEvent::ChangeState(reported) => {
                debug!(reported = %reported, "Session client reported state change");
                Vec::new()
            }
        }
    }

    /// Claim the initialization guard.
    ///
    /// Returns `None` when a client is already initialized. `restarting` and
    /// `reinitializing` are kept as-is so viewers keep seeing why the client
    /// is coming back.
    pub fn begin_initialize(&mut self) -> Option<Vec<ViewerEvent>> {
        if self.initialized {
            return None;
        }
        self.initialized = true;

        match self.state {
            ConnectionState::Restarting | ConnectionState::Reinitializing => Some(Vec::new()),
            _ => {
                self.set_state(ConnectionState::Initializing);
                Some(vec![ViewerEvent::snapshot_status(ConnectionState::Initializing)])
            }
        }
    }

    /// The client failed to initialize; release the guard so a later attempt can run.
    pub fn fail_initialize(&mut self, reason: &str) -> Vec<ViewerEvent> {
        self.initialized = false;
        self.set_state(ConnectionState::Error);
        vec![ViewerEvent::status(
            ConnectionState::Error,
            format!("Failed to initialize client: {}", reason),
        )]
    }

    /// Logout went through on the client.
    pub fn logged_out(&mut self) -> Vec<ViewerEvent> {
        self.initialized = false;
        self.set_state(ConnectionState::Disconnected);
        vec![ViewerEvent::status(
            ConnectionState::Disconnected,
            "WhatsApp logged out, waiting to reinitialize...",
        )]
    }

    /// Restart accepted; the current client is being torn down.
    pub fn restarting(&mut self) -> Vec<ViewerEvent> {
        self.initialized = false;
        self.set_state(ConnectionState::Restarting);
        vec![ViewerEvent::snapshot_status(ConnectionState::Restarting)]
    }

    /// Old client destroyed after logout; a fresh one is about to start.
    pub fn reinitializing(&mut self) -> Vec<ViewerEvent> {
        self.set_state(ConnectionState::Reinitializing);
        vec![ViewerEvent::status(
            ConnectionState::Reinitializing,
            "Reinitializing, a QR code will appear shortly...",
        )]
    }

    /// Events that bring a freshly joined viewer up to date.
    pub fn snapshot(&self) -> Vec<ViewerEvent> {
        let mut events = vec![ViewerEvent::snapshot_status(self.state)];
        if let Some(qr) = &self.qr {
            events.push(ViewerEvent::Qr(qr.as_str().to_string()));
        }
        if self.is_ready() {
            events.push(ViewerEvent::Ready);
        }
        events
    }
}
