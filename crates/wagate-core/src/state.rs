//! Connection state

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single canonical value describing the current link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Initializing,
    QrReady,
    Authenticated,
    Loading,
    Connected,
    Disconnected,
    AuthFailed,
    Error,
    Restarting,
    Reinitializing,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 10] = [
        ConnectionState::Initializing,
        ConnectionState::QrReady,
        ConnectionState::Authenticated,
        ConnectionState::Loading,
        ConnectionState::Connected,
        ConnectionState::Disconnected,
        ConnectionState::AuthFailed,
        ConnectionState::Error,
        ConnectionState::Restarting,
        ConnectionState::Reinitializing,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Initializing => "initializing",
            ConnectionState::QrReady => "qr_ready",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Loading => "loading",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::AuthFailed => "auth_failed",
            ConnectionState::Error => "error",
            ConnectionState::Restarting => "restarting",
            ConnectionState::Reinitializing => "reinitializing",
        }
    }

    /// Message replayed to viewers that join while this state is live.
    pub fn message(&self) -> &'static str {
        match self {
            ConnectionState::Initializing => "Initializing WhatsApp client...",
            ConnectionState::QrReady => "QR code ready! Scan it with WhatsApp",
            ConnectionState::Authenticated => "Authenticated",
            ConnectionState::Loading => "Loading WhatsApp...",
            ConnectionState::Connected => "WhatsApp connected!",
            ConnectionState::Disconnected => "WhatsApp disconnected",
            ConnectionState::AuthFailed => "Authentication failed",
            ConnectionState::Error => "An error occurred",
            ConnectionState::Restarting => "Restarting client...",
            ConnectionState::Reinitializing => "Reinitializing for a new QR code...",
        }
    }

    /// Pairing window: the only states in which a QR payload may be held.
    pub fn is_pairing(&self) -> bool {
        matches!(
            self,
            ConnectionState::QrReady | ConnectionState::Authenticated | ConnectionState::Loading
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
