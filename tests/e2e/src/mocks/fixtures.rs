//! Session Event Scripts
//!
//! Canned event sequences a scripted session client replays on initialize:
//! - fresh pairing (QR, scan, loading, ready)
//! - pairing that stalls at the QR
//! - a restored session that skips the QR entirely

use wagate_core::SessionEvent;
use wagate_core::testing::ScriptedFactory;

/// Raw pairing string the scripted client reports.
pub const PAIRING_CODE: &str = "2@e2e-pairing-code,base64key==,identity==,1";

/// Scripts for the common pairing scenarios.
pub struct SessionScripts;

impl SessionScripts {
    /// QR, scan, loading progress, ready.
    pub fn full_pairing() -> Vec<SessionEvent> {
        vec![
            SessionEvent::Qr(PAIRING_CODE.to_string()),
            SessionEvent::Authenticated,
            SessionEvent::LoadingScreen {
                percent: 40,
                message: "WhatsApp".to_string(),
            },
            SessionEvent::LoadingScreen {
                percent: 100,
                message: "WhatsApp".to_string(),
            },
            SessionEvent::Ready,
        ]
    }

    /// QR shown, nobody scans it.
    pub fn awaiting_scan() -> Vec<SessionEvent> {
        vec![SessionEvent::Qr(PAIRING_CODE.to_string())]
    }

    /// Stored credentials: no QR at all.
    pub fn restored_session() -> Vec<SessionEvent> {
        vec![SessionEvent::Authenticated, SessionEvent::Ready]
    }
}

/// Scripted factory whose instances replay `script` on initialize.
pub fn factory_with(script: Vec<SessionEvent>) -> ScriptedFactory {
    ScriptedFactory::new().with_initialize_script(script)
}
