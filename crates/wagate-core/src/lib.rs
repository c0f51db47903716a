//! # wagate Core
//!
//! Lifecycle engine for a single WhatsApp web session. The actual protocol,
//! session persistence and browser automation live in an opaque Session
//! Client; this crate reflects that client's lifecycle into one canonical
//! state and fans it out to viewers.
//!
//! - **ConnectionState**: the one live connection status value
//! - **Lifecycle**: pure `apply(event)` state machine over Session Client events
//! - **QrPayload**: pairing QR rendered as an SVG data URL
//! - **Coordinator**: owns the lifecycle, the live client and the broadcast
//!   channel; serves the gateway operations (status, QR, send, logout, restart)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wagate_core::{Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::new(Arc::new(my_factory), CoordinatorConfig::default());
//! coordinator.initialize().await;
//!
//! let (snapshot, mut rx) = coordinator.subscribe().await;
//! for event in snapshot {
//!     println!("{}", event.to_json());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `testing`: scripted in-memory Session Client (`testing::ScriptedFactory`)

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod coordinator;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod phone;
pub mod qr;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use coordinator::{
    Coordinator, CoordinatorConfig, LogoutOutcome, QrSnapshot, SendReceipt, StatusSnapshot,
};
pub use error::{GatewayError, SessionError};
pub use event::{SessionEvent, ViewerEvent};
pub use lifecycle::Lifecycle;
pub use phone::ChatId;
pub use qr::{QrError, QrPayload};
pub use session::{SessionClient, SessionEventSender, SessionFactory};
pub use state::ConnectionState;
