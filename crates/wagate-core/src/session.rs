//! Session Client seam
//!
//! The WhatsApp connectivity itself is delegated to an opaque client. Each
//! instance is built by a [`SessionFactory`] and handed the sending half of an
//! event channel; it reports its lifecycle as tagged [`SessionEvent`]s instead
//! of registering callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::event::SessionEvent;

/// Channel a Session Client instance reports its lifecycle on.
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// One live WhatsApp session.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Start the session. Resolves once the client accepted the start request;
    /// pairing progress arrives as events afterwards.
    async fn initialize(&self) -> Result<(), SessionError>;

    /// Send a text message to a normalized chat id (`<digits>@c.us`).
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SessionError>;

    /// Unlink the device from the account.
    async fn logout(&self) -> Result<(), SessionError>;

    /// Tear the instance down. Resolving is the acknowledgment that the
    /// instance is gone and a new one may be constructed.
    async fn destroy(&self) -> Result<(), SessionError>;
}

/// Builds fresh Session Client instances.
pub trait SessionFactory: Send + Sync {
    fn create(&self, events: SessionEventSender) -> Arc<dyn SessionClient>;
}
