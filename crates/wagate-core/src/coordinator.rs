//! Lifecycle Coordinator
//!
//! Owns the one [`Lifecycle`], the live Session Client instance and the
//! viewer broadcast channel. Every read and write of that state goes through
//! a single async mutex, and every broadcast is sent while holding it, so a
//! subscriber's snapshot and its live stream never overlap or leave a gap.
//!
//! Each client instance gets a generation number and its own event pump
//! task. Events, initialize failures and logout results that come back from a
//! retired generation are dropped.
//!
//! Retiring a client starts its destroy in a task of its own. Logout and
//! restart then schedule a reconstruction task: wait for every outstanding
//! destroy acknowledgment, settle delay, fresh initialize. A later
//! logout/restart aborts a pending reconstruction and replaces it; destroys
//! already started always run to completion.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, Result};
use crate::event::{SessionEvent, ViewerEvent};
use crate::lifecycle::Lifecycle;
use crate::phone::ChatId;
use crate::session::{SessionClient, SessionFactory};
use crate::state::ConnectionState;

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pause between the destroy acknowledgment and constructing a new client
    pub reinit_delay: Duration,
    /// Viewer channel capacity; slower viewers skip ahead
    pub broadcast_capacity: usize,
    /// Replaces a leading trunk `0` in recipient numbers
    pub default_country_code: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reinit_delay: Duration::from_secs(2),
            broadcast_capacity: 256,
            default_country_code: Some("62".to_string()),
        }
    }
}

/// Answer to a status poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Always `true`: a status answer means the process is alive
    pub server_running: bool,
    pub connection_state: ConnectionState,
    pub ready: bool,
    pub qr_available: bool,
    pub initialized: bool,
    pub timestamp: DateTime<Utc>,
}

/// Answer to a QR query. `qr` is `None` outside the pairing window.
#[derive(Debug, Clone, Serialize)]
pub struct QrSnapshot {
    pub qr: Option<String>,
    pub state: ConnectionState,
    pub ready: bool,
}

/// Successful send.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    /// Normalized digits of the recipient
    pub to: String,
    pub timestamp: DateTime<Utc>,
}

/// What happened to a logout request that passed the readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// State reset and reconstruction scheduled
    Reinitializing,
    /// The client was replaced (restart) while logout was in flight
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rebuild {
    AfterLogout,
    AfterRestart,
}

struct LiveClient {
    generation: u64,
    client: Arc<dyn SessionClient>,
    pump: JoinHandle<()>,
}

struct Core {
    lifecycle: Lifecycle,
    client: Option<LiveClient>,
    generation: u64,
    reconstruction: Option<JoinHandle<()>>,
    /// Destroy acknowledgments of retired clients still being torn down
    teardowns: Vec<watch::Receiver<bool>>,
}

impl Core {
    fn live_generation(&self) -> Option<u64> {
        self.client.as_ref().map(|c| c.generation)
    }

    /// Detach the live client and start destroying it.
    fn retire_client(&mut self) {
        let Some(live) = self.client.take() else {
            return;
        };
        live.pump.abort();

        let (done_tx, done_rx) = watch::channel(false);
        let generation = live.generation;
        tokio::spawn(async move {
            match live.client.destroy().await {
                Ok(()) => info!(generation, "Old client destroyed"),
                Err(e) => warn!(generation, error = %e, "Error destroying old client"),
            }
            let _ = done_tx.send(true);
        });

        self.teardowns.retain(|rx| !*rx.borrow());
        self.teardowns.push(done_rx);
    }
}

/// Resolve once every given destroy has acknowledged.
async fn await_teardowns(teardowns: Vec<watch::Receiver<bool>>) {
    for mut rx in teardowns {
        // A dropped sender means the destroy task is gone either way
        let _ = rx.wait_for(|done| *done).await;
    }
}

struct Shared {
    factory: Arc<dyn SessionFactory>,
    config: CoordinatorConfig,
    events: broadcast::Sender<ViewerEvent>,
    core: Mutex<Core>,
}

impl Shared {
    /// Must be called with the core lock held.
    fn publish(&self, events: Vec<ViewerEvent>) {
        for event in events {
            // No receivers is fine: nobody is watching right now
            let _ = self.events.send(event);
        }
    }
}

/// Handle to the lifecycle coordinator. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    pub fn new(factory: Arc<dyn SessionFactory>, config: CoordinatorConfig) -> Self {
        let (events, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                events,
                core: Mutex::new(Core {
                    lifecycle: Lifecycle::new(),
                    client: None,
                    generation: 0,
                    reconstruction: None,
                    teardowns: Vec::new(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Construct and start a Session Client unless one is already initialized.
    ///
    /// Returns `false` for the no-op case. The client's own `initialize` runs in
    /// the background; if it fails the state moves to `error` and the guard is
    /// released so a later attempt can proceed.
    pub async fn initialize(&self) -> bool {
        let (generation, client) = {
            let mut core = self.shared.core.lock().await;
            let Some(events) = core.lifecycle.begin_initialize() else {
                warn!("Client already initialized");
                return false;
            };
            self.shared.publish(events);

            core.generation += 1;
            let generation = core.generation;
            let (tx, rx) = mpsc::unbounded_channel();
            let client = self.shared.factory.create(tx);
            let pump = tokio::spawn(pump_events(Arc::downgrade(&self.shared), generation, rx));
            core.client = Some(LiveClient {
                generation,
                client: Arc::clone(&client),
                pump,
            });
            (generation, client)
        };

        info!(generation, "Initializing WhatsApp client");
        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.initialize().await {
                error!(generation, error = %e, "Failed to initialize client");
                coordinator.initialize_failed(generation, &e.to_string()).await;
            }
        });
        true
    }

    async fn initialize_failed(&self, generation: u64, reason: &str) {
        let mut core = self.shared.core.lock().await;
        if core.live_generation() != Some(generation) {
            debug!(generation, "Ignoring initialize failure from retired client");
            return;
        }
        let events = core.lifecycle.fail_initialize(reason);
        self.shared.publish(events);
        core.retire_client();
    }

    /// Current state, for polling.
    pub async fn status(&self) -> StatusSnapshot {
        let core = self.shared.core.lock().await;
        StatusSnapshot {
            server_running: true,
            connection_state: core.lifecycle.state(),
            ready: core.lifecycle.is_ready(),
            qr_available: core.lifecycle.qr().is_some(),
            initialized: core.lifecycle.is_initialized(),
            timestamp: Utc::now(),
        }
    }

    /// Current QR payload, if any. Never asks the client for a new one.
    pub async fn qr(&self) -> QrSnapshot {
        let core = self.shared.core.lock().await;
        QrSnapshot {
            qr: core.lifecycle.qr().map(|q| q.as_str().to_string()),
            state: core.lifecycle.state(),
            ready: core.lifecycle.is_ready(),
        }
    }

    /// Send a text message through the live client.
    pub async fn send_message(&self, number: &str, text: &str) -> Result<SendReceipt> {
        let client = {
            let core = self.shared.core.lock().await;
            let state = core.lifecycle.state();
            if !core.lifecycle.is_ready() {
                return Err(GatewayError::NotReady { state });
            }
            match &core.client {
                Some(live) => Arc::clone(&live.client),
                None => return Err(GatewayError::NotReady { state }),
            }
        };

        if number.trim().is_empty() || text.is_empty() {
            return Err(GatewayError::InvalidInput(
                "Number and message are required".to_string(),
            ));
        }

        let recipient = ChatId::parse(number, self.shared.config.default_country_code.as_deref())?;
        let chat_id = recipient.to_chat_id();
        info!(chat_id = %chat_id, "Sending message");

        client.send_message(&chat_id, text).await.map_err(|e| {
            error!(chat_id = %chat_id, error = %e, "Failed to send message");
            GatewayError::from(e)
        })?;

        info!(chat_id = %chat_id, "Message sent");
        Ok(SendReceipt {
            to: recipient.digits().to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Log the session out and schedule a fresh client for a new QR.
    ///
    /// Returns once the client confirmed the logout; reconstruction continues
    /// in the background.
    pub async fn logout(&self) -> Result<LogoutOutcome> {
        let (generation, client) = {
            let core = self.shared.core.lock().await;
            let state = core.lifecycle.state();
            match (&core.client, core.lifecycle.is_ready()) {
                (Some(live), true) => (live.generation, Arc::clone(&live.client)),
                _ => return Err(GatewayError::NotReady { state }),
            }
        };

        info!(generation, "Logging out WhatsApp");
        client.logout().await.map_err(|e| {
            error!(generation, error = %e, "Logout failed");
            GatewayError::from(e)
        })?;
        info!(generation, "WhatsApp logged out");

        let mut core = self.shared.core.lock().await;
        if core.live_generation() != Some(generation) {
            warn!(generation, "Client replaced while logging out; leaving it alone");
            return Ok(LogoutOutcome::Superseded);
        }
        let events = core.lifecycle.logged_out();
        self.shared.publish(events);
        core.retire_client();
        self.schedule_rebuild(&mut core, Rebuild::AfterLogout);
        Ok(LogoutOutcome::Reinitializing)
    }

    /// Tear down whatever client exists and start a fresh one. Best effort,
    /// never fails.
    pub async fn restart(&self) {
        let mut core = self.shared.core.lock().await;
        info!(generation = ?core.live_generation(), "Restarting WhatsApp client");
        let events = core.lifecycle.restarting();
        self.shared.publish(events);
        core.retire_client();
        self.schedule_rebuild(&mut core, Rebuild::AfterRestart);
    }

    fn schedule_rebuild(&self, core: &mut Core, kind: Rebuild) {
        if let Some(pending) = core.reconstruction.take() {
            if !pending.is_finished() {
                info!("Superseding pending client reconstruction");
                pending.abort();
            }
        }

        let coordinator = self.clone();
        let delay = self.shared.config.reinit_delay;
        let teardowns = core.teardowns.clone();
        core.reconstruction = Some(tokio::spawn(async move {
            await_teardowns(teardowns).await;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if kind == Rebuild::AfterLogout {
                let mut core = coordinator.shared.core.lock().await;
                let events = core.lifecycle.reinitializing();
                coordinator.shared.publish(events);
            }

            info!("Reinitializing client");
            coordinator.initialize().await;
        }));
    }

    /// Subscribe to viewer events.
    ///
    /// Returns the events that describe the current state (status, QR if
    /// present, ready if connected) and a receiver for everything after them.
    pub async fn subscribe(&self) -> (Vec<ViewerEvent>, broadcast::Receiver<ViewerEvent>) {
        let core = self.shared.core.lock().await;
        (core.lifecycle.snapshot(), self.shared.events.subscribe())
    }

    /// Number of currently subscribed viewers.
    pub fn viewer_count(&self) -> usize {
        self.shared.events.receiver_count()
    }

    /// Cancel pending reconstruction and destroy the live client.
    pub async fn shutdown(&self) {
        let teardowns = {
            let mut core = self.shared.core.lock().await;
            if let Some(pending) = core.reconstruction.take() {
                pending.abort();
            }
            core.retire_client();
            core.teardowns.clone()
        };
        await_teardowns(teardowns).await;
        info!("Session client shut down");
    }

    async fn handle_event(&self, generation: u64, event: SessionEvent) {
        let mut core = self.shared.core.lock().await;
        if core.live_generation() != Some(generation) {
            debug!(generation, event = event.name(), "Dropping event from retired client");
            return;
        }
        info!(generation, event = event.name(), "Session event");
        let events = core.lifecycle.apply(&event);
        debug!(
            viewers = self.shared.events.receiver_count(),
            published = events.len(),
            "Broadcasting"
        );
        self.shared.publish(events);
    }
}

/// Forward one client instance's events, in emission order.
async fn pump_events(
    shared: Weak<Shared>,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        Coordinator { shared }.handle_event(generation, event).await;
    }
    debug!(generation, "Session event stream closed");
}
