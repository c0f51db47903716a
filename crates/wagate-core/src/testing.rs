//! Scripted in-memory Session Client
//!
//! Records every call, lets tests emit events on the most recent instance, and
//! can be told to fail specific calls. Shared by unit tests here and by the
//! server and e2e crates (feature `testing`).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::session::{SessionClient, SessionEventSender, SessionFactory};

/// A call observed by a scripted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Initialize,
    SendMessage { chat_id: String, text: String },
    Logout,
    Destroy,
}

/// A call parked until the test decides how it ends. Dropping it releases
/// the call successfully.
pub struct HeldCall(oneshot::Sender<Option<String>>);

impl HeldCall {
    pub fn release(self) {
        let _ = self.0.send(None);
    }

    pub fn fail(self, message: &str) {
        let _ = self.0.send(Some(message.to_string()));
    }
}

type Hold = Mutex<Option<oneshot::Receiver<Option<String>>>>;

/// Wait out a held call, if one is armed. `Some` carries the failure message.
async fn wait_hold(hold: &Hold) -> Option<String> {
    let rx = lock(hold).take()?;
    rx.await.ok().flatten()
}

#[derive(Default)]
struct Script {
    senders: Mutex<Vec<SessionEventSender>>,
    calls: Mutex<Vec<ClientCall>>,
    on_initialize: Mutex<Vec<SessionEvent>>,
    next_send_error: Mutex<Option<String>>,
    next_logout_error: Mutex<Option<String>>,
    fail_initialize: AtomicBool,
    destroyed: AtomicUsize,
    hold_initialize: Hold,
    hold_logout: Hold,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Factory of scripted clients. Clones share the same script and records.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Script>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events every new instance emits when initialized.
    pub fn with_initialize_script(self, events: Vec<SessionEvent>) -> Self {
        self.set_initialize_script(events);
        self
    }

    pub fn set_initialize_script(&self, events: Vec<SessionEvent>) {
        *lock(&self.script.on_initialize) = events;
    }

    /// Number of instances created so far.
    pub fn instances(&self) -> usize {
        lock(&self.script.senders).len()
    }

    /// Number of completed destroy calls.
    pub fn destroyed(&self) -> usize {
        self.script.destroyed.load(Ordering::SeqCst)
    }

    /// Event sender of the n-th instance (0-based).
    pub fn sender(&self, index: usize) -> Option<SessionEventSender> {
        lock(&self.script.senders).get(index).cloned()
    }

    /// Emit an event on the most recent instance. Returns `false` if there is
    /// no instance or its pump is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        match lock(&self.script.senders).last() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.script.calls).clone()
    }

    /// `(chat_id, text)` of every successful send.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        lock(&self.script.calls)
            .iter()
            .filter_map(|c| match c {
                ClientCall::SendMessage { chat_id, text } => Some((chat_id.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn fail_next_send(&self, message: &str) {
        *lock(&self.script.next_send_error) = Some(message.to_string());
    }

    pub fn fail_next_logout(&self, message: &str) {
        *lock(&self.script.next_logout_error) = Some(message.to_string());
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.script.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Park the next `initialize` call until the returned handle resolves it.
    pub fn hold_next_initialize(&self) -> HeldCall {
        let (tx, rx) = oneshot::channel();
        *lock(&self.script.hold_initialize) = Some(rx);
        HeldCall(tx)
    }

    /// Park the next `logout` call until the returned handle resolves it.
    pub fn hold_next_logout(&self) -> HeldCall {
        let (tx, rx) = oneshot::channel();
        *lock(&self.script.hold_logout) = Some(rx);
        HeldCall(tx)
    }
}

impl SessionFactory for ScriptedFactory {
    fn create(&self, events: SessionEventSender) -> Arc<dyn SessionClient> {
        lock(&self.script.senders).push(events.clone());
        Arc::new(ScriptedClient {
            script: Arc::clone(&self.script),
            events,
        })
    }
}

struct ScriptedClient {
    script: Arc<Script>,
    events: SessionEventSender,
}

impl ScriptedClient {
    fn record(&self, call: ClientCall) {
        lock(&self.script.calls).push(call);
    }
}

#[async_trait]
impl SessionClient for ScriptedClient {
    async fn initialize(&self) -> Result<(), SessionError> {
        self.record(ClientCall::Initialize);
        if let Some(message) = wait_hold(&self.script.hold_initialize).await {
            return Err(SessionError::Rejected(message));
        }
        if self.script.fail_initialize.load(Ordering::SeqCst) {
            return Err(SessionError::Rejected("Failed to launch the browser".to_string()));
        }
        let script = lock(&self.script.on_initialize).clone();
        for event in script {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SessionError> {
        if let Some(message) = lock(&self.script.next_send_error).take() {
            return Err(SessionError::Rejected(message));
        }
        self.record(ClientCall::SendMessage {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn logout(&self) -> Result<(), SessionError> {
        if let Some(message) = lock(&self.script.next_logout_error).take() {
            return Err(SessionError::Rejected(message));
        }
        self.record(ClientCall::Logout);
        if let Some(message) = wait_hold(&self.script.hold_logout).await {
            return Err(SessionError::Rejected(message));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.record(ClientCall::Destroy);
        self.script.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
