//! Sidecar Session Client
//!
//! Runs the WhatsApp Web automation as a child process and talks to it over
//! stdin/stdout with line-delimited JSON (see [`protocol`]). Each client
//! instance owns one process; destroying the instance stops it.

pub mod protocol;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wagate_core::{SessionClient, SessionError, SessionEvent, SessionEventSender, SessionFactory};

use protocol::{Command, Inbound};

/// Longest wait for the sidecar to confirm a destroy request.
const DESTROY_GRACE: Duration = Duration::from_secs(10);
/// Longest wait for the process to exit after stdin is closed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// How to launch the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Passed to the sidecar as `WAGATE_SESSION_DIR`
    pub session_dir: PathBuf,
    /// Applies to every request except `initialize`, which may wait on pairing
    pub request_timeout: Duration,
}

/// Builds one sidecar-backed client per lifecycle.
pub struct SidecarFactory {
    config: Arc<SidecarConfig>,
}

impl SidecarFactory {
    pub fn new(config: SidecarConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl SessionFactory for SidecarFactory {
    fn create(&self, events: SessionEventSender) -> Arc<dyn SessionClient> {
        Arc::new(SidecarClient::new(Arc::clone(&self.config), events))
    }
}

type Reply = Result<(), SessionError>;

/// State shared with the stdout reader task.
#[derive(Default)]
struct Link {
    pending: StdMutex<HashMap<u64, oneshot::Sender<Reply>>>,
    /// Set by the reader once stdout closed
    exited: AtomicBool,
    /// Set once destroy began; the exit is then expected
    closing: AtomicBool,
}

impl Link {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Process {
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
}

/// Session Client backed by a sidecar process.
pub struct SidecarClient {
    config: Arc<SidecarConfig>,
    events: SessionEventSender,
    link: Arc<Link>,
    next_id: AtomicU64,
    process: Mutex<Option<Process>>,
}

impl SidecarClient {
    pub fn new(config: Arc<SidecarConfig>, events: SessionEventSender) -> Self {
        Self {
            config,
            events,
            link: Arc::new(Link::default()),
            next_id: AtomicU64::new(1),
            process: Mutex::new(None),
        }
    }

    async fn spawn(&self) -> Result<(), SessionError> {
        let mut process = self.process.lock().await;
        if process.is_some() {
            return Ok(());
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.session_dir).await {
            warn!(
                dir = %self.config.session_dir.display(),
                "Could not create session directory: {}", e
            );
        }

        let mut child = ProcessCommand::new(&self.config.program)
            .args(&self.config.args)
            .env("WAGATE_SESSION_DIR", &self.config.session_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Closed("sidecar stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Closed("sidecar stdout unavailable".to_string()))?;

        info!(pid = ?child.id(), program = %self.config.program, "Sidecar started");

        let reader = tokio::spawn(read_loop(stdout, self.events.clone(), Arc::clone(&self.link)));
        *process = Some(Process {
            child,
            stdin,
            reader,
        });
        Ok(())
    }

    async fn request(&self, command: Command, timeout: Option<Duration>) -> Reply {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = protocol::encode(id, &command)?;

        let (tx, rx) = oneshot::channel();
        self.link.pending().insert(id, tx);
        // Pairs with the reader: it flags `exited` before draining `pending`.
        if self.link.exited.load(Ordering::SeqCst) {
            self.link.pending().remove(&id);
            return Err(SessionError::Closed("sidecar exited".to_string()));
        }

        if let Err(e) = self.write_line(&line).await {
            self.link.pending().remove(&id);
            return Err(e);
        }
        debug!(id, op = command.name(), "Sidecar request sent");

        let reply = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.link.pending().remove(&id);
                    warn!(id, op = command.name(), "Sidecar request timed out");
                    return Err(SessionError::Timeout(limit));
                }
            },
            None => rx.await,
        };

        reply.unwrap_or_else(|_| Err(SessionError::Closed("sidecar exited".to_string())))
    }

    async fn write_line(&self, line: &str) -> Result<(), SessionError> {
        let mut process = self.process.lock().await;
        let process = process
            .as_mut()
            .ok_or_else(|| SessionError::Closed("sidecar not running".to_string()))?;
        process.stdin.write_all(line.as_bytes()).await?;
        process.stdin.write_all(b"\n").await?;
        process.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionClient for SidecarClient {
    async fn initialize(&self) -> Result<(), SessionError> {
        self.spawn().await?;
        self.request(Command::Initialize, None).await
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SessionError> {
        self.request(
            Command::SendMessage {
                chat_id: chat_id.to_string(),
                text: text.to_string(),
            },
            Some(self.config.request_timeout),
        )
        .await
    }

    async fn logout(&self) -> Result<(), SessionError> {
        self.request(Command::Logout, Some(self.config.request_timeout))
            .await
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.link.closing.store(true, Ordering::SeqCst);
        if self.process.lock().await.is_none() {
            return Ok(());
        }

        let grace = self.config.request_timeout.min(DESTROY_GRACE);
        if let Err(e) = self.request(Command::Destroy, Some(grace)).await {
            debug!("Sidecar did not confirm destroy: {}", e);
        }

        let Some(process) = self.process.lock().await.take() else {
            return Ok(());
        };
        let Process {
            mut child,
            stdin,
            reader,
        } = process;
        drop(stdin);

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Sidecar exited"),
            Ok(Err(e)) => warn!("Failed to wait for sidecar: {}", e),
            Err(_) => {
                warn!("Sidecar still running after {:?}, killing it", EXIT_GRACE);
                child.kill().await?;
            }
        }

        if tokio::time::timeout(Duration::from_secs(1), reader).await.is_err() {
            debug!("Sidecar reader still draining");
        }
        Ok(())
    }
}

async fn read_loop(stdout: ChildStdout, events: SessionEventSender, link: Arc<Link>) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from sidecar: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match protocol::decode(line) {
            Ok(Inbound::Response { id, ok, error }) => {
                let waiter = link.pending().remove(&id);
                match waiter {
                    Some(tx) => {
                        let reply = if ok {
                            Ok(())
                        } else {
                            Err(SessionError::Rejected(
                                error.unwrap_or_else(|| "request failed".to_string()),
                            ))
                        };
                        let _ = tx.send(reply);
                    }
                    None => debug!(id, "Response for unknown or expired request"),
                }
            }
            Ok(Inbound::Event { event, data }) => match protocol::session_event(&event, &data) {
                Ok(Some(session_event)) => {
                    debug!(event = %event, "Sidecar event");
                    if events.send(session_event).is_err() {
                        debug!("Event receiver gone, dropping sidecar event");
                    }
                }
                Ok(None) => debug!(event = %event, "Ignoring sidecar event"),
                Err(e) => warn!("{}", e),
            },
            Err(e) => warn!("Skipping sidecar output: {}", e),
        }
    }

    link.exited.store(true, Ordering::SeqCst);
    let orphaned: Vec<_> = link.pending().drain().map(|(_, tx)| tx).collect();
    for tx in orphaned {
        let _ = tx.send(Err(SessionError::Closed("sidecar exited".to_string())));
    }

    if link.closing.load(Ordering::SeqCst) {
        debug!("Sidecar output closed");
    } else {
        warn!("Sidecar exited unexpectedly");
        let _ = events.send(SessionEvent::Disconnected("sidecar exited".to_string()));
    }
}
