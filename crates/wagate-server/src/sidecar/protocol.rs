//! Sidecar wire format
//!
//! One JSON object per line in each direction.
//!
//! Requests (stdin): `{"id": 7, "op": "send_message", "chatId": "...", "text": "..."}`
//!
//! Replies and events (stdout):
//! `{"type": "response", "id": 7, "ok": false, "error": "..."}` and
//! `{"type": "event", "event": "qr", "data": "..."}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wagate_core::{SessionError, SessionEvent};

/// Request sent to the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Initialize,
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        text: String,
    },
    Logout,
    Destroy,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize => "initialize",
            Command::SendMessage { .. } => "send_message",
            Command::Logout => "logout",
            Command::Destroy => "destroy",
        }
    }
}

/// Encode a request line (without the trailing newline).
pub fn encode(id: u64, command: &Command) -> Result<String, SessionError> {
    let mut value =
        serde_json::to_value(command).map_err(|e| SessionError::Protocol(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.insert("id".to_string(), Value::from(id));
    }
    serde_json::to_string(&value).map_err(|e| SessionError::Protocol(e.to_string()))
}

/// A line read from the sidecar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Response {
        id: u64,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        data: Value,
    },
}

pub fn decode(line: &str) -> Result<Inbound, SessionError> {
    serde_json::from_str(line).map_err(|e| SessionError::Protocol(format!("{}: {}", e, line)))
}

fn text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map a sidecar event onto a Session Event. Unknown names yield `Ok(None)`.
pub fn session_event(name: &str, data: &Value) -> Result<Option<SessionEvent>, SessionError> {
    let event = match name {
        "qr" => match data.as_str() {
            Some(raw) if !raw.is_empty() => SessionEvent::Qr(raw.to_string()),
            _ => return Err(SessionError::Protocol("qr event without payload".to_string())),
        },
        "authenticated" => SessionEvent::Authenticated,
        "loading_screen" => {
            let percent = match &data["percent"] {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
                _ => 0.0,
            };
            SessionEvent::LoadingScreen {
                percent: percent.clamp(0.0, 100.0).round() as u8,
                message: text(&data["message"]),
            }
        }
        "ready" => SessionEvent::Ready,
        "auth_failure" => SessionEvent::AuthFailure(text(data)),
        "disconnected" => SessionEvent::Disconnected(text(data)),
        "change_state" => SessionEvent::ChangeState(text(data)),
        _ => return Ok(None),
    };
    Ok(Some(event))
}
