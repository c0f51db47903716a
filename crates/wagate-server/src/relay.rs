//! Admin relay client
//!
//! What an admin panel does against the gateway: status probe, QR fetch,
//! send, logout, restart. Transport failures surface as
//! [`GatewayError::Unreachable`], never as a panic or an empty answer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use wagate_core::{ConnectionState, GatewayError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Answer of `GET /status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub server: String,
    pub whatsapp: ConnectionState,
    pub ready: bool,
    pub qr_available: bool,
    pub client_initialized: bool,
    pub timestamp: DateTime<Utc>,
}

/// Common shape of the action endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<ConnectionState>,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// HTTP client for one gateway.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base: String,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// GET /status
    pub async fn status(&self) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .http
            .get(self.url("/status"))
            .send()
            .await
            .map_err(unreachable)?;
        if !response.status().is_success() {
            return Err(GatewayError::Unreachable(format!(
                "status endpoint answered {}",
                response.status()
            )));
        }
        response.json().await.map_err(unreachable)
    }

    /// GET /qr. Returns the data URL.
    pub async fn qr(&self) -> Result<String, GatewayError> {
        let reply = self.call(self.http.get(self.url("/qr"))).await?;
        reply
            .qr
            .ok_or_else(|| GatewayError::UpstreamFailure("reply carried no QR".to_string()))
    }

    /// POST /send-message. Returns the normalized recipient.
    pub async fn send(&self, number: &str, text: &str) -> Result<String, GatewayError> {
        let body = json!({ "nomor": number, "pesan": text });
        let reply = self
            .call(self.http.post(self.url("/send-message")).json(&body))
            .await?;
        Ok(reply.to.unwrap_or_else(|| number.to_string()))
    }

    /// POST /logout
    pub async fn logout(&self) -> Result<Reply, GatewayError> {
        self.call(self.http.post(self.url("/logout")).json(&json!({})))
            .await
    }

    /// POST /restart
    pub async fn restart(&self) -> Result<Reply, GatewayError> {
        self.call(self.http.post(self.url("/restart")).json(&json!({})))
            .await
    }

    /// Poll `/status` until the gateway answers (and, with `connected`,
    /// until the session is connected) or `timeout` elapses.
    pub async fn wait_ready(
        &self,
        timeout: Duration,
        connected: bool,
    ) -> Result<GatewayStatus, GatewayError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_state = None;

        loop {
            match self.status().await {
                Ok(status) if !connected || status.ready => return Ok(status),
                Ok(status) => {
                    debug!(state = %status.whatsapp, "Gateway up, session not connected yet");
                    last_state = Some(status.whatsapp);
                }
                Err(e) => debug!("Gateway not answering yet: {}", e),
            }

            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(match last_state {
                    Some(state) => GatewayError::NotReady { state },
                    None => GatewayError::Unreachable(format!(
                        "no answer from {} within {:?}",
                        self.base, timeout
                    )),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Reply, GatewayError> {
        let response = request.send().await.map_err(unreachable)?;
        let code = response.status();
        let reply: Reply = response.json().await.map_err(unreachable)?;
        interpret(code, reply)
    }
}

fn unreachable(e: reqwest::Error) -> GatewayError {
    GatewayError::Unreachable(e.to_string())
}

/// Map an action reply onto the gateway error taxonomy.
fn interpret(code: StatusCode, reply: Reply) -> Result<Reply, GatewayError> {
    if reply.success {
        return Ok(reply);
    }
    let text = reply
        .error
        .clone()
        .or_else(|| reply.message.clone())
        .unwrap_or_else(|| format!("gateway answered {}", code));

    Err(match code {
        StatusCode::BAD_REQUEST => GatewayError::InvalidInput(text),
        // 503, and the 200 "not connected" / "QR not available" answers
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::OK => GatewayError::NotReady {
            state: reply.status.unwrap_or(ConnectionState::Disconnected),
        },
        _ => GatewayError::UpstreamFailure(text),
    })
}
