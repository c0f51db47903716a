//! Gateway REST handlers

use axum::Json;
use axum::extract::{FromRequest, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, extract::rejection::FormRejection, extract::rejection::JsonRejection};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Value, json};
use tracing::{info, warn};
use wagate_core::{GatewayError, LogoutOutcome};

use super::state::AppState;

/// Serve the embedded control panel
pub async fn serve_control_panel() -> Html<&'static str> {
    Html(include_str!("control_panel.html"))
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Gateway failure as an HTTP response: `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, body) = match &self.0 {
            GatewayError::NotReady { state } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": self.0.to_string(), "status": state }),
            ),
            GatewayError::InvalidInput(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": self.0.to_string() }),
            ),
            GatewayError::Unreachable(_) => (
                StatusCode::BAD_GATEWAY,
                json!({ "success": false, "error": self.0.to_string() }),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": self.0.to_string() }),
            ),
        };
        (code, Json(body)).into_response()
    }
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.coordinator.status().await;
    Json(json!({
        "server": "running",
        "whatsapp": status.connection_state,
        "ready": status.ready,
        "qrAvailable": status.qr_available,
        "clientInitialized": status.initialized,
        "timestamp": iso(status.timestamp),
    }))
}

/// GET /qr
///
/// "Not available" is an answer, not a failure, so both shapes are 200.
pub async fn get_qr(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.coordinator.qr().await;
    match snapshot.qr {
        Some(qr) => Json(json!({
            "success": true,
            "qr": qr,
            "status": snapshot.state,
        })),
        None => Json(json!({
            "success": false,
            "message": "QR code not available",
            "status": snapshot.state,
            "ready": snapshot.ready,
        })),
    }
}

/// Send-message fields. The Indonesian names are what existing admin panels
/// post; the English names are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    #[serde(
        rename = "nomor",
        alias = "number",
        default,
        deserialize_with = "string_or_number"
    )]
    pub number: Option<String>,
    #[serde(rename = "pesan", alias = "message", default)]
    pub message: Option<String>,
}

/// Phone numbers often arrive as bare JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Body extractor accepting JSON or url-encoded forms.
///
/// Never rejects: an unreadable body counts as missing fields, so readiness
/// is still reported ahead of input validation.
pub struct SendMessageBody(pub SendMessageRequest);

impl<S> FromRequest<S> for SendMessageBody
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let parsed = if is_form {
            Form::<SendMessageRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|e: FormRejection| e.body_text())
        } else {
            Json::<SendMessageRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|e: JsonRejection| e.body_text())
        };

        Ok(SendMessageBody(parsed.unwrap_or_else(|reason| {
            warn!("Unreadable send-message body: {}", reason);
            SendMessageRequest::default()
        })))
    }
}

/// POST /send-message
pub async fn send_message(
    State(state): State<AppState>,
    SendMessageBody(body): SendMessageBody,
) -> Result<Json<Value>, ApiError> {
    let number = body.number.unwrap_or_default();
    let message = body.message.unwrap_or_default();

    match state.coordinator.send_message(&number, &message).await {
        Ok(receipt) => {
            info!("Message sent to {}", receipt.to);
            Ok(Json(json!({
                "success": true,
                "message": "Message sent successfully",
                "to": receipt.to,
                "timestamp": iso(receipt.timestamp),
            })))
        }
        Err(e) => {
            warn!("Send message failed: {}", e);
            Err(ApiError(e))
        }
    }
}

/// POST /logout
pub async fn logout(State(state): State<AppState>) -> Response {
    match state.coordinator.logout().await {
        Ok(LogoutOutcome::Reinitializing) => Json(json!({
            "success": true,
            "message": "Logged out successfully, a new QR code will appear shortly",
        }))
        .into_response(),
        Ok(LogoutOutcome::Superseded) => Json(json!({
            "success": true,
            "message": "Logged out; the client was restarted in the meantime",
        }))
        .into_response(),
        // Idempotent from the caller's view: not connected is a 200 answer.
        Err(GatewayError::NotReady { state }) => Json(json!({
            "success": false,
            "message": "WhatsApp is not connected",
            "status": state,
        }))
        .into_response(),
        Err(e) => {
            warn!("Logout failed: {}", e);
            ApiError(e).into_response()
        }
    }
}

/// POST /restart
pub async fn restart(State(state): State<AppState>) -> Json<Value> {
    state.coordinator.restart().await;
    Json(json!({
        "success": true,
        "message": "Client restarting...",
    }))
}
