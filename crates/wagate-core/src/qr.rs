//! QR pairing payloads
//!
//! The Session Client hands us the raw pairing string; viewers need something
//! they can drop into an `<img src>`. We render an SVG (error correction H,
//! 4-module quiet zone, at least 300px square) and wrap it in a base64 data URL.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::Serialize;

const MIN_DIMENSION: u32 = 300;
const DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// QR string could not be encoded (too long for level H, usually).
#[derive(Debug, thiserror::Error)]
#[error("Failed to generate QR code: {0}")]
pub struct QrError(#[from] qrcode::types::QrError);

/// Encoded login QR, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QrPayload(String);

impl QrPayload {
    /// Encode a raw pairing string.
    pub fn encode(raw: &str) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(raw.as_bytes(), EcLevel::H)?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
            .quiet_zone(true)
            .build();

        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + image.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(image.as_bytes(), &mut url);
        Ok(QrPayload(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
