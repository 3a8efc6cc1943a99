//! OCR response ingestion
//!
//! The upload handler forwards the OCR service's HTTP body here. The
//! body often carries extra text around the JSON payload, so the
//! outermost object is cut out before deserializing. A malformed body
//! is a service failure; an explicit unreadable-image response is a
//! distinct failure kind so callers can suggest a better photo instead
//! of a blind retry.

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::OcrPayload;

/// Error code the OCR service returns for images it cannot read
const UNREADABLE_IMAGE_CODE: &str = "unreadable_image";

/// Parse one OCR service response body into a payload
pub fn parse_ocr_response(body: &str) -> Result<OcrPayload> {
    let body = body.trim();

    let start = body.find('{');
    let end = body.rfind('}');

    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => {
            return Err(Error::OcrService(format!(
                "No JSON found in OCR response | Raw: {}",
                truncate(body)
            )))
        }
    };

    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        Error::OcrService(format!(
            "Invalid JSON from OCR service: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })?;

    if let Some(code) = value.get("error").and_then(|v| v.as_str()) {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("The image could not be read")
            .to_string();
        if code == UNREADABLE_IMAGE_CODE {
            return Err(Error::UnreadableImage(message));
        }
        return Err(Error::OcrService(format!("{}: {}", code, message)));
    }

    let payload: OcrPayload = serde_json::from_value(value)
        .map_err(|e| Error::OcrService(format!("Unexpected OCR payload shape: {}", e)))?;

    if payload.raw_text.trim().is_empty() {
        warn!("OCR payload has no raw text; extraction will fall back to defaults");
    }

    Ok(payload)
}

/// First 200 bytes of `text`, backed off to a character boundary
fn truncate(text: &str) -> String {
    if text.len() > 200 {
        let mut end = 200;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}
