//! Inbound/outbound wire codec.
//!
//! The wire wrapper is `{"message": ...}` where `message` is either a
//! JSON-encoded envelope string or the envelope object itself.

use serde_json::{json, Value};
use thiserror::Error;

use super::envelope::Envelope;

#[derive(Error, Debug)]
pub enum CodecError {
    /// The outer request body is not JSON at all.
    #[error("invalid JSON: {0}")]
    MalformedRequest(#[from] serde_json::Error),
}

/// Decode a raw request body into an envelope.
///
/// Only the outer body can fail. A nested message that does not parse, or
/// parses to something other than a JSON object, yields a degraded envelope
/// carrying the raw text as its body. Inside an object, mistyped fields are
/// read as absent and the rest of the envelope is kept.
pub fn decode_request(body: &[u8]) -> Result<Envelope, CodecError> {
    let outer: Value = serde_json::from_slice(body)?;

    let envelope = match outer.get("message") {
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => envelope_from_value(value).unwrap_or_else(|| {
                tracing::debug!("Nested message is JSON but not an envelope");
                Envelope::degraded(raw.clone())
            }),
            Err(e) => {
                tracing::debug!("Nested message is not JSON: {}", e);
                Envelope::degraded(raw.clone())
            }
        },
        Some(value @ Value::Object(_)) => envelope_from_value(value.clone())
            .unwrap_or_else(|| Envelope::degraded(value.to_string())),
        Some(Value::Null) | None => Envelope::degraded(String::new()),
        Some(other) => Envelope::degraded(other.to_string()),
    };

    Ok(envelope)
}

fn envelope_from_value(value: Value) -> Option<Envelope> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Wrap an envelope for sending, mirroring the inbound contract.
pub fn encode_message(envelope: &Envelope) -> Result<Value, serde_json::Error> {
    Ok(json!({ "message": serde_json::to_string(envelope)? }))
}
