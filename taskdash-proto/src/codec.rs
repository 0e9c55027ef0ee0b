//! JSON encoding for the task service's request and response bodies.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::task::ErrorBody;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a payload as a JSON byte vector.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a payload from JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Extracts the human-readable message from a failure response body.
///
/// Prefers the `message` field of an [`ErrorBody`]; falls back to the raw
/// body text when it is non-empty UTF-8. Returns `None` otherwise.
#[must_use]
pub fn error_message(bytes: &[u8]) -> Option<String> {
    if let Ok(body) = serde_json::from_slice::<ErrorBody>(bytes) {
        return Some(body.message);
    }
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
