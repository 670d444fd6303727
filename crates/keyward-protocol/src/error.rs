//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or the
    /// wrong shape entirely.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
