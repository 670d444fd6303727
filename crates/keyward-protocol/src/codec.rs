//! Codec trait and implementations for serializing response envelopes.
//!
//! The session core does not care how responses reach a caller. The
//! transport layer picks a [`Codec`] and turns [`ApiResult`](crate::ApiResult)
//! values into bytes. [`JsonCodec`] is the default and matches what the
//! legacy HTTP callers consume.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` so a single codec can be shared by every
/// request-handling task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use keyward_protocol::{ApiResult, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ApiResult::ok(true)).unwrap();
/// let decoded: ApiResult<bool> = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.data, Some(true));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
