//! Error types for the token layer.

/// Why a presented token was rejected.
///
/// Every failure of the underlying JWT decoder is mapped onto one of
/// these three kinds inside the codec, so callers can tell "tampered"
/// apart from "garbage" and "too old".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a well-formed token: bad encoding, bad JSON, missing or
    /// nonsensical claims, or the wrong token type for the operation.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Structurally fine but the signature does not verify against any
    /// known key (tampered payload, foreign key, unknown key id, or an
    /// algorithm we do not accept).
    #[error("invalid token signature")]
    InvalidSignature,

    /// Signature is valid but `exp` has passed.
    #[error("token expired")]
    Expired,
}

/// Errors raised while building a key ring or minting a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// The secret for this key id is too short to be used with HS256.
    #[error("signing key {id} is {len} bytes, at least {min} required")]
    SecretTooShort { id: String, len: usize, min: usize },

    /// A key id appears more than once in the key ring.
    #[error("duplicate signing key id {0}")]
    DuplicateKeyId(String),

    /// Key ids must be non-empty; they are written into every token header.
    #[error("signing key id must not be empty")]
    EmptyKeyId,

    /// The JWT encoder rejected the claims.
    #[error("token encoding failed: {0}")]
    Encode(String),
}
