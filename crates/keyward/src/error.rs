//! Unified error type for Keyward.

use keyward_protocol::ProtocolError;
use keyward_session::SessionError;
use keyward_store::StoreError;
use keyward_token::{SigningError, TokenError};

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// `SessionService` operations report failures inside their
/// `ApiResult`; this type is for setup paths (configuration, building
/// the codec) and for callers using the layer crates directly.
#[derive(Debug, thiserror::Error)]
pub enum KeywardError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A response could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A token was rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The key ring is unusable or a token could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use keyward_protocol::SessionId;

    use super::*;

    #[test]
    fn test_from_config_error() {
        let err: KeywardError = ConfigError::Missing("KEYWARD_SIGNING_KEY").into();
        assert!(matches!(err, KeywardError::Config(_)));
        assert!(err.to_string().contains("KEYWARD_SIGNING_KEY"));
    }

    #[test]
    fn test_from_token_error() {
        let err: KeywardError = TokenError::InvalidSignature.into();
        assert!(matches!(err, KeywardError::Token(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: KeywardError = SessionError::Revoked(SessionId::from("s1")).into();
        assert!(matches!(err, KeywardError::Session(_)));
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn test_from_store_error() {
        let err: KeywardError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, KeywardError::Store(_)));
    }
}
