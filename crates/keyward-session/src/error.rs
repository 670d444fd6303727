//! Error types for the session layer.

use keyward_protocol::{SessionId, UserId};
use keyward_store::StoreError;
use keyward_token::{SigningError, TokenError};

/// Errors that can occur while managing sessions.
///
/// All but [`StoreUnavailable`](Self::StoreUnavailable) are expected,
/// user-facing outcomes of normal traffic.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this id exists (never created, logged out, or swept).
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session is past its expiry time or no longer ACTIVE.
    #[error("session {0} has expired")]
    Expired(SessionId),

    /// A presented token is unusable: malformed, badly signed, expired,
    /// the wrong type, or no longer the current refresh token.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The session was kicked out.
    #[error("session {0} was revoked")]
    Revoked(SessionId),

    /// A refresh lost a race with another write to the same session.
    #[error("session {0} was modified concurrently, retry")]
    Conflict(SessionId),

    /// The backing store failed. The only kind that warrants an alert.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// The user directory has no such user.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// A token could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl SessionError {
    /// Whether this failure points at infrastructure rather than the caller.
    pub fn is_alertable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Revoked(id) => Self::Revoked(id),
            StoreError::Conflict(id) => Self::Conflict(id),
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
        }
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        Self::Invalid(err.to_string())
    }
}
