//! Error types for the store layer.

use keyward_protocol::SessionId;

/// Errors a [`SessionStore`](crate::SessionStore) can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record exists for this session id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session was revoked by a kick-out. Reported instead of
    /// `NotFound` until the session's original expiry time has passed.
    #[error("session {0} was revoked")]
    Revoked(SessionId),

    /// A compare-and-swap lost to a concurrent write. Safe to retry
    /// after re-reading the record.
    #[error("concurrent update on session {0}")]
    Conflict(SessionId),

    /// The backend could not be reached or failed mid-operation.
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}
