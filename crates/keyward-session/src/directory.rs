//! User lookup hook.
//!
//! Keyward does not own user accounts. At login it only needs the
//! username to embed in the access token, and it asks a
//! [`UserDirectory`] for it. Production deployments implement the trait
//! over their user service; [`MemoryDirectory`] covers tests and demos.

use std::future::Future;

use dashmap::DashMap;
use keyward_protocol::UserId;

use crate::SessionError;

/// Resolves a user id to the username shown in tokens and session info.
///
/// # Example
///
/// ```rust
/// use keyward_protocol::UserId;
/// use keyward_session::{SessionError, UserDirectory};
///
/// /// Every user is named after their id.
/// struct NumericNames;
///
/// impl UserDirectory for NumericNames {
///     async fn username(&self, user_id: UserId) -> Result<String, SessionError> {
///         Ok(format!("user-{user_id}"))
///     }
/// }
/// ```
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the username, or [`SessionError::UnknownUser`].
    fn username(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;
}

/// An in-memory [`UserDirectory`].
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<UserId, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_user(self, user_id: UserId, username: impl Into<String>) -> Self {
        self.insert(user_id, username);
        self
    }

    /// Adds or renames a user.
    pub fn insert(&self, user_id: UserId, username: impl Into<String>) {
        self.users.insert(user_id, username.into());
    }
}

impl UserDirectory for MemoryDirectory {
    async fn username(&self, user_id: UserId) -> Result<String, SessionError> {
        self.users
            .get(&user_id)
            .map(|name| name.clone())
            .ok_or(SessionError::UnknownUser(user_id))
    }
}
