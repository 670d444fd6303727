//! The session store contract.
//!
//! A store keeps session records keyed by [`SessionId`] plus a secondary
//! index from [`UserId`] to that user's session ids. The index is never
//! written on its own: it changes only as a side effect of the record
//! operations below, which keeps the two in sync.
//!
//! # Atomicity requirements for implementations
//!
//! - Operations that touch the user index (`put`, `delete`, `revoke`,
//!   `scan_expired`) are linearized per user. Two logins of the same user
//!   racing each other must both end up in the index.
//! - Operations on one record (`touch`, `compare_and_swap`, the
//!   compare-and-delete inside `scan_expired`) are linearized per session.
//! - There is no store-wide lock. Unrelated users and sessions never
//!   contend.

use std::future::Future;
use std::sync::Arc;

use keyward_protocol::{SessionId, Timestamp, UserId};

use crate::{Session, StoreError};

/// Which of a user's sessions a revocation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeScope {
    /// Every session of the user.
    AllDevices,
    /// Every session whose `device_info` equals this string exactly.
    Device(String),
}

impl RevokeScope {
    /// Returns `true` if `session` falls inside this scope.
    pub fn matches(&self, session: &Session) -> bool {
        match self {
            Self::AllDevices => true,
            Self::Device(device) => session.device_info == *device,
        }
    }
}

/// Keyed storage for sessions with a per-user index.
///
/// All methods are async so that networked backends fit the same
/// contract; each call is expected to be a single backend round-trip.
/// Implementations must never hold a lock across an `.await`.
pub trait SessionStore: Send + Sync + 'static {
    /// Inserts or replaces a record and adds its id to the user's index,
    /// as one indivisible step with respect to the same user.
    fn put(&self, session: Session) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetches a record.
    ///
    /// # Errors
    /// - [`StoreError::Revoked`] if the session was kicked out
    /// - [`StoreError::NotFound`] if it never existed or is long gone
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Removes a record and its index entry. Succeeds if already absent.
    fn delete(&self, session_id: &SessionId)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All of a user's sessions. Each record is individually consistent;
    /// the list as a whole is not isolated from concurrent writes.
    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Claims and removes up to `limit` sessions with `expire_time <= now`.
    ///
    /// Each removal re-checks the expiry under the record's lock
    /// (compare-and-delete), so a session refreshed after being picked as
    /// a candidate survives, and two concurrent sweepers never both
    /// return the same id. Candidates lost to a concurrent sweeper are
    /// replaced, so a result shorter than `limit` means no expired session
    /// was left. Revocation tombstones older than `now` are pruned as well.
    fn scan_expired(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SessionId>, StoreError>> + Send;

    /// Records activity: sets `last_active_time = max(last_active_time, now)`
    /// if the session is ACTIVE and `now < expire_time`, then returns the
    /// record. Never changes `expire_time` or `version`.
    fn touch(
        &self,
        session_id: &SessionId,
        now: Timestamp,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Replaces the record iff its `version` still equals
    /// `expected_version`. The stored copy gets `version + 1`, keeps the
    /// original id and user, and never moves `last_active_time` back.
    ///
    /// Never inserts: a record that has been removed stays removed.
    ///
    /// # Errors
    /// - [`StoreError::Conflict`] on a version mismatch
    /// - [`StoreError::Revoked`] / [`StoreError::NotFound`] if the record is gone
    fn compare_and_swap(
        &self,
        session_id: &SessionId,
        expected_version: u64,
        new: Session,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Marks every session of `user_id` inside `scope` as KICKED, removes
    /// it from records and index, and leaves a tombstone so later lookups
    /// report [`StoreError::Revoked`]. Atomic with respect to the user.
    ///
    /// Returns the revoked sessions (status `Kicked`).
    fn revoke(
        &self,
        user_id: UserId,
        scope: RevokeScope,
    ) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// A point-in-time copy of every record.
    fn snapshot(&self) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;
}

/// Read-only access to a store.
///
/// Handed to components that must observe sessions but never change them
/// (presence). Only the read half of [`SessionStore`] is reachable
/// through it.
pub struct StoreView<S> {
    store: Arc<S>,
}

impl<S: SessionStore> StoreView<S> {
    /// Wraps a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// See [`SessionStore::get`].
    pub async fn get(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        self.store.get(session_id).await
    }

    /// See [`SessionStore::list_by_user`].
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        self.store.list_by_user(user_id).await
    }

    /// See [`SessionStore::snapshot`].
    pub async fn snapshot(&self) -> Result<Vec<Session>, StoreError> {
        self.store.snapshot().await
    }
}

impl<S> Clone for StoreView<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
