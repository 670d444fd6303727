//! In-process [`SessionStore`] backed by sharded concurrent maps.
//!
//! Three maps:
//! - `records`: session id to record
//! - `index`: user id to the set of that user's session ids
//! - `tombstones`: ids removed by a revocation, kept until their
//!   original expiry so lookups can report `Revoked`
//!
//! Lock order is always `index` entry, then `records`, then `tombstones`.
//! At most one guard per map is held at a time and no guard ever lives
//! across an `.await` (there are none inside these methods).

use std::collections::HashSet;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use keyward_protocol::{SessionId, SessionStatus, Timestamp, UserId};
use tracing::{debug, info};

use crate::{RevokeScope, Session, SessionStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Tombstone {
    expire_time: Timestamp,
}

/// A [`SessionStore`] that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: DashMap<SessionId, Session>,
    index: DashMap<UserId, HashSet<SessionId>>,
    tombstones: DashMap<SessionId, Tombstone>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of users with at least one live record.
    pub fn user_count(&self) -> usize {
        self.index.len()
    }

    fn missing(&self, session_id: &SessionId) -> StoreError {
        if self.tombstones.contains_key(session_id) {
            StoreError::Revoked(session_id.clone())
        } else {
            StoreError::NotFound(session_id.clone())
        }
    }

    /// Removes `session_id` from the user's index set. The caller holds
    /// the entry; an emptied set is dropped so `index` only names users
    /// that still have sessions.
    fn unlink(entry: Entry<'_, UserId, HashSet<SessionId>>, session_id: &SessionId) {
        if let Entry::Occupied(mut ids) = entry {
            ids.get_mut().remove(session_id);
            if ids.get().is_empty() {
                ids.remove();
            }
        }
    }
}

impl SessionStore for MemorySessionStore {
    async fn put(&self, mut session: Session) -> Result<(), StoreError> {
        let session_id = session.session_id.clone();
        let mut ids = self.index.entry(session.user_id).or_default();

        match self.records.entry(session_id.clone()) {
            Entry::Occupied(mut existing) => {
                session.version = existing.get().version + 1;
                existing.insert(session);
            }
            Entry::Vacant(slot) => {
                slot.insert(session);
            }
        }
        ids.insert(session_id);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        match self.records.get(session_id) {
            Some(record) => Ok(record.clone()),
            None => Err(self.missing(session_id)),
        }
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let Some(user_id) = self.records.get(session_id).map(|s| s.user_id) else {
            return Ok(());
        };

        let entry = self.index.entry(user_id);
        self.records.remove(session_id);
        Self::unlink(entry, session_id);
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        let ids: Vec<SessionId> = self
            .index
            .get(&user_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn scan_expired(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<SessionId>, StoreError> {
        let mut claimed = Vec::with_capacity(limit.min(1024));
        // Candidates taken by a concurrent sweeper shrink this round, so
        // keep scanning until the batch is full or nothing expired is left.
        while claimed.len() < limit {
            let candidates: Vec<(SessionId, UserId)> = self
                .records
                .iter()
                .filter(|r| r.expire_time <= now)
                .take(limit - claimed.len())
                .map(|r| (r.key().clone(), r.user_id))
                .collect();
            if candidates.is_empty() {
                break;
            }

            for (session_id, user_id) in candidates {
                let entry = self.index.entry(user_id);
                // Re-check under the record lock: a refresh may have extended
                // it, or another sweeper may have taken it already.
                let removed = self
                    .records
                    .remove_if(&session_id, |_, s| s.expire_time <= now)
                    .is_some();
                if removed {
                    Self::unlink(entry, &session_id);
                    claimed.push(session_id);
                }
            }
        }

        let before = self.tombstones.len();
        self.tombstones.retain(|_, t| t.expire_time > now);
        let pruned = before.saturating_sub(self.tombstones.len());

        if !claimed.is_empty() || pruned > 0 {
            debug!(
                claimed = claimed.len(),
                tombstones_pruned = pruned,
                "expired sessions removed"
            );
        }
        Ok(claimed)
    }

    async fn touch(&self, session_id: &SessionId, now: Timestamp) -> Result<Session, StoreError> {
        let Some(mut record) = self.records.get_mut(session_id) else {
            return Err(self.missing(session_id));
        };

        if record.is_online(now) && now > record.last_active_time {
            record.last_active_time = now;
        }
        Ok(record.clone())
    }

    async fn compare_and_swap(
        &self,
        session_id: &SessionId,
        expected_version: u64,
        mut new: Session,
    ) -> Result<Session, StoreError> {
        let Some(mut record) = self.records.get_mut(session_id) else {
            return Err(self.missing(session_id));
        };

        if record.version != expected_version {
            return Err(StoreError::Conflict(session_id.clone()));
        }

        new.session_id = record.session_id.clone();
        new.user_id = record.user_id;
        new.version = expected_version + 1;
        new.last_active_time = new
            .last_active_time
            .max(record.last_active_time)
            .min(new.expire_time);

        *record = new;
        Ok(record.clone())
    }

    async fn revoke(&self, user_id: UserId, scope: RevokeScope) -> Result<Vec<Session>, StoreError> {
        let Entry::Occupied(mut ids) = self.index.entry(user_id) else {
            return Ok(Vec::new());
        };

        let targets: Vec<(SessionId, Timestamp)> = ids
            .get()
            .iter()
            .filter_map(|id| {
                self.records
                    .get(id)
                    .filter(|s| scope.matches(s))
                    .map(|s| (id.clone(), s.expire_time))
            })
            .collect();

        let mut revoked = Vec::with_capacity(targets.len());
        for (session_id, expire_time) in targets {
            // Tombstone first so no reader ever sees the id as plain
            // "not found" while the revocation is in flight.
            self.tombstones
                .insert(session_id.clone(), Tombstone { expire_time });
            if let Some((_, mut session)) = self.records.remove(&session_id) {
                session.status = SessionStatus::Kicked;
                revoked.push(session);
            }
            ids.get_mut().remove(&session_id);
        }

        if ids.get().is_empty() {
            ids.remove();
        }

        info!(%user_id, ?scope, count = revoked.len(), "sessions revoked");
        Ok(revoked)
    }

    async fn snapshot(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
