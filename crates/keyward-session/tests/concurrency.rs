//! Racing operations on the multi-threaded runtime, plus behavior when
//! the store backend is down.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use keyward_protocol::{SessionId, Timestamp, UserId};
use keyward_session::{SessionConfig, SessionError, SessionManager};
use keyward_store::{MemorySessionStore, RevokeScope, Session, SessionStore, StoreError};
use keyward_token::{ManualClock, SigningKey, TokenCodec, TokenConfig};

// =========================================================================
// Helpers
// =========================================================================

fn codec(clock: &Arc<ManualClock>) -> Arc<TokenCodec> {
    let key = SigningKey::new("v1", b"concurrency-secret-concurrency!!".to_vec()).unwrap();
    Arc::new(TokenCodec::new(TokenConfig::new(key), clock.clone()).unwrap())
}

fn shared_manager() -> (Arc<SessionManager<MemorySessionStore>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000)));
    let mgr = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        codec(&clock),
        SessionConfig {
            sweep_batch_size: 16,
            ..Default::default()
        },
    );
    (Arc::new(mgr), clock)
}

/// A store whose backend never answers.
struct DownStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

impl SessionStore for DownStore {
    async fn put(&self, _session: Session) -> Result<(), StoreError> {
        Err(down())
    }
    async fn get(&self, _id: &SessionId) -> Result<Session, StoreError> {
        Err(down())
    }
    async fn delete(&self, _id: &SessionId) -> Result<(), StoreError> {
        Err(down())
    }
    async fn list_by_user(&self, _user_id: UserId) -> Result<Vec<Session>, StoreError> {
        Err(down())
    }
    async fn scan_expired(&self, _now: Timestamp, _limit: usize) -> Result<Vec<SessionId>, StoreError> {
        Err(down())
    }
    async fn touch(&self, _id: &SessionId, _now: Timestamp) -> Result<Session, StoreError> {
        Err(down())
    }
    async fn compare_and_swap(
        &self,
        _id: &SessionId,
        _expected_version: u64,
        _new: Session,
    ) -> Result<Session, StoreError> {
        Err(down())
    }
    async fn revoke(&self, _user_id: UserId, _scope: RevokeScope) -> Result<Vec<Session>, StoreError> {
        Err(down())
    }
    async fn snapshot(&self) -> Result<Vec<Session>, StoreError> {
        Err(down())
    }
}

/// A store where another sweeper wins one of the claimed ids on every
/// scan. The id is still removed, it just is not reported to this caller.
#[derive(Default)]
struct ContendedStore {
    inner: MemorySessionStore,
    taken: AtomicUsize,
}

impl SessionStore for ContendedStore {
    async fn put(&self, session: Session) -> Result<(), StoreError> {
        self.inner.put(session).await
    }
    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.inner.get(id).await
    }
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        self.inner.list_by_user(user_id).await
    }
    async fn scan_expired(&self, now: Timestamp, limit: usize) -> Result<Vec<SessionId>, StoreError> {
        let mut ids = self.inner.scan_expired(now, limit).await?;
        if ids.pop().is_some() {
            self.taken.fetch_add(1, Ordering::SeqCst);
        }
        Ok(ids)
    }
    async fn touch(&self, id: &SessionId, now: Timestamp) -> Result<Session, StoreError> {
        self.inner.touch(id, now).await
    }
    async fn compare_and_swap(
        &self,
        id: &SessionId,
        expected_version: u64,
        new: Session,
    ) -> Result<Session, StoreError> {
        self.inner.compare_and_swap(id, expected_version, new).await
    }
    async fn revoke(&self, user_id: UserId, scope: RevokeScope) -> Result<Vec<Session>, StoreError> {
        self.inner.revoke(user_id, scope).await
    }
    async fn snapshot(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.snapshot().await
    }
}

// =========================================================================
// Races
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_for_one_user_are_all_listed() {
    let (mgr, _) = shared_manager();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                mgr.create_session(UserId(11), "kim", &format!("device-{i}"), "ip", "ua")
                    .await
            })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let sessions = mgr.get_user_sessions(UserId(11)).await.unwrap();
    assert_eq!(sessions.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clean_expired_counts_each_session_once() {
    let (mgr, clock) = shared_manager();
    for i in 0..200 {
        mgr.create_session(UserId(i % 13), "u", "web", "ip", "ua")
            .await
            .unwrap();
    }
    clock.advance(Duration::from_secs(24 * 60 * 60));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.clean_expired_sessions().await })
        })
        .collect();

    let mut total = 0;
    for h in handles {
        total += h.await.unwrap().unwrap();
    }

    assert_eq!(total, 200);
    assert!(mgr.view().snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clean_expired_losing_claims_to_another_sweeper_still_drains() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000)));
    let store = Arc::new(ContendedStore::default());
    let mgr = SessionManager::new(
        Arc::clone(&store),
        codec(&clock),
        SessionConfig {
            sweep_batch_size: 16,
            ..Default::default()
        },
    );
    for i in 0..40 {
        mgr.create_session(UserId(i % 5), "u", "web", "ip", "ua")
            .await
            .unwrap();
    }
    clock.advance(Duration::from_secs(24 * 60 * 60));

    let counted = mgr.clean_expired_sessions().await.unwrap();

    let taken = store.taken.load(Ordering::SeqCst);
    assert!(taken > 0);
    assert_eq!(counted + taken, 40);
    assert!(store.inner.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_racing_kick_never_leaves_session_valid() {
    let (mgr, _) = shared_manager();

    for round in 0..40u64 {
        let user = UserId(1_000 + round);
        let s = mgr
            .create_session(user, "racer", "web", "ip", "ua")
            .await
            .unwrap();

        let refresh = {
            let mgr = mgr.clone();
            let token = s.refresh_token.clone();
            tokio::spawn(async move { mgr.refresh_token(&token, "web").await })
        };
        let kick = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.kick_out_user(user).await })
        };

        let _ = refresh.await.unwrap();
        kick.await.unwrap().unwrap();

        assert!(matches!(
            mgr.validate_session(&s.session_id).await,
            Err(SessionError::Revoked(_))
        ));
        assert!(!mgr.is_user_online(user).await.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_with_same_token_succeeds_once() {
    let (mgr, _) = shared_manager();
    let s = mgr
        .create_session(UserId(3), "cy", "web", "ip", "ua")
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mgr = mgr.clone();
            let token = s.refresh_token.clone();
            tokio::spawn(async move { mgr.refresh_token(&token, "web").await })
        })
        .collect();

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(SessionError::Conflict(_) | SessionError::Invalid(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
}

// =========================================================================
// Store outage
// =========================================================================

#[tokio::test]
async fn test_store_outage_surfaces_as_alertable_store_unavailable() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000)));
    let mgr = SessionManager::new(Arc::new(DownStore), codec(&clock), SessionConfig::default());

    let create = mgr
        .create_session(UserId(1), "ann", "web", "ip", "ua")
        .await
        .unwrap_err();
    let validate = mgr
        .validate_session(&SessionId::from("x"))
        .await
        .unwrap_err();
    let clean = mgr.clean_expired_sessions().await.unwrap_err();

    for err in [create, validate, clean] {
        assert!(matches!(err, SessionError::StoreUnavailable(_)));
        assert!(err.is_alertable());
    }
}
