//! The session manager: every session lifecycle transition goes through here.
//!
//! ## Lifecycle
//!
//! ```text
//! create_session() ──→ [ACTIVE] ──refresh_token()──→ [ACTIVE]
//!                          │
//!        ┌─────────────────┼────────────────────┐
//!        ▼                 ▼                    ▼
//!  (expire_time passes) kick_out_*()      destroy_session()
//!        │                 │                    │
//!        ▼                 ▼                    ▼
//!    [EXPIRED]          [KICKED]             removed
//!        │                 │
//!        ▼                 ▼
//!  clean_expired()    removed + tombstone
//! ```
//!
//! # Concurrency
//!
//! `SessionManager` is `Send + Sync` and meant to be shared behind an
//! `Arc`. It holds no locks of its own: every operation is a short
//! sequence of store calls, and the store's per-session and per-user
//! atomicity is what keeps racing operations correct. A refresh commits
//! with compare-and-swap, so it cannot overwrite a kick-out or a
//! concurrent refresh of the same session.

use std::sync::Arc;

use keyward_protocol::{AuthResponse, SessionId, SessionStatus, Timestamp, UserId};
use keyward_store::{RevokeScope, Session, SessionStore, StoreView};
use keyward_sweep::SweepTarget;
use keyward_token::{TokenCodec, TokenType, random_id};
use tracing::{debug, info, warn};

use crate::{PresenceAggregator, SessionConfig, SessionError};

/// Creates, validates, refreshes, revokes and sweeps sessions.
pub struct SessionManager<S> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
    config: SessionConfig,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: Arc<S>, codec: Arc<TokenCodec>, config: SessionConfig) -> Self {
        Self {
            store,
            codec,
            config: config.validated(),
        }
    }

    fn now(&self) -> Timestamp {
        self.codec.clock().now()
    }

    /// Fails unless the session is ACTIVE and unexpired at `now`.
    fn ensure_live(session: &Session, now: Timestamp) -> Result<(), SessionError> {
        match session.status {
            SessionStatus::Kicked => Err(SessionError::Revoked(session.session_id.clone())),
            SessionStatus::Expired => Err(SessionError::Expired(session.session_id.clone())),
            SessionStatus::Active if session.is_expired_at(now) => {
                Err(SessionError::Expired(session.session_id.clone()))
            }
            SessionStatus::Active => Ok(()),
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Logs a user in on one device.
    ///
    /// Every call creates a new session; a user may hold any number of
    /// sessions, including several with the same `device_info`.
    pub async fn create_session(
        &self,
        user_id: UserId,
        username: &str,
        device_info: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Session, SessionError> {
        let now = self.now();
        let session = Session {
            session_id: SessionId(random_id()),
            user_id,
            username: username.to_string(),
            access_token: self.codec.issue_access_token(user_id, username)?,
            refresh_token: self.codec.issue_refresh_token(user_id)?,
            device_info: device_info.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            login_time: now,
            last_active_time: now,
            expire_time: now.saturating_add(self.codec.access_ttl()),
            status: SessionStatus::Active,
            version: 0,
        };

        self.store.put(session.clone()).await?;

        info!(
            session_id = %session.session_id,
            %user_id,
            device = %device_info,
            ip = %ip_address,
            "session created"
        );
        Ok(session)
    }

    /// Checks that a session is usable and records the activity.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown id
    /// - [`SessionError::Revoked`] if it was kicked out
    /// - [`SessionError::Expired`] if `now >= expire_time` or it is not ACTIVE
    pub async fn validate_session(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let now = self.now();
        let session = self.store.touch(session_id, now).await?;
        Self::ensure_live(&session, now)?;
        debug!(%session_id, "session validated");
        Ok(session)
    }

    /// Records activity on a session. Same checks as
    /// [`validate_session`](Self::validate_session).
    pub async fn update_session_activity(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.validate_session(session_id).await.map(|_| ())
    }

    /// Exchanges a refresh token for a new token pair and extends the
    /// session by one access-token lifetime.
    ///
    /// The presented token must be the session's *current* refresh token.
    /// With rotation on, a refresh token works exactly once.
    ///
    /// # Errors
    /// - [`SessionError::Invalid`] for a bad, expired, or superseded token
    /// - [`SessionError::Revoked`] if the session was kicked out meanwhile
    /// - [`SessionError::Conflict`] if another write won the race
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        device_info: &str,
    ) -> Result<AuthResponse, SessionError> {
        let claims = self
            .codec
            .parse_as(refresh_token, TokenType::Refresh)
            .inspect_err(|e| debug!(error = %e, "refresh token rejected"))?;
        let user_id = claims.user_id;

        // Match on the signed token id rather than the raw token text.
        let sessions = self.store.list_by_user(user_id).await?;
        let Some(current) = sessions
            .into_iter()
            .find(|s| self.refresh_token_id(s).as_deref() == Some(claims.token_id.as_str()))
        else {
            warn!(%user_id, jti = %claims.token_id, "refresh token is not current, possible replay");
            return Err(SessionError::Invalid(
                "refresh token is not the session's current token".into(),
            ));
        };

        let session_id = current.session_id.clone();
        match current.status {
            SessionStatus::Active => {}
            SessionStatus::Kicked => return Err(SessionError::Revoked(session_id)),
            SessionStatus::Expired => return Err(SessionError::Expired(session_id)),
        }

        if current.device_info != device_info {
            if self.config.bind_refresh_to_device {
                warn!(
                    %session_id,
                    expected = %current.device_info,
                    got = %device_info,
                    "refresh from a different device rejected"
                );
                return Err(SessionError::Invalid(
                    "refresh token is bound to another device".into(),
                ));
            }
            warn!(
                %session_id,
                expected = %current.device_info,
                got = %device_info,
                "refresh from a different device"
            );
        }

        let now = self.now();
        let mut next = current.clone();
        next.access_token = self
            .codec
            .issue_access_token(user_id, &current.username)?;
        if self.config.rotate_refresh_tokens {
            next.refresh_token = self.codec.issue_refresh_token(user_id)?;
        }
        next.last_active_time = now;
        next.expire_time = now.saturating_add(self.codec.access_ttl());

        let committed = self
            .store
            .compare_and_swap(&session_id, current.version, next)
            .await
            .inspect_err(|e| debug!(%session_id, error = %e, "refresh commit failed"))?;

        info!(%session_id, %user_id, "session refreshed");

        Ok(AuthResponse {
            token: committed.access_token,
            refresh_token: committed.refresh_token,
            user_id,
            username: committed.username,
            expires_in: self.codec.access_ttl().as_secs(),
        })
    }

    /// The `jti` of the session's current refresh token, if it still parses.
    fn refresh_token_id(&self, session: &Session) -> Option<String> {
        self.codec
            .parse_as(&session.refresh_token, TokenType::Refresh)
            .ok()
            .map(|c| c.token_id)
    }

    /// Logs a session out. Succeeds whether or not the session exists.
    pub async fn destroy_session(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.store.delete(session_id).await?;
        info!(%session_id, "session destroyed");
        Ok(())
    }

    /// Revokes every session of `user_id`. Returns how many were revoked.
    pub async fn kick_out_user(&self, user_id: UserId) -> Result<usize, SessionError> {
        let revoked = self.store.revoke(user_id, RevokeScope::AllDevices).await?;
        info!(%user_id, count = revoked.len(), "user kicked out");
        Ok(revoked.len())
    }

    /// Revokes the sessions of `user_id` on exactly `device_info`.
    pub async fn kick_out_device(
        &self,
        user_id: UserId,
        device_info: &str,
    ) -> Result<usize, SessionError> {
        let revoked = self
            .store
            .revoke(user_id, RevokeScope::Device(device_info.to_string()))
            .await?;
        info!(%user_id, device = %device_info, count = revoked.len(), "device kicked out");
        Ok(revoked.len())
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// The user's sessions, oldest login first.
    pub async fn get_user_sessions(&self, user_id: UserId) -> Result<Vec<Session>, SessionError> {
        let mut sessions = self.store.list_by_user(user_id).await?;
        sessions.sort_by(|a, b| {
            a.login_time
                .cmp(&b.login_time)
                .then_with(|| a.session_id.as_str().cmp(b.session_id.as_str()))
        });
        Ok(sessions)
    }

    /// Whether the user has at least one ACTIVE, unexpired session.
    pub async fn is_user_online(&self, user_id: UserId) -> Result<bool, SessionError> {
        let now = self.now();
        let sessions = self.store.list_by_user(user_id).await?;
        Ok(sessions.iter().any(|s| s.is_online(now)))
    }

    // -----------------------------------------------------------------
    // Expiry
    // -----------------------------------------------------------------

    /// Removes up to `limit` expired sessions. Returns how many this call
    /// removed; sessions claimed by a concurrent caller are not counted.
    pub async fn sweep_batch(&self, limit: usize) -> Result<usize, SessionError> {
        let now = self.now();
        let removed = self.store.scan_expired(now, limit).await?;
        if !removed.is_empty() {
            info!(count = removed.len(), "expired sessions swept");
        }
        Ok(removed.len())
    }

    /// Removes every currently expired session, in batches of
    /// `sweep_batch_size`. Returns the total this call removed.
    ///
    /// Drains until a batch comes back empty. A short batch only means a
    /// concurrent sweeper claimed some candidates, not that none are left.
    pub async fn clean_expired_sessions(&self) -> Result<usize, SessionError> {
        let batch = self.config.sweep_batch_size;
        let mut total = 0;
        loop {
            let n = self.sweep_batch(batch).await?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read-only handle on the store.
    pub fn view(&self) -> StoreView<S> {
        StoreView::new(Arc::clone(&self.store))
    }

    /// Presence aggregation over this manager's sessions and clock.
    pub fn presence(&self) -> PresenceAggregator<S> {
        PresenceAggregator::new(self.view(), Arc::clone(self.codec.clock()))
    }
}

impl<S: SessionStore> SweepTarget for SessionManager<S> {
    type Error = SessionError;

    async fn sweep_batch(&self, limit: usize) -> Result<usize, SessionError> {
        SessionManager::sweep_batch(self, limit).await
    }
}
