//! The session record: the server's state for one (user, device) login.
//!
//! A session tracks:
//! - WHO logged in (`user_id`, `username`)
//! - FROM WHERE (`device_info`, `ip_address`, `user_agent`)
//! - WITH WHICH credentials (the current access/refresh token pair)
//! - WHEN (`login_time`, `last_active_time`, `expire_time`)
//! - WHAT state it is in (`status`)
//!
//! Invariant: `login_time <= last_active_time <= expire_time`.

use keyward_protocol::{SessionId, SessionInfo, SessionStatus, Timestamp, UserId};

/// One login session as held by a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,

    /// The currently valid access token. Replaced on refresh.
    pub access_token: String,

    /// The currently valid refresh token. A refresh must present exactly
    /// this value; anything else is a replay or a stale token.
    pub refresh_token: String,

    pub device_info: String,
    pub ip_address: String,
    pub user_agent: String,

    pub login_time: Timestamp,

    /// Last time the session was used. Only ever moves forward.
    pub last_active_time: Timestamp,

    /// The session stops validating at this instant unless refreshed.
    pub expire_time: Timestamp,

    pub status: SessionStatus,

    /// Write counter maintained by the store, used as the
    /// compare-and-swap precondition. Activity touches do not bump it.
    pub version: u64,
}

impl Session {
    /// `status == ACTIVE && now < expire_time`.
    pub fn is_online(&self, now: Timestamp) -> bool {
        self.status == SessionStatus::Active && now < self.expire_time
    }

    /// `now >= expire_time`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expire_time
    }

    /// The caller-facing view, including tokens.
    pub fn to_info(&self, now: Timestamp) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            user_id: self.user_id,
            username: self.username.clone(),
            access_token: Some(self.access_token.clone()),
            refresh_token: Some(self.refresh_token.clone()),
            device_info: self.device_info.clone(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            login_time: self.login_time,
            last_active_time: self.last_active_time,
            expire_time: self.expire_time,
            status: self.status,
            online: self.is_online(now),
        }
    }
}
