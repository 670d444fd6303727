//! Who is online right now.
//!
//! Presence is derived on demand from live sessions; nothing is stored.
//! The aggregator only ever sees a [`StoreView`], so it cannot change
//! any session.

use std::collections::BTreeMap;
use std::sync::Arc;

use keyward_protocol::{OnlineUserInfo, UserId};
use keyward_store::{Session, SessionStore, StoreView};
use keyward_token::Clock;

use crate::SessionError;

/// Builds per-user presence summaries.
pub struct PresenceAggregator<S> {
    view: StoreView<S>,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> PresenceAggregator<S> {
    pub fn new(view: StoreView<S>, clock: Arc<dyn Clock>) -> Self {
        Self { view, clock }
    }

    /// One entry per user with at least one ACTIVE, unexpired session,
    /// sorted by user id.
    pub async fn get_online_users(&self) -> Result<Vec<OnlineUserInfo>, SessionError> {
        let now = self.clock.now();
        let sessions = self.view.snapshot().await?;

        let mut by_user: BTreeMap<UserId, Vec<&Session>> = BTreeMap::new();
        for session in sessions.iter().filter(|s| s.is_online(now)) {
            by_user.entry(session.user_id).or_default().push(session);
        }

        Ok(by_user.into_values().filter_map(summarize).collect())
    }

    /// Number of distinct online users.
    pub async fn online_user_count(&self) -> Result<usize, SessionError> {
        Ok(self.get_online_users().await?.len())
    }

    /// Presence of one user, or `None` if they have no live session.
    pub async fn user_presence(
        &self,
        user_id: UserId,
    ) -> Result<Option<OnlineUserInfo>, SessionError> {
        let now = self.clock.now();
        let sessions = self.view.list_by_user(user_id).await?;
        Ok(summarize(sessions.iter().filter(|s| s.is_online(now)).collect()))
    }
}

/// Collapses one user's live sessions. The device and IP shown are those
/// of the most recently active session.
fn summarize(sessions: Vec<&Session>) -> Option<OnlineUserInfo> {
    let latest = sessions.iter().copied().max_by(|a, b| {
        a.last_active_time
            .cmp(&b.last_active_time)
            .then_with(|| a.session_id.as_str().cmp(b.session_id.as_str()))
    })?;

    let login_time = sessions.iter().map(|s| s.login_time).min()?;
    let last_active_time = sessions.iter().map(|s| s.last_active_time).max()?;

    Some(OnlineUserInfo {
        user_id: latest.user_id,
        username: latest.username.clone(),
        device_count: sessions.len(),
        active_device: latest.device_info.clone(),
        ip_address: latest.ip_address.clone(),
        login_time,
        last_active_time,
    })
}
