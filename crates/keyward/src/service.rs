//! `SessionService`: the caller-facing API.
//!
//! Wraps a [`SessionManager`] and turns every outcome into an
//! [`ApiResult`] envelope. Each call runs inside a `session_op` span
//! carrying the operation name and the caller's correlation id, so log
//! lines from the store and manager can be traced back to one request.

use std::future::Future;
use std::sync::Arc;

use keyward_protocol::{ApiResult, AuthResponse, OnlineUserInfo, SessionId, SessionInfo, UserId};
use keyward_session::{SessionError, SessionManager, UserDirectory};
use keyward_store::SessionStore;
use keyward_sweep::{SweepConfig, Sweeper, SweeperHandle};
use keyward_token::{Clock, SystemClock, TokenCodec};
use tracing::{Instrument, debug, error, info_span};

use crate::{KeywardConfig, KeywardError};

/// The eleven session operations, each returning an [`ApiResult`].
pub struct SessionService<S, D> {
    manager: Arc<SessionManager<S>>,
    directory: D,
    sweep: SweepConfig,
}

impl<S: SessionStore, D: UserDirectory> SessionService<S, D> {
    /// Builds the service on the system clock.
    pub fn from_config(
        config: KeywardConfig,
        store: Arc<S>,
        directory: D,
    ) -> Result<Self, KeywardError> {
        Self::with_clock(config, store, directory, Arc::new(SystemClock))
    }

    /// Builds the service on an explicit clock.
    pub fn with_clock(
        config: KeywardConfig,
        store: Arc<S>,
        directory: D,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeywardError> {
        let codec = TokenCodec::new(config.token, clock)?;
        let manager = SessionManager::new(store, Arc::new(codec), config.session);
        Ok(Self {
            manager: Arc::new(manager),
            directory,
            sweep: config.sweep,
        })
    }

    /// The underlying manager.
    pub fn manager(&self) -> &Arc<SessionManager<S>> {
        &self.manager
    }

    /// Starts the background expiry sweeper with the configured interval
    /// and batch size.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        Sweeper::spawn(Arc::clone(&self.manager), self.sweep.clone())
    }

    fn now(&self) -> keyward_protocol::Timestamp {
        self.manager.codec().clock().now()
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    pub async fn create_session(
        &self,
        user_id: UserId,
        device_info: &str,
        ip_address: &str,
        user_agent: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<SessionInfo> {
        run("create_session", correlation_id, async {
            let username = self.directory.username(user_id).await?;
            let session = self
                .manager
                .create_session(user_id, &username, device_info, ip_address, user_agent)
                .await?;
            Ok(session.to_info(self.now()))
        })
        .await
    }

    pub async fn validate_session(
        &self,
        session_id: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<SessionInfo> {
        run("validate_session", correlation_id, async {
            let session = self
                .manager
                .validate_session(&SessionId::from(session_id))
                .await?;
            Ok(session.to_info(self.now()))
        })
        .await
    }

    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        device_info: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<AuthResponse> {
        run(
            "refresh_token",
            correlation_id,
            self.manager.refresh_token(refresh_token, device_info),
        )
        .await
    }

    pub async fn destroy_session(
        &self,
        session_id: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<String> {
        run("destroy_session", correlation_id, async {
            self.manager
                .destroy_session(&SessionId::from(session_id))
                .await?;
            Ok(format!("session {session_id} destroyed"))
        })
        .await
    }

    pub async fn kick_out_user(
        &self,
        user_id: UserId,
        correlation_id: Option<&str>,
    ) -> ApiResult<String> {
        run("kick_out_user", correlation_id, async {
            let count = self.manager.kick_out_user(user_id).await?;
            Ok(format!("kicked out {count} session(s) of user {user_id}"))
        })
        .await
    }

    pub async fn kick_out_device(
        &self,
        user_id: UserId,
        device_info: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<String> {
        run("kick_out_device", correlation_id, async {
            let count = self.manager.kick_out_device(user_id, device_info).await?;
            Ok(format!(
                "kicked out {count} session(s) of user {user_id} on {device_info}"
            ))
        })
        .await
    }

    /// Token fields are stripped from every entry.
    pub async fn get_user_sessions(
        &self,
        user_id: UserId,
        correlation_id: Option<&str>,
    ) -> ApiResult<Vec<SessionInfo>> {
        run("get_user_sessions", correlation_id, async {
            let now = self.now();
            let sessions = self.manager.get_user_sessions(user_id).await?;
            Ok(sessions
                .iter()
                .map(|s| s.to_info(now).redacted())
                .collect())
        })
        .await
    }

    pub async fn update_session_activity(
        &self,
        session_id: &str,
        correlation_id: Option<&str>,
    ) -> ApiResult<String> {
        run("update_session_activity", correlation_id, async {
            self.manager
                .update_session_activity(&SessionId::from(session_id))
                .await?;
            Ok("activity recorded".to_string())
        })
        .await
    }

    pub async fn is_user_online(
        &self,
        user_id: UserId,
        correlation_id: Option<&str>,
    ) -> ApiResult<bool> {
        run(
            "is_user_online",
            correlation_id,
            self.manager.is_user_online(user_id),
        )
        .await
    }

    pub async fn get_online_users(
        &self,
        correlation_id: Option<&str>,
    ) -> ApiResult<Vec<OnlineUserInfo>> {
        run("get_online_users", correlation_id, async {
            self.manager.presence().get_online_users().await
        })
        .await
    }

    pub async fn clean_expired_sessions(&self, correlation_id: Option<&str>) -> ApiResult<String> {
        run("clean_expired_sessions", correlation_id, async {
            let removed = self.manager.clean_expired_sessions().await?;
            Ok(format!("removed {removed} expired session(s)"))
        })
        .await
    }
}

/// Runs `fut` inside the operation's span and wraps its outcome.
async fn run<T>(
    op: &'static str,
    correlation_id: Option<&str>,
    fut: impl Future<Output = Result<T, SessionError>>,
) -> ApiResult<T> {
    let span = info_span!("session_op", op, correlation_id = correlation_id.unwrap_or("-"));
    async move {
        match fut.await {
            Ok(value) => ApiResult::ok(value),
            Err(e) => {
                if e.is_alertable() {
                    error!(error = %e, "session operation failed");
                } else {
                    debug!(error = %e, "session operation rejected");
                }
                ApiResult::fail(e.to_string())
            }
        }
    }
    .instrument(span)
    .await
}
