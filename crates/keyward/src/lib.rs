//! # Keyward
//!
//! Session and token management for services that let one user stay
//! logged in on many devices.
//!
//! Keyward issues signed access/refresh token pairs, tracks one session
//! per login, lets operators kick a user (or one device) out, reports who
//! is online, and sweeps expired sessions in the background.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keyward::prelude::*;
//!
//! # async fn demo() -> Result<(), KeywardError> {
//! keyward::init_tracing();
//! let config = KeywardConfig::from_env()?;
//! let directory = MemoryDirectory::new().with_user(UserId(42), "alice");
//! let service = SessionService::from_config(
//!     config,
//!     Arc::new(MemorySessionStore::new()),
//!     directory,
//! )?;
//! let sweeper = service.spawn_sweeper();
//!
//! let login = service
//!     .create_session(UserId(42), "iPhone", "1.2.3.4", "Safari", Some("req-1"))
//!     .await;
//! assert!(login.is_success());
//!
//! sweeper.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod service;

pub use config::{ConfigError, KeywardConfig};
pub use error::KeywardError;
pub use service::SessionService;

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything needed to wire up a service.
pub mod prelude {
    pub use crate::{ConfigError, KeywardConfig, KeywardError, SessionService};
    pub use keyward_protocol::{
        ApiResult, AuthResponse, Codec, JsonCodec, OnlineUserInfo, SessionId, SessionInfo,
        SessionStatus, Timestamp, UserId,
    };
    pub use keyward_session::{
        MemoryDirectory, PresenceAggregator, SessionConfig, SessionError, SessionManager,
        UserDirectory,
    };
    pub use keyward_store::{MemorySessionStore, Session, SessionStore, StoreError};
    pub use keyward_sweep::{SweepConfig, SweepMetrics, Sweeper, SweeperHandle};
    pub use keyward_token::{
        Clock, ManualClock, SigningKey, SystemClock, TokenCodec, TokenConfig, TokenError,
    };
}
