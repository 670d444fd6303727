//! Session lifecycle for Keyward.
//!
//! 1. **Login and validation** ([`SessionManager::create_session`],
//!    [`SessionManager::validate_session`])
//! 2. **Refresh** with single-use refresh tokens
//! 3. **Revocation** per user or per device, which stays visible as
//!    `Revoked` until the session would have expired anyway
//! 4. **Expiry sweeping**, on demand or through `keyward-sweep`
//! 5. **Presence** ([`PresenceAggregator`])
//!
//! ```text
//! Facade (keyward)  ← ApiResult envelopes, spans, config
//!     ↕
//! Session layer (this crate)  ← lifecycle rules
//!     ↕
//! Store + Token layers  ← records, atomic primitives, signed tokens
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod directory;
mod error;
mod manager;
mod presence;

pub use config::SessionConfig;
pub use directory::{MemoryDirectory, UserDirectory};
pub use error::SessionError;
pub use keyward_store::Session;
pub use manager::SessionManager;
pub use presence::PresenceAggregator;
