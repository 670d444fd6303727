//! Session storage for Keyward.
//!
//! - [`Session`] is the stored record.
//! - [`SessionStore`] is the contract every backend implements, with its
//!   per-user and per-session atomicity rules.
//! - [`MemorySessionStore`] is the in-process backend.
//! - [`StoreView`] exposes only the read half, for observers.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod session;
mod store;

pub use error::StoreError;
pub use memory::MemorySessionStore;
pub use session::Session;
pub use store::{RevokeScope, SessionStore, StoreView};
