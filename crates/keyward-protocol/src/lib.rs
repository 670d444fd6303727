//! Shared protocol types for Keyward.
//!
//! This crate defines the vocabulary every other layer speaks:
//!
//! - **Identities** ([`UserId`], [`SessionId`]) and [`Timestamp`].
//! - **Response shapes** ([`ApiResult`], [`SessionInfo`], [`AuthResponse`],
//!   [`OnlineUserInfo`]) handed to the transport layer.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) for turning responses
//!   into bytes.
//!
//! ```text
//! Transport (bytes) ← Protocol (ApiResult) ← Session (manager, presence)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApiResult, AuthResponse, OnlineUserInfo, SessionId, SessionInfo, SessionStatus, Timestamp,
    UserId,
};
