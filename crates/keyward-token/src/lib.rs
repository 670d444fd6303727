//! Signed tokens for Keyward.
//!
//! - [`TokenCodec`] issues and verifies HS256 access/refresh tokens.
//! - [`TokenConfig`] / [`SigningKey`] hold the versioned key ring and
//!   token lifetimes, fixed at startup.
//! - [`Clock`] abstracts "now" so expiry can be tested with
//!   [`ManualClock`] instead of waiting.
//!
//! Decoding never panics and never leaks the JWT library's error type:
//! every failure is one of the three [`TokenError`] kinds.

mod clock;
mod codec;
mod config;
mod error;
mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Claims, TokenCodec, TokenType};
pub use config::{SigningKey, TokenConfig};
pub use error::{SigningError, TokenError};
pub use id::random_id;
