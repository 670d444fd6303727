//! Core protocol types: identities, timestamps, and the response shapes
//! handed to the transport layer.
//!
//! Everything here is plain data. These are the structures that get
//! serialized and sent to callers of the session service, so their JSON
//! shape is part of the contract: field names are camelCase and the
//! response envelope keeps the `{code, message, data, success}` layout
//! existing clients already parse.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// Newtype over `u64` so a user id can never be passed where some other
/// number is expected. `#[serde(transparent)]` keeps the JSON form a plain
/// number: `UserId(42)` is `42` on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of one login session.
///
/// Generated by the session manager from 128 bits of randomness and
/// rendered as 32 lowercase hex characters. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Wall-clock instant as milliseconds since the unix epoch.
///
/// Session bookkeeping (login, last activity, expiry) uses millisecond
/// precision so that activity ordering is meaningful within one second.
/// Token claims use whole seconds; see [`Timestamp::as_secs`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Builds a timestamp from unix milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Builds a timestamp from unix seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Unix milliseconds.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Unix seconds, rounded down.
    pub fn as_secs(self) -> u64 {
        self.0 / 1000
    }

    /// `self + d`, saturating at `u64::MAX` milliseconds.
    pub fn saturating_add(self, d: Duration) -> Self {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
///
/// ```text
///   (create) ──→ Active ──(ttl elapsed)──→ Expired ──→ removed
///                  │  ↺ validate / refresh
///                  └──(kick-out)──────────→ Kicked  ──→ removed
/// ```
///
/// `Active` is the only non-terminal state. Serialized in upper case
/// (`"ACTIVE"`) to match what existing callers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Logged in and usable until its expiry time.
    Active,
    /// Passed its expiry time; waiting for the sweep to remove it.
    Expired,
    /// Explicitly revoked by a kick-out.
    Kicked,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Kicked => write!(f, "KICKED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Caller-facing view of one session.
///
/// Token fields are optional because listings of a user's sessions are
/// redacted: one device should not learn another device's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub device_info: String,
    pub ip_address: String,
    pub user_agent: String,
    pub login_time: Timestamp,
    pub last_active_time: Timestamp,
    pub expire_time: Timestamp,
    pub status: SessionStatus,
    /// `status == ACTIVE && now < expire_time`, evaluated when the view
    /// was built.
    pub online: bool,
}

impl SessionInfo {
    /// Returns a copy with both tokens removed.
    pub fn redacted(mut self) -> Self {
        self.access_token = None;
        self.refresh_token = None;
        self
    }
}

/// Result of a successful token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// The new access token.
    pub token: String,
    /// The refresh token to present next time (rotated unless rotation
    /// is disabled).
    pub refresh_token: String,
    pub user_id: UserId,
    pub username: String,
    /// Seconds until the new access token expires.
    pub expires_in: u64,
}

/// Presence summary for one user, derived from their active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUserInfo {
    pub user_id: UserId,
    pub username: String,
    /// Number of active, unexpired sessions.
    pub device_count: usize,
    /// Device of the most recently active session.
    pub active_device: String,
    /// IP address of the most recently active session.
    pub ip_address: String,
    /// Earliest login among the user's sessions.
    pub login_time: Timestamp,
    /// Latest activity among the user's sessions.
    pub last_active_time: Timestamp,
}

// ---------------------------------------------------------------------------
// ApiResult: the response envelope
// ---------------------------------------------------------------------------

/// Uniform response envelope returned by every service operation.
///
/// ```text
/// { "code": 200, "message": "success", "data": {...}, "success": true }
/// { "code": 500, "message": "session expired: ...", "data": null, "success": false }
/// ```
///
/// `code` follows the legacy convention: 200 for success, 500 for any
/// failure. The failure kind is carried in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
    pub success: bool,
}

impl<T> ApiResult<T> {
    /// Success code.
    pub const CODE_OK: i32 = 200;
    /// Generic failure code.
    pub const CODE_ERROR: i32 = 500;

    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self::ok_with_message("success", data)
    }

    /// A successful response with a custom message.
    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: Self::CODE_OK,
            message: message.into(),
            data: Some(data),
            success: true,
        }
    }

    /// A failed response with the generic failure code.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::fail_with_code(Self::CODE_ERROR, message)
    }

    /// A failed response with an explicit code.
    pub fn fail_with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            success: false,
        }
    }

    /// Returns `true` if this is a success response.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Converts into a `Result`, using the message as the error.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.message)
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
