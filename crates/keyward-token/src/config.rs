//! Token configuration: the signing key ring and token lifetimes.
//!
//! [`TokenConfig`] has no `Default`: the signing secret must come from
//! the deployment's configuration, never from a literal in the binary.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::SigningError;

/// One versioned HMAC secret.
///
/// The `id` is written into the `kid` header of every token signed with
/// this key, which is what lets old tokens keep verifying after the
/// active key is rotated.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    id: String,
    secret: Vec<u8>,
}

impl SigningKey {
    /// Minimum secret length in bytes (HS256 uses a 256-bit key).
    pub const MIN_SECRET_LEN: usize = 32;

    /// Builds a key, rejecting empty ids and short secrets.
    pub fn new(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, SigningError> {
        let id = id.into();
        let secret = secret.into();
        if id.is_empty() {
            return Err(SigningError::EmptyKeyId);
        }
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(SigningError::SecretTooShort {
                id,
                len: secret.len(),
                min: Self::MIN_SECRET_LEN,
            });
        }
        Ok(Self { id, secret })
    }

    /// The key version written into token headers.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }
}

/// Never prints the secret.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Everything the token codec needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Key used to sign new tokens (and to verify tokens carrying its id).
    pub active_key: SigningKey,

    /// Retired keys still accepted for verification until the tokens
    /// they signed have expired.
    pub previous_keys: Vec<SigningKey>,

    /// Access token lifetime. Default: 24 hours.
    pub access_ttl: Duration,

    /// Refresh token lifetime. Default: 7 days.
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Default access token lifetime (86 400 s).
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    /// Default refresh token lifetime (604 800 s).
    pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// A config with the given active key and default lifetimes.
    pub fn new(active_key: SigningKey) -> Self {
        Self {
            active_key,
            previous_keys: Vec::new(),
            access_ttl: Self::DEFAULT_ACCESS_TTL,
            refresh_ttl: Self::DEFAULT_REFRESH_TTL,
        }
    }

    /// Adds a verification-only key.
    pub fn with_previous_key(mut self, key: SigningKey) -> Self {
        self.previous_keys.push(key);
        self
    }

    /// Clamp lifetimes so the config is safe to use.
    ///
    /// Called automatically by [`TokenCodec::new`](crate::TokenCodec::new).
    /// Rules:
    /// - lifetimes are at least one second (tokens carry whole seconds);
    /// - `refresh_ttl` is at least `access_ttl`.
    pub fn validated(mut self) -> Self {
        let one_sec = Duration::from_secs(1);
        if self.access_ttl < one_sec {
            warn!(ttl = ?self.access_ttl, "access_ttl below one second, clamping");
            self.access_ttl = one_sec;
        }
        if self.refresh_ttl < self.access_ttl {
            warn!(
                refresh = ?self.refresh_ttl,
                access = ?self.access_ttl,
                "refresh_ttl shorter than access_ttl, raising it"
            );
            self.refresh_ttl = self.access_ttl;
        }
        self
    }

    /// Checks that key ids are unique across the ring.
    pub(crate) fn check_key_ids(&self) -> Result<(), SigningError> {
        let mut seen = HashSet::new();
        for key in std::iter::once(&self.active_key).chain(&self.previous_keys) {
            if !seen.insert(key.id()) {
                return Err(SigningError::DuplicateKeyId(key.id().to_string()));
            }
        }
        Ok(())
    }
}
