//! The token codec: issues and verifies HS256-signed access and refresh
//! tokens.
//!
//! Wire format is a compact JWS (`header.payload.signature`):
//!
//! ```text
//! header:  { "alg": "HS256", "typ": "JWT", "kid": "v2" }
//! payload: { "sub": "42", "username": "alice", "type": "access",
//!            "iat": 1700000000, "exp": 1700086400, "jti": "9f..." }
//! ```
//!
//! Refresh tokens omit `username`. `jti` is random per token so two
//! tokens minted for the same user in the same second still differ,
//! which refresh-token rotation relies on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keyward_protocol::UserId;
use serde::{Deserialize, Serialize};

use crate::{Clock, SigningError, TokenConfig, TokenError, random_id};

/// Which half of the token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token exchanged for a new pair.
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// The verified contents of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The subject (`sub`).
    pub user_id: UserId,
    /// Present on access tokens only.
    pub username: Option<String>,
    pub token_type: TokenType,
    /// `iat`, unix seconds.
    pub issued_at: u64,
    /// `exp`, unix seconds.
    pub expires_at: u64,
    /// `jti`; empty for tokens minted without one.
    pub token_id: String,
}

/// JSON payload as it appears on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(rename = "type")]
    token_type: TokenType,
    iat: u64,
    exp: u64,
    #[serde(default)]
    jti: String,
}

/// Issues and verifies tokens with a fixed key ring and fixed lifetimes.
///
/// Holds no mutable state: the keys and TTLs are set at construction and
/// the only input that varies between calls is the injected clock. Cheap
/// to share behind an `Arc`.
pub struct TokenCodec {
    active_kid: String,
    encoding_key: EncodingKey,
    decoding_keys: HashMap<String, DecodingKey>,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Builds a codec from a validated copy of `config`.
    ///
    /// # Errors
    /// [`SigningError::DuplicateKeyId`] if two keys in the ring share an id.
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, SigningError> {
        let config = config.validated();
        config.check_key_ids()?;

        let decoding_keys = std::iter::once(&config.active_key)
            .chain(&config.previous_keys)
            .map(|key| (key.id().to_string(), DecodingKey::from_secret(key.secret())))
            .collect();

        // Expiry is checked against the injected clock after decoding,
        // so the library's own system-clock check is turned off.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        tracing::debug!(
            active_kid = config.active_key.id(),
            verification_keys = config.previous_keys.len() + 1,
            access_ttl_secs = config.access_ttl.as_secs(),
            refresh_ttl_secs = config.refresh_ttl.as_secs(),
            "token codec created"
        );

        Ok(Self {
            active_kid: config.active_key.id().to_string(),
            encoding_key: EncodingKey::from_secret(config.active_key.secret()),
            decoding_keys,
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            clock,
        })
    }

    /// Issues an access token for `user_id`, valid for the access TTL.
    pub fn issue_access_token(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<String, SigningError> {
        self.issue(user_id, Some(username), TokenType::Access, self.access_ttl)
    }

    /// Issues a refresh token for `user_id`, valid for the refresh TTL.
    /// Carries no username.
    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<String, SigningError> {
        self.issue(user_id, None, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: UserId,
        username: Option<&str>,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, SigningError> {
        let iat = self.clock.now().as_secs();
        let claims = WireClaims {
            sub: user_id.to_string(),
            username: username.map(str::to_string),
            token_type,
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
            jti: random_id(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.active_kid.clone());

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| SigningError::Encode(e.to_string()))
    }

    /// Decodes and verifies a token.
    ///
    /// The key is chosen by the header's `kid`; tokens without one are
    /// checked against the active key. A token is expired once
    /// `now >= exp`.
    ///
    /// # Errors
    /// - [`TokenError::Malformed`] for anything that is not a well-formed token
    /// - [`TokenError::InvalidSignature`] for a signature no known key verifies
    /// - [`TokenError::Expired`] for a verified token past its `exp`
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(classify)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::InvalidSignature);
        }

        let kid = header.kid.as_deref().unwrap_or(&self.active_kid);
        let key = self
            .decoding_keys
            .get(kid)
            .ok_or(TokenError::InvalidSignature)?;

        let wire = jsonwebtoken::decode::<WireClaims>(token, key, &self.validation)
            .map_err(classify)?
            .claims;

        let user_id = wire.sub.parse::<u64>().map(UserId).map_err(|_| {
            TokenError::Malformed(format!("subject {:?} is not a user id", wire.sub))
        })?;

        if self.clock.now().as_secs() >= wire.exp {
            return Err(TokenError::Expired);
        }

        Ok(Claims {
            user_id,
            username: wire.username,
            token_type: wire.token_type,
            issued_at: wire.iat,
            expires_at: wire.exp,
            token_id: wire.jti,
        })
    }

    /// [`parse`](Self::parse), additionally requiring a specific token
    /// type. A token of the other type is [`TokenError::Malformed`].
    pub fn parse_as(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.parse(token)?;
        if claims.token_type != expected {
            return Err(TokenError::Malformed(format!(
                "expected {expected} token, got {}",
                claims.token_type
            )));
        }
        Ok(claims)
    }

    /// `true` iff [`parse`](Self::parse) succeeds.
    pub fn validate(&self, token: &str) -> bool {
        self.parse(token).is_ok()
    }

    /// Lifetime of access tokens.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Lifetime of refresh tokens.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Id of the key new tokens are signed with.
    pub fn active_key_id(&self) -> &str {
        &self.active_kid
    }

    /// The clock this codec reads.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("active_kid", &self.active_kid)
            .field("verification_keys", &self.decoding_keys.len())
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// Maps a decoder error onto a [`TokenError`] kind.
fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}

// =========================================================================
// Tests
// =========================================================================
