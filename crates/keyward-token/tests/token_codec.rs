//! Integration tests for the token codec: expiry under an injected
//! clock, tampering, and signing-key rotation.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keyward_protocol::{Timestamp, UserId};
use keyward_token::{ManualClock, SigningKey, TokenCodec, TokenConfig, TokenError, TokenType};

// =========================================================================
// Helpers
// =========================================================================

const OLD_SECRET: &[u8] = b"old-secret-old-secret-old-secret";
const NEW_SECRET: &[u8] = b"new-secret-new-secret-new-secret";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000)))
}

fn key(id: &str, secret: &[u8]) -> SigningKey {
    SigningKey::new(id, secret).unwrap()
}

fn codec(config: TokenConfig, clock: &Arc<ManualClock>) -> TokenCodec {
    TokenCodec::new(config, clock.clone()).unwrap()
}

/// Rewrites the payload segment of a token, keeping the original signature.
fn with_payload(token: &str, edit: impl FnOnce(&mut serde_json::Value)) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    let mut payload: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    edit(&mut payload);
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    format!("{}.{}.{}", parts[0], encoded, parts[2])
}

// =========================================================================
// Expiry
// =========================================================================

#[test]
fn test_access_token_expires_after_24h_on_injected_clock() {
    let clock = clock();
    let codec = codec(TokenConfig::new(key("v1", NEW_SECRET)), &clock);
    let token = codec.issue_access_token(UserId(42), "alice").unwrap();
    assert!(codec.validate(&token));

    clock.advance(Duration::from_secs(24 * 60 * 60 + 1));

    assert!(!codec.validate(&token));
    assert_eq!(codec.parse(&token), Err(TokenError::Expired));
}

#[test]
fn test_refresh_token_outlives_access_token() {
    let clock = clock();
    let codec = codec(TokenConfig::new(key("v1", NEW_SECRET)), &clock);
    let access = codec.issue_access_token(UserId(1), "a").unwrap();
    let refresh = codec.issue_refresh_token(UserId(1)).unwrap();

    clock.advance(Duration::from_secs(2 * 24 * 60 * 60));

    assert_eq!(codec.parse(&access), Err(TokenError::Expired));
    assert_eq!(
        codec.parse_as(&refresh, TokenType::Refresh).unwrap().user_id,
        UserId(1)
    );
}

#[test]
fn test_custom_ttls_are_honored() {
    let clock = clock();
    let mut config = TokenConfig::new(key("v1", NEW_SECRET));
    config.access_ttl = Duration::from_secs(60);
    config.refresh_ttl = Duration::from_secs(120);
    let codec = codec(config, &clock);

    let token = codec.issue_access_token(UserId(1), "a").unwrap();
    clock.advance(Duration::from_secs(60));

    assert_eq!(codec.parse(&token), Err(TokenError::Expired));
    assert_eq!(codec.access_ttl(), Duration::from_secs(60));
}

// =========================================================================
// Tampering
// =========================================================================

#[test]
fn test_tampered_subject_is_invalid_signature() {
    let clock = clock();
    let codec = codec(TokenConfig::new(key("v1", NEW_SECRET)), &clock);
    let token = codec.issue_access_token(UserId(42), "alice").unwrap();

    let forged = with_payload(&token, |p| p["sub"] = "1".into());

    assert_eq!(codec.parse(&forged), Err(TokenError::InvalidSignature));
}

#[test]
fn test_tampered_expiry_is_invalid_signature_not_expired() {
    // Pushing `exp` forward must not produce a usable token.
    let clock = clock();
    let codec = codec(TokenConfig::new(key("v1", NEW_SECRET)), &clock);
    let token = codec.issue_access_token(UserId(42), "alice").unwrap();

    let forged = with_payload(&token, |p| p["exp"] = u64::MAX.into());

    assert_eq!(codec.parse(&forged), Err(TokenError::InvalidSignature));
}

#[test]
fn test_truncated_signature_is_rejected() {
    let clock = clock();
    let codec = codec(TokenConfig::new(key("v1", NEW_SECRET)), &clock);
    let token = codec.issue_access_token(UserId(42), "alice").unwrap();

    let truncated = &token[..token.len() - 4];

    assert!(codec.parse(truncated).is_err());
}

// =========================================================================
// Key rotation
// =========================================================================

#[test]
fn test_token_signed_with_previous_key_still_verifies() {
    let clock = clock();
    let before = codec(TokenConfig::new(key("v1", OLD_SECRET)), &clock);
    let token = before.issue_access_token(UserId(5), "eve").unwrap();

    let after = codec(
        TokenConfig::new(key("v2", NEW_SECRET)).with_previous_key(key("v1", OLD_SECRET)),
        &clock,
    );

    assert_eq!(after.parse(&token).unwrap().user_id, UserId(5));
    assert_eq!(after.active_key_id(), "v2");
}

#[test]
fn test_token_from_retired_key_fails_once_key_removed() {
    let clock = clock();
    let before = codec(TokenConfig::new(key("v1", OLD_SECRET)), &clock);
    let token = before.issue_access_token(UserId(5), "eve").unwrap();

    let after = codec(TokenConfig::new(key("v2", NEW_SECRET)), &clock);

    assert_eq!(after.parse(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn test_new_tokens_use_active_key_only() {
    let clock = clock();
    let rotated = codec(
        TokenConfig::new(key("v2", NEW_SECRET)).with_previous_key(key("v1", OLD_SECRET)),
        &clock,
    );
    let token = rotated.issue_refresh_token(UserId(9)).unwrap();

    let new_only = codec(TokenConfig::new(key("v2", NEW_SECRET)), &clock);

    assert!(new_only.validate(&token));
}

#[test]
fn test_duplicate_key_ids_are_rejected() {
    let clock = clock();
    let result = TokenCodec::new(
        TokenConfig::new(key("v1", NEW_SECRET)).with_previous_key(key("v1", OLD_SECRET)),
        clock.clone(),
    );
    assert!(result.is_err());
}
