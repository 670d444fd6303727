//! Process configuration, read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `KEYWARD_SIGNING_KEY` | required, at least 32 bytes |
//! | `KEYWARD_SIGNING_KEY_ID` | `v1` |
//! | `KEYWARD_PREVIOUS_KEYS` | none; `id:secret,id:secret` |
//! | `KEYWARD_ACCESS_TTL_SECS` | `86400` |
//! | `KEYWARD_REFRESH_TTL_SECS` | `604800` |
//! | `KEYWARD_ROTATE_REFRESH_TOKENS` | `true` |
//! | `KEYWARD_BIND_REFRESH_TO_DEVICE` | `false` |
//! | `KEYWARD_SWEEP_INTERVAL_SECS` | `60` |
//! | `KEYWARD_SWEEP_BATCH_SIZE` | `500` |
//!
//! A value that is set but unparseable is an error, not a silent default.

use std::str::FromStr;
use std::time::Duration;

use keyward_session::SessionConfig;
use keyward_sweep::SweepConfig;
use keyward_token::{SigningError, SigningKey, TokenConfig};

pub const SIGNING_KEY: &str = "KEYWARD_SIGNING_KEY";
pub const SIGNING_KEY_ID: &str = "KEYWARD_SIGNING_KEY_ID";
pub const PREVIOUS_KEYS: &str = "KEYWARD_PREVIOUS_KEYS";
pub const ACCESS_TTL_SECS: &str = "KEYWARD_ACCESS_TTL_SECS";
pub const REFRESH_TTL_SECS: &str = "KEYWARD_REFRESH_TTL_SECS";
pub const ROTATE_REFRESH_TOKENS: &str = "KEYWARD_ROTATE_REFRESH_TOKENS";
pub const BIND_REFRESH_TO_DEVICE: &str = "KEYWARD_BIND_REFRESH_TO_DEVICE";
pub const SWEEP_INTERVAL_SECS: &str = "KEYWARD_SWEEP_INTERVAL_SECS";
pub const SWEEP_BATCH_SIZE: &str = "KEYWARD_SWEEP_BATCH_SIZE";

const DEFAULT_KEY_ID: &str = "v1";

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A variable is set to something unusable. `value` never holds
    /// key material.
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A signing key was rejected (too short, empty or duplicate id).
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Configuration for every layer.
#[derive(Debug, Clone)]
pub struct KeywardConfig {
    pub token: TokenConfig,
    pub session: SessionConfig,
    pub sweep: SweepConfig,
}

impl KeywardConfig {
    /// Defaults for everything except the key ring.
    pub fn new(token: TokenConfig) -> Self {
        Self {
            token,
            session: SessionConfig::default(),
            sweep: SweepConfig::default(),
        }
    }

    /// Reads the process environment. Binaries load `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns the value of a
    /// variable or `None` if unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup(SIGNING_KEY)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(SIGNING_KEY))?;
        let key_id = lookup(SIGNING_KEY_ID)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_KEY_ID.to_string());

        let mut token = TokenConfig::new(SigningKey::new(key_id, secret.into_bytes())?);
        if let Some(raw) = lookup(PREVIOUS_KEYS) {
            for key in parse_previous_keys(&raw)? {
                token = token.with_previous_key(key);
            }
        }
        if let Some(secs) = parse::<u64>(&lookup, ACCESS_TTL_SECS, "a whole number of seconds")? {
            token.access_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, REFRESH_TTL_SECS, "a whole number of seconds")? {
            token.refresh_ttl = Duration::from_secs(secs);
        }

        let mut session = SessionConfig::default();
        if let Some(on) = parse_bool(&lookup, ROTATE_REFRESH_TOKENS)? {
            session.rotate_refresh_tokens = on;
        }
        if let Some(on) = parse_bool(&lookup, BIND_REFRESH_TO_DEVICE)? {
            session.bind_refresh_to_device = on;
        }

        let mut sweep = SweepConfig::default();
        if let Some(secs) = parse::<u64>(&lookup, SWEEP_INTERVAL_SECS, "a whole number of seconds")? {
            sweep.interval = Duration::from_secs(secs);
        }
        if let Some(size) = parse::<usize>(&lookup, SWEEP_BATCH_SIZE, "a positive integer")? {
            sweep.batch_size = size;
            session.sweep_batch_size = size;
        }

        Ok(Self {
            token: token.validated(),
            session: session.validated(),
            sweep: sweep.validated(),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            expected,
        })
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            expected: "true or false",
        }),
    }
}

/// Parses `id:secret,id:secret`. Blank entries are skipped.
fn parse_previous_keys(raw: &str) -> Result<Vec<SigningKey>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, secret) = entry.split_once(':').ok_or(ConfigError::Invalid {
                key: PREVIOUS_KEYS,
                value: "<redacted>".to_string(),
                expected: "comma-separated id:secret pairs",
            })?;
            Ok(SigningKey::new(id.trim(), secret.as_bytes().to_vec())?)
        })
        .collect()
}
