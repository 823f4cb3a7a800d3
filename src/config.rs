//! Device configuration
//!
//! The authority public key and key id are fixed per deployment; the board
//! id is per product. All of them arrive as strings (environment on host,
//! build-time environment on device) and are validated here once.

use thiserror::Error;

use crate::auth::{Limits, ServerKey};
use crate::crypto::KEY_SIZE;
use crate::identity::BOARD_ID_SIZE;

pub const ENV_SERVER_PUBLIC_KEY: &str = "RMA_AUTH_SERVER_PUBLIC_KEY";
pub const ENV_SERVER_KEY_ID: &str = "RMA_AUTH_SERVER_KEY_ID";
pub const ENV_BOARD_ID: &str = "RMA_AUTH_BOARD_ID";
pub const ENV_DEVICE_ID: &str = "RMA_AUTH_DEVICE_ID";
pub const ENV_CHALLENGE_INTERVAL_MS: &str = "RMA_AUTH_CHALLENGE_INTERVAL_MS";
pub const ENV_MAX_TRIES: &str = "RMA_AUTH_MAX_TRIES";

/// Largest key id that fits the challenge's key id nibble
pub const MAX_KEY_ID: u8 = 0x0f;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerKey,
    /// Unset means the board was never provisioned
    pub board_id: Option<[u8; BOARD_ID_SIZE]>,
    /// Overrides the platform unique id
    pub device_id: Option<Vec<u8>>,
    pub limits: Limits,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let public_key = lookup(ENV_SERVER_PUBLIC_KEY)
            .ok_or(ConfigError::Missing(ENV_SERVER_PUBLIC_KEY))?;
        let public_key: [u8; KEY_SIZE] = parse_hex_array(ENV_SERVER_PUBLIC_KEY, &public_key)?;

        let key_id = match lookup(ENV_SERVER_KEY_ID) {
            Some(raw) => parse_number::<u8>(ENV_SERVER_KEY_ID, &raw)?,
            None => 0,
        };
        if key_id > MAX_KEY_ID {
            return Err(invalid(
                ENV_SERVER_KEY_ID,
                format!("{key_id} does not fit in 4 bits"),
            ));
        }

        let board_id = lookup(ENV_BOARD_ID)
            .map(|raw| parse_hex_array(ENV_BOARD_ID, &raw))
            .transpose()?;

        let device_id = lookup(ENV_DEVICE_ID)
            .map(|raw| parse_hex(ENV_DEVICE_ID, &raw))
            .transpose()?;
        if device_id.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid(ENV_DEVICE_ID, "must not be empty".into()));
        }

        let mut limits = Limits::default();
        if let Some(raw) = lookup(ENV_CHALLENGE_INTERVAL_MS) {
            let ms = parse_number::<u64>(ENV_CHALLENGE_INTERVAL_MS, &raw)?;
            limits.challenge_interval_us = ms
                .checked_mul(1_000)
                .ok_or_else(|| invalid(ENV_CHALLENGE_INTERVAL_MS, "too large".into()))?;
        }
        if let Some(raw) = lookup(ENV_MAX_TRIES) {
            limits.max_tries = parse_number::<u8>(ENV_MAX_TRIES, &raw)?;
            if limits.max_tries == 0 {
                return Err(invalid(ENV_MAX_TRIES, "must be at least 1".into()));
            }
        }

        Ok(Self {
            server: ServerKey { public_key, key_id },
            board_id,
            device_id,
            limits,
        })
    }
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { key, reason }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, e.to_string()))
}

fn parse_hex_array<const N: usize>(key: &'static str, raw: &str) -> Result<[u8; N], ConfigError> {
    let bytes = parse_hex(key, raw)?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(key, format!("expected {N} bytes, got {}", b.len())))
}

/// Hex to bytes, tolerating `0x` prefix and whitespace or `:` separators
pub fn parse_hex(key: &'static str, raw: &str) -> Result<Vec<u8>, ConfigError> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    let digits: String = raw
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(digits).map_err(|e| invalid(key, e.to_string()))
}
