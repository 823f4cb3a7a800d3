//! Challenge record layout
//!
//! The record is what the operator reads off the device console and feeds
//! to the authority's tooling, so its byte layout is fixed:
//!
//! | offset | size | field                                         |
//! |--------|------|-----------------------------------------------|
//! | 0      | 1    | version (high nibble), authority key id (low) |
//! | 1      | 4    | board id                                      |
//! | 5      | 8    | device id or its fingerprint                  |
//! | 13     | 32   | ephemeral X25519 public key                   |
//!
//! Serialized with postcard: bytes and fixed-size arrays carry no tag or
//! length prefix, so the derive yields exactly this layout.

use serde::{Deserialize, Serialize};

use crate::base32;
use crate::crypto::{Mac, KEY_SIZE};
use crate::error::CodecError;
use crate::identity::BOARD_ID_SIZE;

/// Protocol version carried in the high nibble of the first byte
pub const CHALLENGE_VERSION: u8 = 0;

/// Width of the device id field
pub const DEVICE_ID_SIZE: usize = 8;

/// Serialized record size
pub const RECORD_SIZE: usize = 1 + BOARD_ID_SIZE + DEVICE_ID_SIZE + KEY_SIZE;

/// Padding appended to the challenge text
pub const CHALLENGE_PAD_CHARS: usize = 8;

/// Base32 symbols carrying the record
pub const CHALLENGE_SYMBOLS: usize = (RECORD_SIZE * 8).div_ceil(5);

/// Length of the challenge text: 72 symbols plus padding
pub const CHALLENGE_CHARS: usize = CHALLENGE_SYMBOLS + CHALLENGE_PAD_CHARS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub version_key_id: u8,
    pub board_id: [u8; BOARD_ID_SIZE],
    pub device_id: [u8; DEVICE_ID_SIZE],
    pub ephemeral_public_key: [u8; KEY_SIZE],
}

/// Pack version and key id into one byte. Both are truncated to a nibble.
pub fn pack_version_key_id(version: u8, key_id: u8) -> u8 {
    ((version & 0x0f) << 4) | (key_id & 0x0f)
}

impl ChallengeRecord {
    pub fn version(&self) -> u8 {
        self.version_key_id >> 4
    }

    pub fn key_id(&self) -> u8 {
        self.version_key_id & 0x0f
    }

    pub fn to_bytes(&self) -> Result<[u8; RECORD_SIZE], CodecError> {
        let mut out = [0u8; RECORD_SIZE];
        let written = postcard::to_slice(self, &mut out).map_err(|_| CodecError::Layout)?;
        if written.len() != RECORD_SIZE {
            return Err(CodecError::Layout);
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Result<Self, CodecError> {
        postcard::from_bytes(bytes).map_err(|_| CodecError::Layout)
    }

    /// Render the record as challenge text into `dest`.
    ///
    /// Returns the number of characters written.
    pub fn encode_text(&self, dest: &mut [u8]) -> Result<usize, CodecError> {
        let bytes = self.to_bytes()?;
        base32::encode(dest, &bytes, RECORD_SIZE * 8, CHALLENGE_PAD_CHARS)
    }

    /// Parse challenge text as shown on the device console.
    ///
    /// Padding is optional, but the text must carry exactly the record's
    /// symbols.
    pub fn decode_text(text: &[u8]) -> Result<Self, CodecError> {
        let symbols = text
            .iter()
            .rposition(|&c| c != base32::PAD_CHAR)
            .map_or(0, |last| last + 1);
        if symbols != CHALLENGE_SYMBOLS {
            return Err(CodecError::SymbolCount {
                expected: CHALLENGE_SYMBOLS,
                actual: symbols,
            });
        }

        let mut bytes = [0u8; RECORD_SIZE];
        base32::decode(&mut bytes, text, RECORD_SIZE * 8)?;
        Self::from_bytes(&bytes)
    }
}

/// Fit a unique id of any length into the device id field.
///
/// Ids that fit are copied as-is (zero-filled on the right). Longer ids are
/// replaced by the leading bytes of a MAC keyed with the id itself. This
/// only shrinks the id deterministically; it protects nothing.
pub fn device_id_field<M: Mac + ?Sized>(unique_id: &[u8], mac: &M) -> [u8; DEVICE_ID_SIZE] {
    let mut field = [0u8; DEVICE_ID_SIZE];
    if unique_id.len() <= DEVICE_ID_SIZE {
        field[..unique_id.len()].copy_from_slice(unique_id);
    } else {
        let digest = mac.mac(unique_id, unique_id);
        field.copy_from_slice(&digest.as_bytes()[..DEVICE_ID_SIZE]);
    }
    field
}
