//! Authority side of the exchange
//!
//! This is what the operator's tooling runs with access to the authority's
//! static private key: parse the challenge read off the device, redo the
//! key exchange from the other end and produce the authcode to type back.

use thiserror::Error;

use crate::auth::{derive_authcode, Authcode, ServerKey};
use crate::challenge::{ChallengeRecord, CHALLENGE_VERSION};
use crate::crypto::{x25519, x25519_public_key, HmacSha256, PrivateScalar, KEY_SIZE};
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The text is not a well-formed challenge.
    #[error("malformed challenge: {0}")]
    Malformed(#[from] CodecError),

    /// The challenge was produced by a protocol version we do not speak.
    #[error("unsupported challenge version {0}")]
    UnsupportedVersion(u8),

    /// The device expects a different authority key.
    #[error("challenge is for key id {actual}, this key is {expected}")]
    KeyIdMismatch { expected: u8, actual: u8 },
}

/// The authority's static key pair
pub struct AuthorityKey {
    private: PrivateScalar,
    key_id: u8,
}

impl AuthorityKey {
    pub fn from_bytes(private: [u8; KEY_SIZE], key_id: u8) -> Self {
        Self {
            private: PrivateScalar::from_bytes(private),
            key_id: key_id & 0x0f,
        }
    }

    /// Public half and id, as configured on devices
    pub fn server_key(&self) -> ServerKey {
        ServerKey {
            public_key: x25519_public_key(&self.private),
            key_id: self.key_id,
        }
    }

    /// Compute the authcode answering `challenge_text`.
    pub fn respond(&self, challenge_text: &[u8]) -> Result<Authcode, AuthorityError> {
        let record = ChallengeRecord::decode_text(challenge_text.trim_ascii())?;

        if record.version() != CHALLENGE_VERSION {
            return Err(AuthorityError::UnsupportedVersion(record.version()));
        }
        if record.key_id() != self.key_id {
            return Err(AuthorityError::KeyIdMismatch {
                expected: self.key_id,
                actual: record.key_id(),
            });
        }

        let bytes = record.to_bytes()?;
        let shared = x25519(&self.private, &record.ephemeral_public_key);
        Ok(derive_authcode(&HmacSha256, &shared, &bytes)?)
    }
}

impl std::fmt::Debug for AuthorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
