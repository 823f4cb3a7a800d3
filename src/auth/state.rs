//! Protocol state: the one live challenge/authcode pair and its budget

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::challenge::CHALLENGE_CHARS;
use crate::cooldown::Cooldown;

/// Length of the authcode the operator types back
pub const AUTHCODE_CHARS: usize = 8;

/// Number of tries to properly enter the authcode
pub const MAX_AUTHCODE_TRIES: u8 = 3;

/// Minimum time between challenge creations (10 seconds)
pub const CHALLENGE_INTERVAL_US: u64 = 10 * 1_000_000;

/// Externally visible verifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    /// No authcode has been generated, or it was wiped
    NoChallenge,
    /// An authcode is live and has tries left
    Active { tries_left: u8 },
    /// The last authcode was redeemed or exhausted
    Locked,
}

/// An authcode as typed by the operator
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Authcode([u8; AUTHCODE_CHARS]);

impl Authcode {
    pub fn from_bytes(bytes: [u8; AUTHCODE_CHARS]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; AUTHCODE_CHARS] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from base32 output or checked input
        core::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl std::fmt::Debug for Authcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Authcode").field(&self.as_str()).finish()
    }
}

/// Fixed-capacity text buffer, zeroized on clear
#[derive(Zeroize)]
pub(crate) struct TextBuf<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> TextBuf<N> {
    pub(crate) fn new() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The whole buffer, including unused tail
    pub(crate) fn as_array(&self) -> &[u8; N] {
        &self.bytes
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replace the contents with whatever `write` produces.
    ///
    /// `write` gets the whole buffer and returns the length it wrote. On
    /// error the buffer is left zeroized.
    pub(crate) fn fill_with<E>(
        &mut self,
        write: impl FnOnce(&mut [u8; N]) -> Result<usize, E>,
    ) -> Result<(), E> {
        self.zeroize();
        match write(&mut self.bytes) {
            Ok(len) => {
                self.len = len.min(N);
                Ok(())
            }
            Err(err) => {
                self.zeroize();
                Err(err)
            }
        }
    }
}

/// The only mutable state of the protocol
pub struct ProtocolState {
    pub(crate) challenge: TextBuf<CHALLENGE_CHARS>,
    pub(crate) authcode: TextBuf<AUTHCODE_CHARS>,
    pub(crate) tries_left: u8,
    pub(crate) locked: bool,
    pub(crate) cooldown: Cooldown,
}

impl ProtocolState {
    pub fn new(challenge_interval_us: u64) -> Self {
        Self {
            challenge: TextBuf::new(),
            authcode: TextBuf::new(),
            tries_left: 0,
            locked: false,
            cooldown: Cooldown::new(challenge_interval_us),
        }
    }

    /// Drop the live challenge and authcode, if any
    pub fn wipe(&mut self) {
        self.challenge.zeroize();
        self.authcode.zeroize();
        self.tries_left = 0;
    }

    /// Wipe after redemption or exhaustion
    pub(crate) fn lock(&mut self) {
        self.wipe();
        self.locked = true;
    }

    pub fn verifier_state(&self) -> VerifierState {
        if self.tries_left > 0 && !self.authcode.is_empty() {
            VerifierState::Active {
                tries_left: self.tries_left,
            }
        } else if self.locked {
            VerifierState::Locked
        } else {
            VerifierState::NoChallenge
        }
    }

    pub fn tries_left(&self) -> u8 {
        self.tries_left
    }

    pub fn challenge_text(&self) -> &[u8] {
        self.challenge.as_bytes()
    }

    pub fn authcode_text(&self) -> &[u8] {
        self.authcode.as_bytes()
    }
}

impl Drop for ProtocolState {
    fn drop(&mut self) {
        self.wipe();
    }
}
