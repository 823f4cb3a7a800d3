//! RMA authorization: challenge creation and authcode verification
//!
//! # Protocol
//!
//! 1. The operator asks for a challenge. The device builds a record of its
//!    board id, device id and a fresh ephemeral X25519 public key and shows
//!    it as base32 text.
//! 2. The operator relays the text to the authority, which holds the static
//!    private key matching the device's configured public key. Both sides
//!    derive the same shared secret and from it the same 8-character
//!    authcode.
//! 3. The operator types the authcode back. The device allows
//!    [`MAX_AUTHCODE_TRIES`] attempts per challenge and honours a correct
//!    code exactly once.
//!
//! No network link is needed at any point; the device never reveals the
//! authcode.
//!
//! # Concurrency
//!
//! [`RmaAuth`] owns the single [`ProtocolState`] behind a mutex. Every
//! operation runs to completion under the lock, so a decrement and the wipe
//! that may follow it can never interleave with another request.

mod generator;
mod state;
mod verifier;

use std::sync::Mutex;

use log::debug;

pub use generator::{derive_authcode, ServerKey};
pub use state::{
    Authcode, ProtocolState, VerifierState, AUTHCODE_CHARS, CHALLENGE_INTERVAL_US,
    MAX_AUTHCODE_TRIES,
};

use crate::challenge::CHALLENGE_CHARS;
use crate::clock::MonotonicClock;
use crate::crypto::{HmacSha256, KeyExchange, Mac};
use crate::error::{RmaError, RmaResult};
use crate::identity::DeviceIdentity;
use generator::Generator;

/// Challenge text as handed to the transport
pub type ChallengeText = heapless::String<CHALLENGE_CHARS>;

/// Tunables that are not part of the wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub challenge_interval_us: u64,
    pub max_tries: u8,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            challenge_interval_us: CHALLENGE_INTERVAL_US,
            max_tries: MAX_AUTHCODE_TRIES,
        }
    }
}

struct Inner<K> {
    state: ProtocolState,
    kex: K,
}

/// The protocol endpoint on the device
pub struct RmaAuth<K, I, C, M = HmacSha256> {
    inner: Mutex<Inner<K>>,
    identity: I,
    clock: C,
    mac: M,
    server: ServerKey,
    limits: Limits,
}

impl<K, I, C> RmaAuth<K, I, C, HmacSha256>
where
    K: KeyExchange,
    I: DeviceIdentity,
    C: MonotonicClock,
{
    pub fn new(server: ServerKey, kex: K, identity: I, clock: C) -> Self {
        Self::with_parts(server, kex, identity, clock, HmacSha256, Limits::default())
    }
}

impl<K, I, C, M> RmaAuth<K, I, C, M>
where
    K: KeyExchange,
    I: DeviceIdentity,
    C: MonotonicClock,
    M: Mac,
{
    pub fn with_parts(
        server: ServerKey,
        kex: K,
        identity: I,
        clock: C,
        mac: M,
        limits: Limits,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ProtocolState::new(limits.challenge_interval_us),
                kex,
            }),
            identity,
            clock,
            mac,
            server,
            limits,
        }
    }

    /// Create a new challenge/authcode pair, replacing any previous one.
    pub fn create_challenge(&self) -> RmaResult<()> {
        let mut guard = self.inner.lock().map_err(|_| RmaError::Internal)?;
        self.create_locked(&mut guard)
    }

    /// Create a new challenge and return its text in one step.
    pub fn new_challenge(&self) -> RmaResult<ChallengeText> {
        let mut guard = self.inner.lock().map_err(|_| RmaError::Internal)?;
        self.create_locked(&mut guard)?;
        to_text(guard.state.challenge_text()).ok_or(RmaError::Internal)
    }

    /// The live challenge text, if any
    pub fn challenge(&self) -> Option<ChallengeText> {
        let guard = self.inner.lock().ok()?;
        let text = guard.state.challenge_text();
        if text.is_empty() {
            return None;
        }
        to_text(text)
    }

    /// Check an authcode typed by the operator.
    pub fn try_authcode(&self, candidate: &[u8; AUTHCODE_CHARS]) -> RmaResult<()> {
        let mut guard = self.inner.lock().map_err(|_| RmaError::AccessDenied)?;
        verifier::try_authcode(&mut guard.state, candidate)
    }

    pub fn verifier_state(&self) -> VerifierState {
        match self.inner.lock() {
            Ok(guard) => guard.state.verifier_state(),
            Err(_) => VerifierState::NoChallenge,
        }
    }

    pub fn server_key(&self) -> &ServerKey {
        &self.server
    }

    fn create_locked(&self, inner: &mut Inner<K>) -> RmaResult<()> {
        let now_us = self.clock.now_us();
        let Inner { state, kex } = inner;
        let mut generator = Generator {
            kex,
            mac: &self.mac,
            identity: &self.identity,
            server: &self.server,
            max_tries: self.limits.max_tries,
        };
        generator.create_challenge(state, now_us)
    }
}

fn to_text(bytes: &[u8]) -> Option<ChallengeText> {
    let text = core::str::from_utf8(bytes).ok()?;
    let mut out = ChallengeText::new();
    if out.push_str(text).is_err() {
        debug!("challenge text does not fit its buffer");
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::AuthorityKey;
    use crate::challenge::{ChallengeRecord, DEVICE_ID_SIZE};
    use crate::clock::ManualClock;
    use crate::crypto::{HmacSha256, X25519KeyExchange};
    use crate::entropy::HardwareRng;
    use crate::identity::StaticIdentity;

    const AUTHORITY_PRIVATE: [u8; 32] = [
        0x47, 0x3a, 0x1f, 0x8c, 0x02, 0xd9, 0x6e, 0xb1, 0x55, 0x13, 0xc8, 0x7d, 0x90, 0x2e, 0x64,
        0xf3, 0x0b, 0xa7, 0x3c, 0xe1, 0x78, 0x4d, 0x92, 0x16, 0xbe, 0x05, 0x6a, 0xd2, 0x39, 0x81,
        0xcf, 0x24,
    ];
    const KEY_ID: u8 = 0x5;

    type TestAuth<'a> = RmaAuth<X25519KeyExchange<HardwareRng>, StaticIdentity, &'a ManualClock>;

    fn authority() -> AuthorityKey {
        AuthorityKey::from_bytes(AUTHORITY_PRIVATE, KEY_ID)
    }

    fn device<'a>(clock: &'a ManualClock, unique_id: &[u8]) -> TestAuth<'a> {
        RmaAuth::new(
            authority().server_key(),
            X25519KeyExchange::new(HardwareRng::new().unwrap()),
            StaticIdentity::new([0x01, 0x02, 0x03, 0x04], unique_id),
            clock,
        )
    }

    fn code_for(auth: &TestAuth<'_>) -> Authcode {
        let text = auth.challenge().unwrap();
        authority().respond(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_rate_limited_keeps_previous_pair() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0xaa; DEVICE_ID_SIZE]);

        auth.create_challenge().unwrap();
        let first = auth.challenge().unwrap();
        let code = code_for(&auth);

        clock.advance(CHALLENGE_INTERVAL_US - 1);
        assert_eq!(auth.create_challenge(), Err(RmaError::RateLimited));
        assert_eq!(auth.challenge().unwrap(), first);
        assert_eq!(
            auth.verifier_state(),
            VerifierState::Active { tries_left: 3 }
        );
        assert_eq!(auth.try_authcode(code.as_bytes()), Ok(()));
    }

    #[test]
    fn test_no_challenge_right_after_boot() {
        let clock = ManualClock::new(1_000);
        let auth = device(&clock, &[0xaa; DEVICE_ID_SIZE]);

        assert_eq!(auth.create_challenge(), Err(RmaError::RateLimited));
        assert!(auth.challenge().is_none());
        assert_eq!(auth.verifier_state(), VerifierState::NoChallenge);

        clock.set(CHALLENGE_INTERVAL_US - 1);
        assert_eq!(auth.create_challenge(), Err(RmaError::RateLimited));

        // A reboot restarts the clock and the gate together.
        let clock = ManualClock::new(0);
        let rebooted = device(&clock, &[0xaa; DEVICE_ID_SIZE]);
        assert_eq!(rebooted.create_challenge(), Err(RmaError::RateLimited));
        clock.set(CHALLENGE_INTERVAL_US);
        assert_eq!(rebooted.create_challenge(), Ok(()));
    }

    #[test]
    fn test_rate_limit_counts_from_last_creation() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0xaa; DEVICE_ID_SIZE]);

        auth.create_challenge().unwrap();
        clock.advance(CHALLENGE_INTERVAL_US / 2);
        assert_eq!(auth.create_challenge(), Err(RmaError::RateLimited));

        // The refused request did not push the window out.
        clock.advance(CHALLENGE_INTERVAL_US / 2);
        assert_eq!(auth.create_challenge(), Ok(()));
    }

    #[test]
    fn test_challenge_text_decodes_to_generated_record() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0xaa, 0xbb, 0xcc, 0xdd]);

        let text = auth.new_challenge().unwrap();
        let record = ChallengeRecord::decode_text(text.as_bytes()).unwrap();

        assert_eq!(record.version(), crate::challenge::CHALLENGE_VERSION);
        assert_eq!(record.key_id(), KEY_ID);
        assert_eq!(record.board_id, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(record.device_id, [0xaa, 0xbb, 0xcc, 0xdd, 0, 0, 0, 0]);
        assert_ne!(record.ephemeral_public_key, [0u8; 32]);
    }

    #[test]
    fn test_correct_code_succeeds_exactly_once() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0xaa; DEVICE_ID_SIZE]);
        auth.create_challenge().unwrap();
        let code = code_for(&auth);

        assert_eq!(auth.try_authcode(code.as_bytes()), Ok(()));
        assert_eq!(
            auth.try_authcode(code.as_bytes()),
            Err(RmaError::AccessDenied)
        );
        assert_eq!(auth.verifier_state(), VerifierState::Locked);
        assert!(auth.challenge().is_none());
    }

    #[test]
    fn test_wrong_codes_lock_out_correct_code() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0xaa; DEVICE_ID_SIZE]);
        auth.create_challenge().unwrap();
        let code = code_for(&auth);

        let mut wrong = *code.as_bytes();
        wrong[0] = if wrong[0] == b'A' { b'B' } else { b'A' };

        for _ in 0..MAX_AUTHCODE_TRIES {
            assert_eq!(auth.try_authcode(&wrong), Err(RmaError::AccessDenied));
        }
        assert_eq!(
            auth.try_authcode(code.as_bytes()),
            Err(RmaError::AccessDenied)
        );
        assert!(auth.challenge().is_none());
        assert_eq!(auth.verifier_state(), VerifierState::Locked);
    }

    #[test]
    fn test_long_device_id_fingerprint_is_stable() {
        let long_id: Vec<u8> = (0u8..16).collect();
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &long_id);

        let first = ChallengeRecord::decode_text(auth.new_challenge().unwrap().as_bytes()).unwrap();
        clock.advance(CHALLENGE_INTERVAL_US);
        let second =
            ChallengeRecord::decode_text(auth.new_challenge().unwrap().as_bytes()).unwrap();

        assert_eq!(first.device_id, second.device_id);
        assert_ne!(first.ephemeral_public_key, second.ephemeral_public_key);
        assert_eq!(
            first.device_id,
            crate::challenge::device_id_field(&long_id, &HmacSha256)
        );
    }

    #[test]
    fn test_new_challenge_supersedes_old_one() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0x10; DEVICE_ID_SIZE]);

        let first_text = auth.new_challenge().unwrap();
        let first_code = code_for(&auth);

        clock.advance(CHALLENGE_INTERVAL_US);
        let second_text = auth.new_challenge().unwrap();
        let second_code = code_for(&auth);

        assert_ne!(first_text, second_text);
        let first = ChallengeRecord::decode_text(first_text.as_bytes()).unwrap();
        let second = ChallengeRecord::decode_text(second_text.as_bytes()).unwrap();
        assert_ne!(first.ephemeral_public_key, second.ephemeral_public_key);

        if first_code != second_code {
            assert_eq!(
                auth.try_authcode(first_code.as_bytes()),
                Err(RmaError::AccessDenied)
            );
        }
        assert_eq!(auth.try_authcode(second_code.as_bytes()), Ok(()));
    }

    #[test]
    fn test_server_key_is_the_configured_one() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0x10; DEVICE_ID_SIZE]);
        assert_eq!(auth.server_key(), &authority().server_key());
    }

    #[test]
    fn test_no_challenge_denies_everything() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = device(&clock, &[0x10; DEVICE_ID_SIZE]);
        assert_eq!(auth.verifier_state(), VerifierState::NoChallenge);
        assert_eq!(auth.try_authcode(b"AAAAAAAA"), Err(RmaError::AccessDenied));
        assert!(auth.challenge().is_none());
    }

    #[test]
    fn test_unprovisioned_board_is_internal_error() {
        let clock = ManualClock::new(CHALLENGE_INTERVAL_US);
        let auth = RmaAuth::new(
            authority().server_key(),
            X25519KeyExchange::new(HardwareRng::new().unwrap()),
            StaticIdentity::unprovisioned([1u8; 4]),
            &clock,
        );
        assert_eq!(auth.create_challenge(), Err(RmaError::Internal));
        assert!(auth.challenge().is_none());
        assert_eq!(auth.try_authcode(b"AAAAAAAA"), Err(RmaError::AccessDenied));
    }
}
