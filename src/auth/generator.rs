//! Challenge creation
//!
//! Each challenge carries a fresh ephemeral X25519 public key. The device
//! immediately computes the shared secret with the authority's static key,
//! derives the authcode from it and throws the private scalar away. Only the
//! authority, holding the static private key, can derive the same code from
//! the displayed challenge.

use log::{debug, info};
use thiserror::Error;
use zeroize::Zeroize;

use super::state::{Authcode, ProtocolState, AUTHCODE_CHARS};
use crate::base32;
use crate::challenge::{
    device_id_field, pack_version_key_id, ChallengeRecord, CHALLENGE_PAD_CHARS, CHALLENGE_VERSION,
    RECORD_SIZE,
};
use crate::crypto::{KeyExchange, Mac, SharedSecret, KEY_SIZE};
use crate::error::{CodecError, IdentityError, RmaError, RmaResult};
use crate::identity::DeviceIdentity;

/// The authority's static public key and the id it is published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKey {
    pub public_key: [u8; KEY_SIZE],
    /// Low nibble of the challenge's first byte
    pub key_id: u8,
}

/// Why a challenge could not be built. Logged, never returned.
#[derive(Debug, Error)]
enum BuildError {
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("encoding: {0}")]
    Codec(#[from] CodecError),
}

pub(crate) struct Generator<'a, K, M, I> {
    pub kex: &'a mut K,
    pub mac: &'a M,
    pub identity: &'a I,
    pub server: &'a ServerKey,
    pub max_tries: u8,
}

impl<K, M, I> Generator<'_, K, M, I>
where
    K: KeyExchange,
    M: Mac,
    I: DeviceIdentity,
{
    /// Replace whatever is in `state` with a new challenge/authcode pair.
    pub fn create_challenge(&mut self, state: &mut ProtocolState, now_us: u64) -> RmaResult<()> {
        if let Err(remaining_us) = state.cooldown.gate(now_us) {
            debug!("challenge refused, cooldown has {remaining_us}us left");
            return Err(RmaError::RateLimited);
        }

        // Clear the current challenge and authcode before anything can fail
        state.wipe();
        state.locked = false;

        match self.build(state) {
            Ok(()) => {
                state.tries_left = self.max_tries;
                info!(
                    "new challenge created (key id {}, {} tries)",
                    self.server.key_id, self.max_tries
                );
                Ok(())
            }
            Err(cause) => {
                state.wipe();
                debug!("challenge creation failed: {cause}");
                Err(RmaError::Internal)
            }
        }
    }

    fn build(&mut self, state: &mut ProtocolState) -> Result<(), BuildError> {
        let board_id = self.identity.board_id()?;
        let device_id = device_id_field(self.identity.unique_id(), self.mac);

        // The private half lives only in this scope and zeroizes on drop
        let keypair = self.kex.generate_keypair();

        let record = ChallengeRecord {
            version_key_id: pack_version_key_id(CHALLENGE_VERSION, self.server.key_id),
            board_id,
            device_id,
            ephemeral_public_key: keypair.public,
        };
        let bytes = record.to_bytes()?;

        state
            .challenge
            .fill_with(|dest| base32::encode(dest, &bytes, RECORD_SIZE * 8, CHALLENGE_PAD_CHARS))?;

        let shared = self.kex.shared_secret(&keypair.private, &self.server.public_key);
        let authcode = derive_authcode(self.mac, &shared, &bytes)?;

        state.authcode.fill_with(|dest| {
            dest.copy_from_slice(authcode.as_bytes());
            Ok::<_, CodecError>(AUTHCODE_CHARS)
        })?;

        Ok(())
    }
}

/// Derive the authcode for a serialized challenge record.
///
/// The MAC covers board id, device id and ephemeral key, which sit in that
/// order right after the version/key id byte.
pub fn derive_authcode<M: Mac + ?Sized>(
    mac: &M,
    shared: &SharedSecret,
    record: &[u8; RECORD_SIZE],
) -> Result<Authcode, CodecError> {
    let digest = mac.mac(shared.as_bytes(), &record[1..]);

    let mut text = [0u8; AUTHCODE_CHARS];
    base32::encode(&mut text, digest.as_bytes(), AUTHCODE_CHARS * 5, 0)?;
    let code = Authcode::from_bytes(text);
    text.zeroize();

    Ok(code)
}
