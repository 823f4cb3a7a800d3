//! Key exchange and MAC primitives
//!
//! The protocol core only talks to these through the [`KeyExchange`] and
//! [`Mac`] traits. The shipped implementations are X25519 and HMAC-SHA256.
//!
//! Secret values are wrapped so they are zeroized when dropped; nothing here
//! hands out a bare `[u8; 32]` that could outlive the operation using it.

use hmac::{Hmac, Mac as _};
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// X25519 key and shared secret size
pub const KEY_SIZE: usize = 32;

/// HMAC-SHA256 digest size
pub const DIGEST_SIZE: usize = 32;

/// Private half of a key pair
///
/// Holds the dalek secret itself, which zeroizes on drop, so the scalar is
/// never copied out as raw bytes.
pub struct PrivateScalar(StaticSecret);

impl PrivateScalar {
    pub fn from_bytes(mut bytes: [u8; KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        Self(secret)
    }
}

impl ZeroizeOnDrop for PrivateScalar {}

/// Diffie-Hellman output, zeroized on drop by the wrapped dalek type
pub struct SharedSecret(x25519_dalek::SharedSecret);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl ZeroizeOnDrop for SharedSecret {}

/// MAC output, zeroized on drop since it may be secret-derived
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

/// A freshly generated key pair. The private half zeroizes on drop.
pub struct EphemeralKeyPair {
    pub public: [u8; KEY_SIZE],
    pub private: PrivateScalar,
}

/// Elliptic-curve key exchange
pub trait KeyExchange {
    /// Generate a fresh key pair (never reused)
    fn generate_keypair(&mut self) -> EphemeralKeyPair;

    /// Compute the shared secret between `private` and a peer public key
    fn shared_secret(&self, private: &PrivateScalar, peer_public: &[u8; KEY_SIZE]) -> SharedSecret;
}

/// Keyed hash with a 32-byte output
pub trait Mac {
    fn mac(&self, key: &[u8], message: &[u8]) -> Digest;
}

/// X25519 backed by any cryptographic RNG
pub struct X25519KeyExchange<R> {
    rng: R,
}

impl<R: RngCore + CryptoRng> X25519KeyExchange<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + CryptoRng> KeyExchange for X25519KeyExchange<R> {
    fn generate_keypair(&mut self) -> EphemeralKeyPair {
        let secret = StaticSecret::random_from_rng(&mut self.rng);
        let public = PublicKey::from(&secret).to_bytes();
        EphemeralKeyPair {
            public,
            private: PrivateScalar(secret),
        }
    }

    fn shared_secret(&self, private: &PrivateScalar, peer_public: &[u8; KEY_SIZE]) -> SharedSecret {
        x25519(private, peer_public)
    }
}

/// X25519 scalar multiplication with a peer public key
pub fn x25519(private: &PrivateScalar, peer_public: &[u8; KEY_SIZE]) -> SharedSecret {
    SharedSecret(private.0.diffie_hellman(&PublicKey::from(*peer_public)))
}

/// Derive the X25519 public key for a private scalar
pub fn x25519_public_key(private: &PrivateScalar) -> [u8; KEY_SIZE] {
    PublicKey::from(&private.0).to_bytes()
}

/// HMAC-SHA256
#[derive(Debug, Default, Clone, Copy)]
pub struct HmacSha256;

impl Mac for HmacSha256 {
    fn mac(&self, key: &[u8], message: &[u8]) -> Digest {
        // HMAC accepts keys of any length.
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key) else {
            unreachable!("HMAC-SHA256 accepts keys of any length")
        };
        mac.update(message);
        Digest(mac.finalize().into_bytes().into())
    }
}

/// Compare two byte strings of equal length without early exit.
///
/// Every byte of both inputs is inspected whatever the position of the first
/// difference. Inputs of different length compare unequal.
pub fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    fixed_time_eq_visiting(a, b, |_| {})
}

fn fixed_time_eq_visiting(a: &[u8], b: &[u8], mut visit: impl FnMut(usize)) -> bool {
    // Lengths are public; only contents are protected.
    if a.len() != b.len() {
        return false;
    }

    let mut equal = Choice::from(1u8);
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        visit(i);
        equal &= x.ct_eq(y);
    }
    equal.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::HardwareRng;

    #[test]
    fn test_both_sides_derive_same_secret() {
        let mut kex = X25519KeyExchange::new(HardwareRng::new().unwrap());
        let device = kex.generate_keypair();
        let authority = kex.generate_keypair();

        let a = kex.shared_secret(&device.private, &authority.public);
        let b = kex.shared_secret(&authority.private, &device.public);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_keypairs_are_fresh() {
        let mut kex = X25519KeyExchange::new(HardwareRng::new().unwrap());
        let first = kex.generate_keypair();
        let second = kex.generate_keypair();
        assert_ne!(first.public, second.public);
        assert_eq!(x25519_public_key(&first.private), first.public);
    }

    #[test]
    fn test_private_scalar_from_bytes_matches_rfc7748() {
        // RFC 7748 section 6.1, Alice's key pair
        let private = PrivateScalar::from_bytes([
            0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
            0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
            0x1d, 0xb9, 0x2c, 0x2a,
        ]);
        let expected = [
            0x85, 0x20, 0xf0, 0x09, 0x89, 0x30, 0xa7, 0x54, 0x74, 0x8b, 0x7d, 0xdc, 0xb4, 0x3e,
            0xf7, 0x5a, 0x0d, 0xbf, 0x3a, 0x0d, 0x26, 0x38, 0x1a, 0xf4, 0xeb, 0xa4, 0xa9, 0x8e,
            0xaa, 0x9b, 0x4e, 0x6a,
        ];
        assert_eq!(x25519_public_key(&private), expected);
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        let digest = HmacSha256.mac(b"Jefe", b"what do ya want for nothing?");
        let expected = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(digest.as_bytes(), &expected);
    }

    #[test]
    fn test_fixed_time_eq() {
        assert!(fixed_time_eq(b"ABCDEFGH", b"ABCDEFGH"));
        assert!(!fixed_time_eq(b"ABCDEFGH", b"XBCDEFGH"));
        assert!(!fixed_time_eq(b"ABCDEFGH", b"ABCDEFGX"));
        assert!(!fixed_time_eq(b"ABCDEFGH", b"ABCDEFG"));
    }

    #[test]
    fn test_fixed_time_eq_touches_every_byte() {
        for candidate in [b"ABCDEFGH", b"XBCDEFGH", b"ABCDXFGH", b"ABCDEFGX"] {
            let mut visited = Vec::new();
            fixed_time_eq_visiting(b"ABCDEFGH", candidate, |i| visited.push(i));
            assert_eq!(visited, (0..8).collect::<Vec<_>>());
        }
    }
}
