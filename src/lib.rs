//! rma-auth - Offline challenge-response authorization
//!
//! Lets an operator with no network link to the device prove that a central
//! authority approved a privileged operation (RMA unlock, factory reset):
//! 1. The device shows a short base32 challenge containing its identity and
//!    a fresh ephemeral X25519 public key
//! 2. The authority, holding the matching static private key, derives an
//!    8-character authcode from the challenge
//! 3. The operator types the authcode back; the device accepts it once and
//!    allows only a few wrong guesses per challenge
//!
//! Ephemeral private keys and shared secrets never outlive challenge
//! creation, and nothing is persisted.

pub mod auth;
pub mod authority;
pub mod base32;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod console;
pub mod cooldown;
pub mod crypto;
pub mod entropy;
pub mod error;
pub mod identity;

pub use auth::{Authcode, ChallengeText, Limits, RmaAuth, ServerKey, VerifierState};
pub use authority::AuthorityKey;
pub use error::{RmaError, RmaResult};
