//! Command dispatch for the challenge/response vendor command
//!
//! One command carries both directions: an empty payload asks for a new
//! challenge, a non-empty payload is the operator's authcode. Responses go
//! into a fixed-capacity buffer owned by the transport; on failure the
//! response body is the single status byte.
//!
//! [`handle_line`] is a small text front end over the same dispatch, used by
//! the serial console.

use std::fmt;

use log::{info, warn};

use crate::auth::{ChallengeText, AUTHCODE_CHARS};
use crate::challenge::CHALLENGE_CHARS;
use crate::clock::MonotonicClock;
use crate::crypto::{KeyExchange, Mac};
use crate::error::{RmaError, RmaResult};
use crate::identity::DeviceIdentity;
use crate::RmaAuth;

/// Response buffer size of the console transport
pub const CONSOLE_RESPONSE_CAP: usize = 128;

/// Status codes returned to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VendorRc {
    Success = 0,
    BogusArgs = 1,
    ResponseTooBig = 5,
    InternalError = 6,
    AccessDenied = 7,
    RateLimited = 9,
}

impl From<RmaError> for VendorRc {
    fn from(err: RmaError) -> Self {
        match err {
            RmaError::RateLimited => VendorRc::RateLimited,
            RmaError::Internal => VendorRc::InternalError,
            RmaError::AccessDenied => VendorRc::AccessDenied,
        }
    }
}

impl fmt::Display for VendorRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VendorRc::Success => "success",
            VendorRc::BogusArgs => "bogus arguments",
            VendorRc::ResponseTooBig => "response too big",
            VendorRc::InternalError => "internal error",
            VendorRc::AccessDenied => "access denied",
            VendorRc::RateLimited => "rate limited",
        };
        f.write_str(text)
    }
}

/// What the dispatcher needs from the protocol core
pub trait ChallengeResponse {
    /// Create a challenge and return its text
    fn new_challenge(&self) -> RmaResult<ChallengeText>;

    /// Check an operator authcode
    fn try_authcode(&self, candidate: &[u8; AUTHCODE_CHARS]) -> RmaResult<()>;
}

impl<K, I, C, M> ChallengeResponse for RmaAuth<K, I, C, M>
where
    K: KeyExchange,
    I: DeviceIdentity,
    C: MonotonicClock,
    M: Mac,
{
    fn new_challenge(&self) -> RmaResult<ChallengeText> {
        RmaAuth::new_challenge(self)
    }

    fn try_authcode(&self, candidate: &[u8; AUTHCODE_CHARS]) -> RmaResult<()> {
        RmaAuth::try_authcode(self, candidate)
    }
}

/// Handle one challenge/response command.
///
/// `response` is cleared and then filled with the challenge text, nothing
/// (successful authcode), or the status byte on failure.
pub fn rma_challenge_response<E, const CAP: usize>(
    endpoint: &E,
    payload: &[u8],
    response: &mut heapless::Vec<u8, CAP>,
) -> VendorRc
where
    E: ChallengeResponse + ?Sized,
{
    response.clear();

    if payload.is_empty() {
        get_challenge(endpoint, response)
    } else {
        process_response(endpoint, payload, response)
    }
}

fn get_challenge<E, const CAP: usize>(endpoint: &E, response: &mut heapless::Vec<u8, CAP>) -> VendorRc
where
    E: ChallengeResponse + ?Sized,
{
    // Refuse before creating anything, so a challenge is never generated
    // that could not be shown.
    if CAP < CHALLENGE_CHARS {
        return fail(response, VendorRc::ResponseTooBig);
    }

    match endpoint.new_challenge() {
        Ok(text) => {
            if response.extend_from_slice(text.as_bytes()).is_err() {
                return fail(response, VendorRc::ResponseTooBig);
            }
            info!("generated challenge: {text}");
            VendorRc::Success
        }
        Err(err) => fail(response, err.into()),
    }
}

fn process_response<E, const CAP: usize>(
    endpoint: &E,
    payload: &[u8],
    response: &mut heapless::Vec<u8, CAP>,
) -> VendorRc
where
    E: ChallengeResponse + ?Sized,
{
    let Ok(candidate) = <&[u8; AUTHCODE_CHARS]>::try_from(payload) else {
        warn!("authcode size {}", payload.len());
        return fail(response, VendorRc::BogusArgs);
    };

    match endpoint.try_authcode(candidate) {
        Ok(()) => {
            info!("authcode accepted");
            VendorRc::Success
        }
        Err(err) => {
            info!("authcode rejected");
            fail(response, err.into())
        }
    }
}

fn fail<const CAP: usize>(response: &mut heapless::Vec<u8, CAP>, rc: VendorRc) -> VendorRc {
    response.clear();
    // A zero-capacity transport gets the code only as the return value
    let _ = response.push(rc as u8);
    rc
}

/// Text front end: `challenge` or `auth <code>`.
pub fn handle_line<E>(endpoint: &E, line: &str) -> String
where
    E: ChallengeResponse + ?Sized,
{
    let mut words = line.split_whitespace();
    let payload: &[u8] = match (words.next(), words.next(), words.next()) {
        (Some(cmd), None, None) if cmd.eq_ignore_ascii_case("challenge") => &[],
        (Some(cmd), Some(code), None) if cmd.eq_ignore_ascii_case("auth") => code.as_bytes(),
        (None, _, _) => return String::new(),
        _ => return "ERROR unknown command (use `challenge` or `auth <code>`)".to_string(),
    };

    let mut response = heapless::Vec::<u8, CONSOLE_RESPONSE_CAP>::new();
    match rma_challenge_response(endpoint, payload, &mut response) {
        VendorRc::Success if payload.is_empty() => {
            format!("CHALLENGE {}", String::from_utf8_lossy(&response))
        }
        VendorRc::Success => "OK".to_string(),
        rc => format!("ERROR {rc}"),
    }
}
