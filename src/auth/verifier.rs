//! Authcode verification with a bounded retry budget

use log::{info, warn};

use super::state::{ProtocolState, AUTHCODE_CHARS};
use crate::crypto::fixed_time_eq;
use crate::error::{RmaError, RmaResult};

/// Check an operator-supplied authcode against the live one.
///
/// A correct code redeems the challenge: the pair is wiped even though the
/// call succeeds. A wrong code costs one try; the last try wipes the pair.
pub(crate) fn try_authcode(
    state: &mut ProtocolState,
    candidate: &[u8; AUTHCODE_CHARS],
) -> RmaResult<()> {
    // Out of tries and never created look the same from outside
    if state.tries_left == 0 || state.authcode.is_empty() {
        return Err(RmaError::AccessDenied);
    }

    if fixed_time_eq(state.authcode.as_array(), candidate) {
        state.lock();
        info!("authcode accepted");
        return Ok(());
    }

    state.tries_left -= 1;
    if state.tries_left == 0 {
        state.lock();
        warn!("authcode tries exhausted, challenge discarded");
    } else {
        info!("authcode mismatch, {} tries left", state.tries_left);
    }

    Err(RmaError::AccessDenied)
}
