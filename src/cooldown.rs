//! Challenge rate limiting (cooldown enforcement)
//!
//! This module enforces a minimum time interval between challenge creations.
//! Every new challenge is a fresh key exchange the operator can attempt
//! `MAX_AUTHCODE_TRIES` times, so the interval bounds how fast guesses can be
//! made against new challenges.
//!
//! # Threat Model
//!
//! An operator at the console can:
//! - Wait out the cooldown (this is the point)
//!
//! An operator at the console cannot:
//! - Create challenges faster than the cooldown allows
//! - Accumulate "credits" for future rapid-fire creation
//!
//! The gate starts closed at boot (timestamp 0), so rebooting never buys a
//! fresh challenge. A request refused by the cooldown does not restart it.

/// Result of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownResult {
    /// Creation allowed, cooldown has elapsed
    Ready,
    /// Creation blocked, must wait
    Wait { remaining_us: u64 },
}

/// Tracks the time of the last admitted request
#[derive(Debug, Clone)]
pub struct Cooldown {
    interval_us: u64,
    last_us: u64,
}

impl Cooldown {
    pub fn new(interval_us: u64) -> Self {
        Self {
            interval_us,
            last_us: 0,
        }
    }

    /// Check if enough time has passed since the last admitted request
    pub fn check(&self, now_us: u64) -> CooldownResult {
        let elapsed = now_us.saturating_sub(self.last_us);
        if elapsed >= self.interval_us {
            CooldownResult::Ready
        } else {
            CooldownResult::Wait {
                remaining_us: self.interval_us - elapsed,
            }
        }
    }

    /// Check and record atomically
    ///
    /// Returns `Ok(())` and records `now_us` if the request is allowed.
    /// Returns `Err(remaining_us)` without recording if still in cooldown.
    pub fn gate(&mut self, now_us: u64) -> Result<(), u64> {
        match self.check(now_us) {
            CooldownResult::Ready => {
                self.last_us = now_us;
                Ok(())
            }
            CooldownResult::Wait { remaining_us } => Err(remaining_us),
        }
    }

    pub fn last_us(&self) -> u64 {
        self.last_us
    }
}
