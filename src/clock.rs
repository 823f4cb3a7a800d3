//! Monotonic time sources (microseconds)

use std::sync::atomic::{AtomicU64, Ordering};

/// A clock that never goes backwards
pub trait MonotonicClock {
    /// Microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;
}

/// Platform clock: the ESP-IDF high resolution timer on device, `Instant`
/// on host.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    origin: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_us(&self) -> u64 {
        // esp_timer counts microseconds since boot
        unsafe { esp_idf_sys::esp_timer_get_time() as u64 }
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Manually driven clock for tests and simulation
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now: AtomicU64::new(start_us),
        }
    }

    pub fn set(&self, us: u64) {
        self.now.store(us, Ordering::SeqCst);
    }

    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}
