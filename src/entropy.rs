//! Random number source for ephemeral keys
//!
//! On the ESP32 this is the hardware TRNG, read through `esp_fill_random()`.
//! With WiFi/BT disabled the entropy comes from thermal noise only, which
//! Espressif documents as cryptographically secure at a lower rate.
//!
//! Host builds (tests, desktop simulation) fall back to the operating
//! system RNG.

use rand_core::{CryptoRng, RngCore};

/// Cryptographic RNG backed by the platform entropy source
pub struct HardwareRng {
    _private: (),
}

impl HardwareRng {
    /// Initialize the RNG and sanity check one read
    pub fn new() -> anyhow::Result<Self> {
        let rng = Self { _private: () };

        let mut test = [0u8; 8];
        rng.fill(&mut test);

        // All zeros would indicate RNG failure
        if test == [0u8; 8] {
            anyhow::bail!("RNG sanity check failed - returned all zeros");
        }

        Ok(rng)
    }

    /// Fill a buffer with random bytes
    #[cfg(target_os = "espidf")]
    pub fn fill(&self, dest: &mut [u8]) {
        unsafe {
            esp_idf_sys::esp_fill_random(dest.as_mut_ptr() as *mut _, dest.len());
        }
    }

    /// Fill a buffer with random bytes
    #[cfg(not(target_os = "espidf"))]
    pub fn fill(&self, dest: &mut [u8]) {
        rand_core::OsRng.fill_bytes(dest);
    }
}

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.fill(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill(dest);
        Ok(())
    }
}

impl CryptoRng for HardwareRng {}
