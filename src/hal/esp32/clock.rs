//! ESP32 clock implementation using the ESP-IDF timer.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::traits::{Clock, WallClock};

/// ESP32 clock using the hardware timer.
///
/// Monotonic time comes from `esp_timer_get_time()` (microseconds since
/// boot). Wall-clock time comes from the system time, which stays near
/// zero until SNTP has synchronised it.
///
/// # Example
///
/// ```ignore
/// use rs_doorman::hal::esp32::Esp32Clock;
/// use rs_doorman::traits::{Clock, WallClock};
///
/// let clock = Esp32Clock::new();
/// let start = clock.now_ms();
/// let synced = clock.epoch_secs() >= 1_600_000_000;
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn micros() -> i64 {
        // Plain read of the hardware timer; also safe from ISR context
        unsafe { esp_idf_sys::esp_timer_get_time() }
    }
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        (Self::micros() / 1000) as u64
    }

    #[inline]
    fn now_us(&self) -> u32 {
        Self::micros() as u32
    }
}

impl WallClock for Esp32Clock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
