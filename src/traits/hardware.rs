//! Hardware abstraction traits for relays, the door contact, and time.
//!
//! These are the seams between the state machines in this crate and the
//! physical board. Everything above them is pure logic driven by explicit
//! timestamps, which is what lets the whole controller run under test
//! without hardware.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RelayDriver`] | One digital output (lock, indicator, siren, ...) |
//! | [`DoorContact`] | Raw door-position input, before debouncing |
//! | [`Clock`] | Monotonic time source |
//! | [`WallClock`] | Calendar time used for record validity windows |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::traits::RelayDriver;
//! use rs_doorman::hal::MockRelayDriver;
//!
//! let mut output = MockRelayDriver::new();
//! output.set_level(true).unwrap();
//! assert!(output.level);
//! assert_eq!(output.writes, 1);
//! ```

/// A single digital output driving a relay coil or solid-state switch.
///
/// The driver only knows electrical levels. Whether "high" means energised
/// is decided by the [`Relay`](crate::relay::Relay) that owns the driver,
/// based on its configured [`ControlType`](crate::relay::ControlType).
pub trait RelayDriver {
    /// Error type for output writes.
    type Error: core::fmt::Debug;

    /// Drive the output high (`true`) or low (`false`).
    fn set_level(&mut self, high: bool) -> Result<(), Self::Error>;
}

/// Raw door-position input.
///
/// Returns the instantaneous reading; debouncing is done by
/// [`DebouncedContact`](crate::sensor::DebouncedContact).
///
/// # Implementation Notes
///
/// If the input cannot be read, report the door as open. An unreadable
/// sensor should push the door supervisor toward tamper/alarm, never toward
/// `secure`.
pub trait DoorContact {
    /// Returns true if the door currently reads as open.
    fn is_open(&mut self) -> bool;
}

/// Monotonic time source.
///
/// Provides monotonic time in milliseconds for relay, door and lookup
/// timing, plus a free-running microsecond counter for the Wiegand edge
/// filter. On desktop, this can wrap `std::time::Instant`. On embedded,
/// use a hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_doorman::traits::Clock;
/// use rs_doorman::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// assert_eq!(clock.now_us(), 100_000);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;

    /// Returns a free-running microsecond counter.
    ///
    /// Allowed to wrap; consumers only ever take wrapping differences.
    fn now_us(&self) -> u32 {
        (self.now_ms().wrapping_mul(1000)) as u32
    }
}

/// Calendar time source.
///
/// Until the device has synchronised (NTP or similar) this typically
/// returns a value close to zero, which the access engine detects through
/// [`ValidityPolicy::min_synced_epoch`](crate::record::ValidityPolicy).
pub trait WallClock {
    /// Seconds since the Unix epoch.
    fn epoch_secs(&self) -> u64;
}
