//! Relay outputs on plain GPIO.

use embedded_hal::digital::OutputPin;

use crate::traits::RelayDriver;

/// Relay coil or SSR driven by one GPIO.
///
/// Works with any `embedded-hal` output, including
/// `esp_idf_hal::gpio::PinDriver<'_, _, Output>`.
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::gpio::PinDriver;
/// use rs_doorman::hal::esp32::GpioRelay;
/// use rs_doorman::relay::Relay;
///
/// let pin = PinDriver::output(peripherals.pins.gpio6)?;
/// let lock = Relay::new("lock", GpioRelay::new(pin), &config.relays.lock);
/// ```
pub struct GpioRelay<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> GpioRelay<P> {
    /// Wrap an output pin.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Release the pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> RelayDriver for GpioRelay<P> {
    type Error = P::Error;

    fn set_level(&mut self, high: bool) -> Result<(), P::Error> {
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}
