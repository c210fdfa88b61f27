//! Door position switch on a GPIO input.
//!
//! # Wiring
//!
//! Reed switch between the GPIO and GND with the internal pull-up enabled:
//! closed door pulls the line low, an open door (or a cut wire) reads high.

use embedded_hal::digital::InputPin;

use crate::traits::DoorContact;

/// Door contact on any `embedded-hal` input.
pub struct GpioContact<P: InputPin> {
    pin: P,
    open_when_high: bool,
}

impl<P: InputPin> GpioContact<P> {
    /// Contact that reads high when open.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            open_when_high: true,
        }
    }

    /// Contact that reads low when open.
    pub fn inverted(pin: P) -> Self {
        Self {
            pin,
            open_when_high: false,
        }
    }
}

impl<P: InputPin> DoorContact for GpioContact<P> {
    fn is_open(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high == self.open_when_high,
            Err(e) => {
                log::error!("contact: read failed: {:?}", e);
                true
            }
        }
    }
}
