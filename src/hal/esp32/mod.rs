//! ESP32-C3 hardware abstraction layer for a single-door controller.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Reader**: any Wiegand 26/34/37-bit reader (D0/D1 open collector)
//! - **Outputs**: relay board or SSRs for lock, indicator, alarm, opener, closer
//! - **Input**: reed switch door contact
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for the default GPIO assignments. Every pin can
//! be moved through [`Config`](crate::config::Config).

mod clock;
mod contact;
mod mqtt;
mod reader;
mod relay;
mod wifi;

pub use clock::Esp32Clock;
pub use contact::GpioContact;
pub use mqtt::{Esp32Mqtt, Esp32MqttError};
pub use reader::Esp32WiegandLines;
pub use relay::GpioRelay;
pub use wifi::Esp32Wifi;

/// Default pin assignments for the SuperMini ESP32-C3.
pub mod pins {
    // =========================================================================
    // Wiegand Reader
    // =========================================================================

    /// Reader D0 line
    pub const WIEGAND_D0: u8 = 4;

    /// Reader D1 line
    pub const WIEGAND_D1: u8 = 5;

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Lock relay
    pub const LOCK: u8 = 6;

    /// Reader LED / indicator relay
    pub const INDICATOR: u8 = 7;

    /// Alarm sounder relay
    pub const ALARM: u8 = 10;

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Door contact (reed switch to GND)
    pub const CONTACT: u8 = 3;

    /// Request-to-exit button to GND (the board's BOOT button)
    pub const EXIT_BUTTON: u8 = 9;
}
