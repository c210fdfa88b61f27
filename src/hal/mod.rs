//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `fs`: File-per-credential record store (requires `std` and `serde-json-core`)
//! - `esp32`: ESP32-C3 SuperMini with GPIO relays and a Wiegand reader (requires `esp32` feature)

pub mod mock;

#[cfg(all(feature = "std", feature = "serde-json-core"))]
pub mod fs;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;

#[cfg(all(feature = "std", feature = "serde-json-core"))]
pub use fs::FsRecordStore;

#[cfg(feature = "esp32")]
pub use esp32::*;
