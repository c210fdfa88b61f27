//! Trait definitions for hardware abstraction, networking, and the access
//! engine's collaborators.
//!
//! # Submodules
//!
//! - `hardware`: Relay outputs, door contact, monotonic and wall clocks
//! - `network`: MQTT client trait
//! - `access`: Record store, remote lookup and decision handler seams
//!
//! # Hardware Abstraction
//!
//! - [`RelayDriver`]: One digital output
//! - [`DoorContact`]: Raw door-position input
//! - [`Clock`]: Monotonic time source for `no_std` environments
//! - [`WallClock`]: Calendar time for record validity checks
//!
//! # Access Engine Seams
//!
//! - [`RecordStore`]: Local credential lookup
//! - [`RemoteLookup`]: Fire-and-forget remote lookup request
//! - [`AccessHandler`]: Receives the final granted/denied decision

pub mod access;
pub mod hardware;
pub mod network;

pub use access::*;
pub use hardware::*;
pub use network::*;
