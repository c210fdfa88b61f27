//! # rs-doorman
//!
//! Firmware library for a single-door access controller: a Wiegand card
//! reader, a local record store with an optional remote authority, relay
//! outputs and a door-position contact.
//!
//! ## Features
//!
//! - **Wiegand decoding**: interrupt-safe edge capture, 26/34/37-bit frames with parity
//! - **Access decisions**: local lookup, remote escalation with timeout, ban and validity rules
//! - **Relay actuation**: momentary or continuous outputs with hold and lockout overrides
//! - **Door supervision**: unlock cycle, held-open alarm, forced-open tamper detection
//! - **MQTT telemetry**: access events, relay and contact changes, remote lookups and unlocks
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware, storage and network abstractions
//! - `wiegand` - Reader edge capture and frame decoding
//! - `access` - Access decision engine
//! - `relay` / `sensor` / `door` - Outputs, debounced contact and the door supervisor
//! - `telemetry` - MQTT topic layout on top of any client
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_doorman::{
//!     AccessController, AccessDecision, AccessHandler, Door, DoorRelays, DoorState, Relay,
//!     config::{AccessConfig, DoorConfig, RelayConfig},
//!     hal::{MockContact, MockRecordStore, MockRelayDriver},
//!     record::UserRecord,
//!     sensor::DebouncedContact,
//!     traits::NoRemote,
//! };
//!
//! struct Unlock<'a>(&'a mut Door<MockRelayDriver, MockContact>, u64);
//!
//! impl AccessHandler for Unlock<'_> {
//!     fn access_granted(&mut self, _: &AccessDecision) {
//!         self.0.activate(self.1);
//!     }
//!     fn access_denied(&mut self, _: &AccessDecision) {}
//! }
//!
//! let mut store = MockRecordStore::new();
//! store.insert(UserRecord::new("8400953", "alice"));
//! let mut engine: AccessController<_, NoRemote> =
//!     AccessController::new(AccessConfig::default(), store);
//!
//! let lock = Relay::new("lock", MockRelayDriver::new(), &RelayConfig::default());
//! let sensor = DebouncedContact::new(MockContact::new(false), 0);
//! let mut door = Door::new(DoorRelays::with_lock(lock), Some(sensor), &DoorConfig::default());
//! door.begin(0);
//!
//! engine.present("8400953");
//! for now in 0..3 {
//!     engine.poll(now, 1_700_000_000, &mut Unlock(&mut door, now));
//!     door.update(now);
//! }
//! assert_eq!(door.state(), DoorState::Unlocked);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Access decision engine: local lookup, remote escalation and cooldown.
pub mod access;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Door supervisor state machine.
pub mod door;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// User records, credential encoding and validity evaluation.
pub mod record;
/// Relay actuator with timed activation and overrides.
pub mod relay;
/// Debounced door-position input.
pub mod sensor;
/// Core traits for hardware, storage and network abstraction.
pub mod traits;
/// Wiegand reader capture and decoding.
pub mod wiegand;

/// Shared message types for MQTT communication (serde-based).
#[cfg(feature = "serde")]
pub mod messages;

/// MQTT topic layout, access events and remote lookups.
#[cfg(feature = "serde-json-core")]
pub mod telemetry;

// Re-exports for convenience
pub use access::{AccessController, AccessDecision, ControlState, DecisionSource, ReadOutcome};
pub use door::{Door, DoorEvent, DoorRelays, DoorState};
pub use error::{ConfigError, DecodeError, RecordError};
pub use record::{AccessResult, Credential, CredentialRadix, UserRecord};
pub use relay::{ControlType, OperationState, OverrideState, Relay};
pub use traits::{
    // Access seams
    AccessHandler,
    // Hardware
    Clock,
    DoorContact,
    LocalLookup,
    // Network
    MqttClient,
    MqttMessage,
    RecordStore,
    RelayDriver,
    RemoteLookup,
    WallClock,
};
pub use wiegand::{EdgeCapture, WiegandRead, WiegandReader};

// Config re-exports
pub use config::{
    AccessConfig, Config, DeviceConfig, DoorConfig, MqttConfig, ReaderConfig, RelayConfig,
    RelaysConfig, WifiConfig,
};

// Telemetry re-exports
#[cfg(feature = "serde-json-core")]
pub use telemetry::{InboundCommand, MqttLink};
