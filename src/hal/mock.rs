//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware, storage and network
//! traits, enabling development and testing on desktop without a reader,
//! relays or a broker.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockClock`] | [`Clock`], [`WallClock`] | Controllable time source |
//! | [`MockRelayDriver`] | [`RelayDriver`] | Tracks output level and writes |
//! | [`MockContact`] | [`DoorContact`] | Settable door contact |
//! | [`MockRecordStore`] | [`RecordStore`] | In-memory user records |
//! | [`MockRemote`] | [`RemoteLookup`] | Records remote lookup requests |
//! | [`MockAccessHandler`] | [`AccessHandler`] | Collects final verdicts |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::access::AccessController;
//! use rs_doorman::config::AccessConfig;
//! use rs_doorman::hal::{MockAccessHandler, MockRecordStore, MockRemote};
//!
//! let mut engine = AccessController::new(AccessConfig::default(), MockRecordStore::new())
//!     .with_remote(MockRemote::new());
//! let mut handler = MockAccessHandler::new();
//!
//! engine.present("12345");
//! engine.poll(0, 1_700_000_000, &mut handler);
//! engine.poll(1, 1_700_000_000, &mut handler);
//!
//! // Not in the local store, so the remote was asked
//! assert_eq!(engine.remote_mut().unwrap().requests.len(), 1);
//! assert!(handler.denied.is_empty());
//! ```
//!
//! [`Clock`]: crate::traits::Clock
//! [`WallClock`]: crate::traits::WallClock
//! [`RelayDriver`]: crate::traits::RelayDriver
//! [`DoorContact`]: crate::traits::DoorContact
//! [`RecordStore`]: crate::traits::RecordStore
//! [`RemoteLookup`]: crate::traits::RemoteLookup
//! [`AccessHandler`]: crate::traits::AccessHandler
//! [`MqttClient`]: crate::traits::MqttClient

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::access::AccessDecision;
use crate::record::{Credential, UserRecord};
use crate::traits::{
    AccessHandler, Clock, DoorContact, LocalLookup, MqttClient, MqttMessage, RecordStore,
    RelayDriver, RemoteLookup, WallClock,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock relay output for testing.
///
/// Records the current level and the number of writes. Set `fail` to make
/// every write return an error.
///
/// # Example
///
/// ```rust
/// use rs_doorman::hal::MockRelayDriver;
/// use rs_doorman::traits::RelayDriver;
///
/// let mut output = MockRelayDriver::new();
/// output.fail = true;
/// assert!(output.set_level(true).is_err());
/// assert!(!output.level);
/// ```
#[derive(Debug, Default)]
pub struct MockRelayDriver {
    /// Current electrical level.
    pub level: bool,
    /// Number of successful `set_level` calls.
    pub writes: usize,
    /// Reject every write.
    pub fail: bool,
}

impl MockRelayDriver {
    /// Creates a new output driven low.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelayDriver for MockRelayDriver {
    type Error = ();

    fn set_level(&mut self, high: bool) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.level = high;
        self.writes += 1;
        Ok(())
    }
}

/// Mock door contact. Flip `open` to simulate the door moving.
#[derive(Debug, Default)]
pub struct MockContact {
    /// Raw contact reading.
    pub open: bool,
}

impl MockContact {
    /// Creates a contact with the given initial reading.
    pub fn new(open: bool) -> Self {
        Self { open }
    }
}

impl DoorContact for MockContact {
    fn is_open(&mut self) -> bool {
        self.open
    }
}

/// Mock clock for testing time-dependent behavior.
///
/// The monotonic and wall clocks are independent so tests can simulate an
/// unsynchronised wall clock.
///
/// # Example
///
/// ```rust
/// use rs_doorman::hal::MockClock;
/// use rs_doorman::traits::{Clock, WallClock};
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
///
/// clock.set_epoch(1_700_000_000);
/// assert_eq!(clock.epoch_secs(), 1_700_000_000);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
    epoch_secs: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms with an unset wall clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances time by the given milliseconds.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }

    /// Sets the wall clock in Unix seconds.
    pub fn set_epoch(&mut self, secs: u64) {
        self.epoch_secs = secs;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

impl WallClock for MockClock {
    fn epoch_secs(&self) -> u64 {
        self.epoch_secs
    }
}

// ============================================================================
// Access Mocks
// ============================================================================

/// In-memory record store keyed by credential.
#[derive(Debug, Default)]
pub struct MockRecordStore {
    entries: BTreeMap<Credential, LocalLookup>,
    /// Number of lookups served.
    pub lookups: usize,
}

impl MockRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under its own credential.
    pub fn insert(&mut self, record: UserRecord) {
        self.entries
            .insert(record.credential.clone(), LocalLookup::Found(record));
    }

    /// Stores an unreadable entry for `credential`.
    pub fn insert_malformed(&mut self, credential: &str) {
        self.entries
            .insert(crate::record::truncated(credential), LocalLookup::Malformed);
    }

    /// Removes the entry for `credential`.
    pub fn remove(&mut self, credential: &str) {
        self.entries.retain(|k, _| k.as_str() != credential);
    }
}

impl RecordStore for MockRecordStore {
    fn lookup(&mut self, credential: &Credential) -> LocalLookup {
        self.lookups += 1;
        self.entries
            .get(credential)
            .cloned()
            .unwrap_or(LocalLookup::NotFound)
    }
}

/// Remote lookup that only records what it was asked.
#[derive(Debug, Default)]
pub struct MockRemote {
    /// Credentials sent to the remote, oldest first.
    pub requests: Vec<Credential>,
}

impl MockRemote {
    /// Creates a remote with no requests.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteLookup for MockRemote {
    fn request(&mut self, credential: &Credential) {
        self.requests.push(credential.clone());
    }
}

/// Collects every final verdict.
#[derive(Debug, Default)]
pub struct MockAccessHandler {
    /// Granted verdicts, oldest first.
    pub granted: Vec<AccessDecision>,
    /// Every other verdict, oldest first.
    pub denied: Vec<AccessDecision>,
}

impl MockAccessHandler {
    /// Creates an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total verdicts seen.
    pub fn total(&self) -> usize {
        self.granted.len() + self.denied.len()
    }
}

impl AccessHandler for MockAccessHandler {
    fn access_granted(&mut self, decision: &AccessDecision) {
        self.granted.push(decision.clone());
    }

    fn access_denied(&mut self, decision: &AccessDecision) {
        self.denied.push(decision.clone());
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations and allows injecting
/// incoming messages for testing message handling.
///
/// # Example
///
/// ```rust
/// use rs_doorman::hal::MockMqtt;
/// use rs_doorman::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
///
/// mqtt.queue_message("door/cmd/unlock", b"{}".to_vec());
/// assert_eq!(mqtt.try_recv().unwrap().topic, "door/cmd/unlock");
///
/// mqtt.subscribe("door/cmd/#").unwrap();
/// assert!(mqtt.is_subscribed("door/cmd/#"));
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages to be returned by `try_recv()`.
    pub incoming: Vec<MqttMessage>,
    /// Whether the client is connected. Publishing fails while false.
    pub connected: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ()> {
        if !self.connected {
            return Err(());
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        if self.incoming.is_empty() {
            None
        } else {
            Some(self.incoming.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_store_lookup_kinds() {
        let mut store = MockRecordStore::new();
        store.insert(UserRecord::new("1", "alice"));
        store.insert_malformed("2");

        assert!(matches!(
            store.lookup(&crate::record::truncated("1")),
            LocalLookup::Found(r) if r.person.as_str() == "alice"
        ));
        assert_eq!(store.lookup(&crate::record::truncated("2")), LocalLookup::Malformed);
        assert_eq!(store.lookup(&crate::record::truncated("3")), LocalLookup::NotFound);
        assert_eq!(store.lookups, 3);

        store.remove("1");
        assert_eq!(store.lookup(&crate::record::truncated("1")), LocalLookup::NotFound);
    }

    #[test]
    fn disconnected_mqtt_rejects_publish() {
        let mut mqtt = MockMqtt::new();
        mqtt.connected = false;
        assert!(mqtt.publish("t", b"x", false).is_err());
        assert!(mqtt.published.is_empty());
    }
}
