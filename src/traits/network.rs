//! Network abstraction trait for the MQTT link.
//!
//! The controller reports scans and relay activity over MQTT and, when a
//! credential is not resolved locally, asks the back office for a record.
//! Replies and remote commands come back on the same connection.
//!
//! # Topics
//!
//! All topics sit under a configurable prefix (see
//! [`MqttConfig`](crate::config::MqttConfig)):
//!
//! ```text
//! <prefix>/lookup          - Remote lookup request: {"credential":"..."}
//! <prefix>/notify/scan     - Access event for every completed decision
//! <prefix>/io/<name>       - Relay or sensor state change
//! <prefix>/cmd/adduser     - Inbound user record (lookup reply or push)
//! <prefix>/cmd/unlock      - Inbound remote unlock
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// MQTT Client Trait
// ============================================================================

/// MQTT client trait for pub/sub messaging.
///
/// Sync and poll-based so the same code path runs inside the firmware main
/// loop and under test.
///
/// # Implementation Notes
///
/// - `publish` and `subscribe` may block briefly on the device
/// - `try_recv` must never block
/// - The client should handle reconnection internally
///
/// # Example
///
/// ```rust
/// use rs_doorman::traits::MqttClient;
/// use rs_doorman::hal::MockMqtt;
///
/// let mut client = MockMqtt::new();
/// client.publish("door/io/lock", b"active", false).unwrap();
/// assert_eq!(client.published_to("door/io/lock").len(), 1);
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Publish a message to a topic.
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic. Supports `+` and `#` wildcards.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}
