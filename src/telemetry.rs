//! MQTT link between the controller and the back office.
//!
//! [`MqttLink`] wraps any [`MqttClient`] and speaks the controller's topic
//! layout:
//!
//! **Publish Topics:**
//! - `<prefix>/lookup` - Remote lookup request `{"credential": "..."}`
//! - `<prefix>/notify/scan` - One access event per final verdict
//! - `<prefix>/notify/boot` - Once after startup
//! - `<prefix>/notify/heartbeat` - Every `heartbeat_secs` while connected
//! - `<prefix>/io/<name>` - Relay `operation/override` or contact `true`/`false`
//!
//! **Subscribe Topics:**
//! - `<prefix>/cmd/adduser` - User record document
//! - `<prefix>/cmd/deleteperson` - `{"credential": "..."}` to forget
//! - `<prefix>/cmd/unlock` - Remote unlock (any payload)
//!
//! Publish failures are logged and otherwise ignored; the door keeps
//! working while the broker is away.
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::config::MqttConfig;
//! use rs_doorman::hal::MockMqtt;
//! use rs_doorman::telemetry::{InboundCommand, MqttLink};
//!
//! let mut link = MqttLink::new(MockMqtt::new(), MqttConfig::default(), "doorman");
//! link.subscribe_commands();
//!
//! link.client_mut().queue_message("door/cmd/unlock", b"{}".to_vec());
//! assert_eq!(link.poll_incoming(), Some(InboundCommand::Unlock));
//! ```

use core::fmt::Write as _;

use heapless::String as HString;

use crate::access::AccessDecision;
use crate::config::{short_string, LongString, MqttConfig, ShortString};
use crate::messages::{
    encode_access_event, encode_lookup_request, encode_status_event, parse_lookup_request,
    parse_user_record, AccessEvent, StatusEvent,
};
use crate::record::{truncated, Credential, UserRecord};
use crate::relay::{OperationState, OverrideState};
use crate::traits::{MqttClient, RemoteLookup};

/// Payload of an `io/<name>` message.
pub type IoPayload = HString<32>;

/// A command received from the back office.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundCommand {
    /// A user record, either a lookup reply or an unsolicited push.
    AddUser(UserRecord),
    /// Remove the local record for a credential.
    DeleteUser(Credential),
    /// Open the door as if a valid credential had been presented.
    Unlock,
}

/// `"<operation>/<override>"`, e.g. `"active/holding"`.
pub fn relay_payload(operation: OperationState, override_state: OverrideState) -> IoPayload {
    let mut out = IoPayload::new();
    let _ = write!(out, "{}/{}", operation.label(), override_state.label());
    out
}

/// `"true"` when the door is open.
pub fn contact_payload(open: bool) -> IoPayload {
    let mut out = IoPayload::new();
    let _ = out.push_str(if open { "true" } else { "false" });
    out
}

/// Topic layout and payload encoding on top of an [`MqttClient`].
pub struct MqttLink<M: MqttClient> {
    client: M,
    config: MqttConfig,
    hostname: ShortString,
    last_heartbeat_ms: Option<u64>,
}

impl<M: MqttClient> MqttLink<M> {
    /// Wrap `client`. `hostname` becomes the `id` of every access event.
    pub fn new(client: M, config: MqttConfig, hostname: &str) -> Self {
        Self {
            client,
            config,
            hostname: short_string(hostname),
            last_heartbeat_ms: None,
        }
    }

    /// The wrapped client.
    pub fn client_mut(&mut self) -> &mut M {
        &mut self.client
    }

    /// Full topic for `suffix`.
    pub fn topic(&self, suffix: &str) -> LongString {
        self.config.topic(suffix)
    }

    /// Subscribe to the inbound command topics.
    pub fn subscribe_commands(&mut self) {
        let topic = self.topic("cmd/#");
        if let Err(e) = self.client.subscribe(topic.as_str()) {
            log::error!("mqtt: subscribe to {} failed: {:?}", topic, e);
        }
    }

    /// Publish one final verdict to `notify/scan`.
    pub fn publish_access(&mut self, decision: &AccessDecision, epoch_secs: u64) {
        let event = AccessEvent::from_decision(decision, self.hostname.as_str(), epoch_secs);
        match encode_access_event(&event) {
            Some(json) => self.send("notify/scan", json.as_bytes(), false),
            None => log::warn!("mqtt: access event for {} too large", decision.credential),
        }
    }

    /// Announce startup on `notify/boot`. The first heartbeat follows one
    /// interval later.
    pub fn publish_boot(&mut self, now_ms: u64, epoch_secs: u64) {
        self.last_heartbeat_ms = Some(now_ms);
        self.publish_status("notify/boot", epoch_secs, 0);
    }

    /// Publish `notify/heartbeat` if connected and an interval has passed
    /// since the last one. Returns true if a heartbeat went out.
    pub fn heartbeat(&mut self, now_ms: u64, epoch_secs: u64) -> bool {
        if !self.config.enabled || self.config.heartbeat_secs == 0 || !self.client.is_connected() {
            return false;
        }
        let interval_ms = u64::from(self.config.heartbeat_secs) * 1000;
        if let Some(last) = self.last_heartbeat_ms {
            if now_ms.saturating_sub(last) < interval_ms {
                return false;
            }
        }
        self.last_heartbeat_ms = Some(now_ms);
        self.publish_status("notify/heartbeat", epoch_secs, now_ms / 1000);
        true
    }

    /// Publish a relay or contact change to `io/<name>`.
    pub fn publish_io(&mut self, name: &str, payload: &str) {
        let mut suffix = ShortString::new();
        let _ = write!(suffix, "io/{}", name);
        self.send(suffix.as_str(), payload.as_bytes(), true);
    }

    /// Take the next recognised command, skipping anything else.
    pub fn poll_incoming(&mut self) -> Option<InboundCommand> {
        let adduser = self.topic("cmd/adduser");
        let deleteperson = self.topic("cmd/deleteperson");
        let unlock = self.topic("cmd/unlock");

        while let Some(msg) = self.client.try_recv() {
            if msg.topic == adduser.as_str() {
                match parse_user_record(&msg.payload) {
                    Some(record) => return Some(InboundCommand::AddUser(record)),
                    None => log::warn!("mqtt: malformed user record on {}", msg.topic),
                }
            } else if msg.topic == deleteperson.as_str() {
                match parse_lookup_request(&msg.payload) {
                    Some(req) if !req.credential.is_empty() => {
                        return Some(InboundCommand::DeleteUser(truncated(req.credential)));
                    }
                    _ => log::warn!("mqtt: malformed delete request on {}", msg.topic),
                }
            } else if msg.topic == unlock.as_str() {
                return Some(InboundCommand::Unlock);
            } else {
                log::debug!("mqtt: ignoring message on {}", msg.topic);
            }
        }
        None
    }

    fn publish_status(&mut self, suffix: &str, epoch_secs: u64, uptime_secs: u64) {
        let event = StatusEvent {
            time: epoch_secs,
            uptime: uptime_secs,
            id: self.hostname.as_str(),
        };
        if let Some(json) = encode_status_event(&event) {
            self.send(suffix, json.as_bytes(), false);
        }
    }

    fn send(&mut self, suffix: &str, payload: &[u8], retain: bool) {
        if !self.config.enabled {
            return;
        }
        let topic = self.topic(suffix);
        if let Err(e) = self.client.publish(topic.as_str(), payload, retain) {
            log::warn!("mqtt: publish to {} failed: {:?}", topic, e);
        }
    }
}

impl<M: MqttClient> RemoteLookup for MqttLink<M> {
    fn request(&mut self, credential: &Credential) {
        match encode_lookup_request(credential.as_str()) {
            Some(json) => self.send("lookup", json.as_bytes(), false),
            None => log::warn!("mqtt: lookup request for {} too large", credential),
        }
    }
}
