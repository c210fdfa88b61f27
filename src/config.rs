//! Controller configuration.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. Loading and persisting the
//! configuration is left to the embedding firmware; this module only
//! defines the shape, the defaults and [`Config::validate`].
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::config::{AccessConfig, Config, DoorConfig, MqttConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert!(config.validate().is_ok());
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"))
//!     .with_access(AccessConfig::default().with_lookup_delay_ms(800))
//!     .with_door(DoorConfig::default().with_max_open_secs(60));
//! assert_eq!(config.door.max_open_secs, 60);
//! ```

use heapless::String as HString;

use crate::error::ConfigError;
use crate::record::{
    truncated, CredentialRadix, UnsetValidUntil, UnsyncedClock, ValidityPolicy,
    DEFAULT_MIN_SYNCED_EPOCH,
};
use crate::relay::ControlType;
use crate::wiegand::DEFAULT_MIN_EDGE_US;

/// Maximum length for short config strings (hostnames, client IDs)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete controller configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Card reader wiring and decoding
    pub reader: ReaderConfig,
    /// Access decision timing and validity rules
    pub access: AccessConfig,
    /// Relay outputs
    pub relays: RelaysConfig,
    /// Door supervision
    pub door: DoorConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// WiFi station configuration
    pub wifi: WifiConfig,
    /// Device identification
    pub device: DeviceConfig,
}

impl Config {
    /// Set reader configuration
    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    /// Set access configuration
    pub fn with_access(mut self, access: AccessConfig) -> Self {
        self.access = access;
        self
    }

    /// Set relay configuration
    pub fn with_relays(mut self, relays: RelaysConfig) -> Self {
        self.relays = relays;
        self
    }

    /// Set door configuration
    pub fn with_door(mut self, door: DoorConfig) -> Self {
        self.door = door;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Reject configurations the controller cannot run safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("reader.min_edge_us", self.reader.min_edge_us),
            ("reader.idle_factor", self.reader.idle_factor),
            ("reader.frame_wait_ms", self.reader.frame_wait_ms),
            ("access.lookup_delay_ms", self.access.lookup_delay_ms),
            ("door.tamper_alarm_ms", self.door.tamper_alarm_ms),
        ];
        if let Some((field, _)) = timings.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::InvalidTiming { field: *field });
        }

        if self.relays.lock.pin.is_none() {
            return Err(ConfigError::MissingLockRelay);
        }

        let mut seen: heapless::Vec<u8, 9> = heapless::Vec::new();
        let pins = [
            Some(self.reader.d0_pin),
            Some(self.reader.d1_pin),
            self.door.sensor_pin,
            self.door.exit_button_pin,
            self.relays.lock.pin,
            self.relays.indicator.pin,
            self.relays.alarm.pin,
            self.relays.open.pin,
            self.relays.close.pin,
        ];
        for pin in pins.into_iter().flatten() {
            if seen.contains(&pin) {
                return Err(ConfigError::DuplicatePin { pin });
            }
            let _ = seen.push(pin);
        }
        Ok(())
    }
}

// ============================================================================
// Reader Config
// ============================================================================

/// Wiegand reader configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderConfig {
    /// GPIO for the D0 line
    pub d0_pin: u8,
    /// GPIO for the D1 line
    pub d1_pin: u8,
    /// Edges closer together than this are bounce
    pub min_edge_us: u32,
    /// Silence of `idle_factor * min_edge_us` ends a frame
    pub idle_factor: u32,
    /// Silence of this many milliseconds also ends a frame
    pub frame_wait_ms: u32,
    /// Verify leading/trailing parity bits
    pub check_parity: bool,
    /// How card numbers are rendered as credentials
    pub radix: CredentialRadix,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            d0_pin: 4,
            d1_pin: 5,
            min_edge_us: DEFAULT_MIN_EDGE_US,
            idle_factor: 10,
            frame_wait_ms: 50,
            check_parity: true,
            radix: CredentialRadix::Decimal,
        }
    }
}

impl ReaderConfig {
    /// Set the data-line pins
    pub fn with_pins(mut self, d0: u8, d1: u8) -> Self {
        self.d0_pin = d0;
        self.d1_pin = d1;
        self
    }

    /// Set the bounce filter interval
    pub fn with_min_edge_us(mut self, us: u32) -> Self {
        self.min_edge_us = us;
        self
    }

    /// Set the frame wait window
    pub fn with_frame_wait_ms(mut self, ms: u32) -> Self {
        self.frame_wait_ms = ms;
        self
    }

    /// Enable or disable parity checking
    pub fn with_check_parity(mut self, check: bool) -> Self {
        self.check_parity = check;
        self
    }

    /// Set the credential radix
    pub fn with_radix(mut self, radix: CredentialRadix) -> Self {
        self.radix = radix;
        self
    }
}

// ============================================================================
// Access Config
// ============================================================================

/// Access decision engine configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessConfig {
    /// How long to wait for the remote authority
    pub lookup_delay_ms: u32,
    /// Dwell after every verdict
    pub cooldown_ms: u32,
    /// Wall-clock seconds below which the clock counts as unsynchronised
    pub min_synced_epoch: u64,
    /// Meaning of an unset end date
    pub unset_valid_until: UnsetValidUntil,
    /// Behaviour while the clock is unsynchronised
    pub unsynced_clock: UnsyncedClock,
    /// Whether to consult the remote authority at all
    pub remote_enabled: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            lookup_delay_ms: 500,
            cooldown_ms: 1500,
            min_synced_epoch: DEFAULT_MIN_SYNCED_EPOCH,
            unset_valid_until: UnsetValidUntil::Unbounded,
            unsynced_clock: UnsyncedClock::FailOpen,
            remote_enabled: true,
        }
    }
}

impl AccessConfig {
    /// Set the remote lookup window
    pub fn with_lookup_delay_ms(mut self, ms: u32) -> Self {
        self.lookup_delay_ms = ms;
        self
    }

    /// Set the cooldown dwell
    pub fn with_cooldown_ms(mut self, ms: u32) -> Self {
        self.cooldown_ms = ms;
        self
    }

    /// Set the meaning of an unset end date
    pub fn with_unset_valid_until(mut self, rule: UnsetValidUntil) -> Self {
        self.unset_valid_until = rule;
        self
    }

    /// Set the unsynchronised-clock behaviour
    pub fn with_unsynced_clock(mut self, rule: UnsyncedClock) -> Self {
        self.unsynced_clock = rule;
        self
    }

    /// Enable or disable remote lookups
    pub fn with_remote_enabled(mut self, enabled: bool) -> Self {
        self.remote_enabled = enabled;
        self
    }

    /// Record evaluation rules derived from this configuration
    pub fn validity_policy(&self) -> ValidityPolicy {
        ValidityPolicy {
            min_synced_epoch: self.min_synced_epoch,
            unset_valid_until: self.unset_valid_until,
            unsynced_clock: self.unsynced_clock,
        }
    }
}

// ============================================================================
// Relay Config
// ============================================================================

/// One relay output
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayConfig {
    /// GPIO, or `None` if the output is not fitted
    pub pin: Option<u8>,
    /// Output polarity
    pub control: ControlType,
    /// Momentary duration (0 = stays active until told otherwise)
    pub actuation_ms: u32,
    /// Mechanical switching delay
    pub delay_ms: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pin: None,
            control: ControlType::ActiveLow,
            actuation_ms: 2000,
            delay_ms: 0,
        }
    }
}

impl RelayConfig {
    /// Set the GPIO
    pub fn with_pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Set the output polarity
    pub fn with_control(mut self, control: ControlType) -> Self {
        self.control = control;
        self
    }

    /// Set the momentary duration
    pub fn with_actuation_ms(mut self, ms: u32) -> Self {
        self.actuation_ms = ms;
        self
    }

    /// Set the mechanical delay
    pub fn with_delay_ms(mut self, ms: u32) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Returns true if a pin is assigned
    pub fn is_fitted(&self) -> bool {
        self.pin.is_some()
    }
}

/// Every relay slot of a door
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelaysConfig {
    /// Electric strike or maglock
    pub lock: RelayConfig,
    /// Access indicator
    pub indicator: RelayConfig,
    /// Siren
    pub alarm: RelayConfig,
    /// Door opener
    pub open: RelayConfig,
    /// Door closer
    pub close: RelayConfig,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            lock: RelayConfig::default().with_pin(6),
            indicator: RelayConfig::default(),
            alarm: RelayConfig::default().with_actuation_ms(0),
            open: RelayConfig::default().with_actuation_ms(500),
            close: RelayConfig::default().with_actuation_ms(500),
        }
    }
}

// ============================================================================
// Door Config
// ============================================================================

/// Door supervisor configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DoorConfig {
    /// Alarm after the door stands open this long (0 = never)
    pub max_open_secs: u32,
    /// Escalate an unexplained opening to alarm after this long
    pub tamper_alarm_ms: u32,
    /// Door contact debounce interval
    pub sensor_debounce_ms: u32,
    /// Door contact GPIO, or `None` if not fitted
    pub sensor_pin: Option<u8>,
    /// Request-to-exit button GPIO, or `None` if not fitted
    pub exit_button_pin: Option<u8>,
    /// Exit button debounce interval
    pub exit_button_debounce_ms: u32,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            max_open_secs: 0,
            tamper_alarm_ms: 10_000,
            sensor_debounce_ms: 2000,
            sensor_pin: None,
            exit_button_pin: None,
            exit_button_debounce_ms: 30,
        }
    }
}

impl DoorConfig {
    /// Set the maximum open time
    pub fn with_max_open_secs(mut self, secs: u32) -> Self {
        self.max_open_secs = secs;
        self
    }

    /// Set the tamper escalation delay
    pub fn with_tamper_alarm_ms(mut self, ms: u32) -> Self {
        self.tamper_alarm_ms = ms;
        self
    }

    /// Set the contact debounce interval
    pub fn with_sensor_debounce_ms(mut self, ms: u32) -> Self {
        self.sensor_debounce_ms = ms;
        self
    }

    /// Set the door contact GPIO
    pub fn with_sensor_pin(mut self, pin: u8) -> Self {
        self.sensor_pin = Some(pin);
        self
    }

    /// Set the exit button GPIO
    pub fn with_exit_button_pin(mut self, pin: u8) -> Self {
        self.exit_button_pin = Some(pin);
        self
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Topic prefix for all pub/sub (e.g., "door" -> "door/lookup")
    pub topic_prefix: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Interval between `notify/heartbeat` messages (0 = never)
    pub heartbeat_secs: u32,
    /// Whether MQTT is enabled
    pub enabled: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string("rs-doorman"),
            topic_prefix: short_string("door"),
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 30,
            heartbeat_secs: 180,
            enabled: true,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = short_string(prefix);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_secs(mut self, secs: u32) -> Self {
        self.heartbeat_secs = secs;
        self
    }

    /// Enable or disable MQTT
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build a topic string with the configured prefix
    pub fn topic(&self, suffix: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str(self.topic_prefix.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(suffix);
        topic
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// Whether WiFi is enabled
    pub enabled: bool,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            enabled: true,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Enable or disable WiFi
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// True when enabled and an SSID is set
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.ssid.is_empty()
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Hostname, reported as the `id` of access events
    pub hostname: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: short_string("doorman"),
        }
    }
}

impl DeviceConfig {
    /// Set the hostname
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = short_string(hostname);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_needs_ssid() {
        assert!(!WifiConfig::default().is_configured());
        assert!(WifiConfig::default().with_ssid("lobby").is_configured());
        assert!(!WifiConfig::default()
            .with_ssid("lobby")
            .with_enabled(false)
            .is_configured());
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.reader.min_edge_us, 2100);
        assert_eq!(config.access.lookup_delay_ms, 500);
        assert_eq!(config.access.cooldown_ms, 1500);
        assert_eq!(config.door.tamper_alarm_ms, 10_000);
        assert_eq!(config.door.sensor_debounce_ms, 2000);
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mqtt_topic_building() {
        let mqtt = MqttConfig::default().with_topic_prefix("site/front");
        let topic = mqtt.topic("notify/scan");
        assert_eq!(topic.as_str(), "site/front/notify/scan");
    }

    #[test]
    fn mqtt_auth_detection() {
        assert!(!MqttConfig::default().has_auth());
        assert!(MqttConfig::default().with_auth("user", "pass").has_auth());
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
        let s = long_string(&"b".repeat(200));
        assert_eq!(s.len(), MAX_LONG_STRING);
    }

    #[test]
    fn string_helpers_utf8_boundary() {
        // 17 four-byte chars = 68 bytes, only 16 fit
        let input = "🔒".repeat(17);
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_mqtt(MqttConfig::default().with_host("broker.local").with_port(8883))
            .with_reader(ReaderConfig::default().with_radix(CredentialRadix::Hex))
            .with_device(DeviceConfig::default().with_hostname("front-door"));

        assert_eq!(config.mqtt.host.as_str(), "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.reader.radix, CredentialRadix::Hex);
        assert_eq!(config.device.hostname.as_str(), "front-door");
    }

    #[test]
    fn validity_policy_follows_config() {
        let access = AccessConfig::default()
            .with_unset_valid_until(UnsetValidUntil::Expired)
            .with_unsynced_clock(UnsyncedClock::Deny);
        let policy = access.validity_policy();
        assert_eq!(policy.unset_valid_until, UnsetValidUntil::Expired);
        assert_eq!(policy.unsynced_clock, UnsyncedClock::Deny);
        assert_eq!(policy.min_synced_epoch, 1_600_000_000);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn zero_timing_rejected() {
        let config = Config::default().with_reader(ReaderConfig::default().with_min_edge_us(0));
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTiming { field: "reader.min_edge_us" })
        );

        let config = Config::default().with_door(DoorConfig::default().with_tamper_alarm_ms(0));
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTiming { field: "door.tamper_alarm_ms" })
        );
    }

    #[test]
    fn missing_lock_rejected() {
        let mut relays = RelaysConfig::default();
        relays.lock.pin = None;
        let config = Config::default().with_relays(relays);
        assert_eq!(config.validate(), Err(ConfigError::MissingLockRelay));
    }

    #[test]
    fn duplicate_pin_rejected() {
        let config = Config::default().with_door(DoorConfig::default().with_sensor_pin(5));
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePin { pin: 5 }));

        let mut relays = RelaysConfig::default();
        relays.alarm = relays.alarm.with_pin(6);
        let config = Config::default().with_relays(relays);
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePin { pin: 6 }));
    }

    #[test]
    fn exit_button_pin_checked_for_collisions() {
        let door = DoorConfig::default().with_sensor_pin(3).with_exit_button_pin(3);
        let config = Config::default().with_door(door);
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePin { pin: 3 }));

        let door = DoorConfig::default().with_sensor_pin(3).with_exit_button_pin(9);
        assert_eq!(Config::default().with_door(door).validate(), Ok(()));
    }
}
