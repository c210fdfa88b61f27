//! Wire payloads for MQTT communication.
//!
//! These types are `no_std` compatible and are encoded and decoded with
//! `serde-json-core` into fixed-capacity buffers.
//!
//! # Example
//!
//! ```
//! use rs_doorman::messages::parse_user_record;
//!
//! let json = br#"{"credential":"8400953","username":"alice","validuntil":1900000000}"#;
//! let record = parse_user_record(json).unwrap();
//! assert_eq!(record.person.as_str(), "alice");
//! assert_eq!(record.valid_until, 1_900_000_000);
//! assert_eq!(record.banned, 0);
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "serde-json-core")]
use heapless::String as HString;

#[cfg(feature = "serde-json-core")]
use crate::access::AccessDecision;
#[cfg(feature = "serde-json-core")]
use crate::record::UserRecord;

/// Capacity of an encoded lookup request.
pub const LOOKUP_PAYLOAD_LEN: usize = 64;

/// Capacity of an encoded access event.
pub const EVENT_PAYLOAD_LEN: usize = 320;

/// Capacity of an encoded boot or heartbeat message.
pub const STATUS_PAYLOAD_LEN: usize = 128;

// ============================================================================
// Outbound
// ============================================================================

/// Ask the remote authority for a record.
///
/// ```json
/// {"credential": "8400953"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest<'a> {
    /// Credential to resolve
    pub credential: &'a str,
}

/// One final access verdict, as published on `notify/scan`.
///
/// ```json
/// {"result":"granted","id":"doorman","time":1700000000,
///  "detail":"validsince=unset (local DB)","credential":"8400953","person":"alice"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessEvent<'a> {
    /// Verdict name
    pub result: &'a str,
    /// Reporting device
    pub id: &'a str,
    /// Wall-clock seconds
    pub time: u64,
    /// Reason and source
    pub detail: &'a str,
    /// Presented credential
    pub credential: &'a str,
    /// Record holder or "N/A"
    pub person: &'a str,
}

/// Liveness report on `notify/boot` and `notify/heartbeat`.
///
/// ```json
/// {"time":1700000000,"uptime":3600,"id":"doorman"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusEvent<'a> {
    /// Wall-clock seconds
    pub time: u64,
    /// Seconds since boot
    pub uptime: u64,
    /// Reporting device
    pub id: &'a str,
}

#[cfg(feature = "serde-json-core")]
impl<'a> AccessEvent<'a> {
    /// Describe `decision` as reported by device `id` at `time`.
    pub fn from_decision(decision: &'a AccessDecision, id: &'a str, time: u64) -> Self {
        Self {
            result: decision.result.as_str(),
            id,
            time,
            detail: decision.detail.as_str(),
            credential: decision.credential.as_str(),
            person: decision.person.as_str(),
        }
    }
}

// ============================================================================
// Encoding / Parsing (serde-json-core)
// ============================================================================

/// Encode a lookup request.
///
/// # Example
///
/// ```
/// use rs_doorman::messages::encode_lookup_request;
///
/// let json = encode_lookup_request("12345").unwrap();
/// assert_eq!(json.as_str(), r#"{"credential":"12345"}"#);
/// ```
#[cfg(feature = "serde-json-core")]
pub fn encode_lookup_request(credential: &str) -> Option<HString<LOOKUP_PAYLOAD_LEN>> {
    serde_json_core::to_string(&LookupRequest { credential }).ok()
}

/// Encode an access event.
#[cfg(feature = "serde-json-core")]
pub fn encode_access_event(event: &AccessEvent<'_>) -> Option<HString<EVENT_PAYLOAD_LEN>> {
    serde_json_core::to_string(event).ok()
}

/// Encode a boot or heartbeat message.
#[cfg(feature = "serde-json-core")]
pub fn encode_status_event(event: &StatusEvent<'_>) -> Option<HString<STATUS_PAYLOAD_LEN>> {
    serde_json_core::to_string(event).ok()
}

/// Parse a user record document.
///
/// Missing fields take their defaults; anything that is not a JSON object
/// with the expected field types is rejected.
#[cfg(feature = "serde-json-core")]
pub fn parse_user_record(json: &[u8]) -> Option<UserRecord> {
    serde_json_core::from_slice(json).ok().map(|(record, _)| record)
}

/// Parse a lookup request, returning the credential.
#[cfg(feature = "serde-json-core")]
pub fn parse_lookup_request(json: &[u8]) -> Option<LookupRequest<'_>> {
    serde_json_core::from_slice(json).ok().map(|(req, _)| req)
}
