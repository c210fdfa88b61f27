//! Credentials, user records and the verdict rules applied to them.
//!
//! A [`UserRecord`] is the administrative document for one credential,
//! whether it came from the local store or the remote authority. The
//! engine evaluates it with [`evaluate`] against the current wall-clock time
//! and a [`ValidityPolicy`].
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::record::{evaluate, AccessResult, UserRecord, ValidityPolicy};
//!
//! let policy = ValidityPolicy::default();
//! let now = 1_700_000_000;
//!
//! let record = UserRecord::new("12345", "alice").with_valid_until(now - 1);
//! assert_eq!(evaluate(&record, now, &policy), AccessResult::Expired);
//!
//! let record = UserRecord::new("12345", "alice").with_banned(1);
//! assert_eq!(evaluate(&record, now, &policy), AccessResult::Banned);
//! ```

use core::fmt::{self, Write as _};

use heapless::String as HString;

/// Maximum length of an encoded credential.
///
/// A 64-bit code in decimal is at most 20 digits.
pub const MAX_CREDENTIAL_LEN: usize = 24;

/// Maximum length of a person name carried in a record.
pub const MAX_PERSON_LEN: usize = 32;

/// Maximum length of a decision detail string.
pub const MAX_DETAIL_LEN: usize = 64;

/// Text key used for local and remote lookups.
pub type Credential = HString<MAX_CREDENTIAL_LEN>;

/// Display name of the record holder.
pub type PersonName = HString<MAX_PERSON_LEN>;

/// Human-readable explanation attached to every decision.
pub type Detail = HString<MAX_DETAIL_LEN>;

/// Person name reported when no record (or no name) is known.
pub const UNKNOWN_PERSON: &str = "N/A";

/// Wall-clock value below which the clock is considered unsynchronised.
///
/// 2020-09-13, comfortably before any firmware build.
pub const DEFAULT_MIN_SYNCED_EPOCH: u64 = 1_600_000_000;

/// Copy `s` into a fixed-capacity string, truncating on a char boundary.
pub fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut out = HString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ============================================================================
// Credential encoding
// ============================================================================

/// How a numeric card code is rendered as a [`Credential`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CredentialRadix {
    /// Base 10, e.g. `"8400946"`.
    #[default]
    Decimal,
    /// Lowercase base 16, e.g. `"803032"`.
    Hex,
}

impl CredentialRadix {
    /// Render `code` in this radix.
    pub fn encode(self, code: u64) -> Credential {
        let mut out = Credential::new();
        // Capacity covers u64::MAX in either radix
        let _ = match self {
            CredentialRadix::Decimal => write!(out, "{}", code),
            CredentialRadix::Hex => write!(out, "{:x}", code),
        };
        out
    }
}

// ============================================================================
// User Record
// ============================================================================

/// One administrative record per credential.
///
/// Timestamps are Unix epoch seconds; `0` means unset. Field names on the
/// wire follow the record documents the back office produces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UserRecord {
    /// Credential the record belongs to.
    pub credential: Credential,
    /// Display name of the holder.
    #[cfg_attr(feature = "serde", serde(rename = "username"))]
    pub person: PersonName,
    /// Start of the validity window (0 = unset).
    #[cfg_attr(feature = "serde", serde(rename = "validsince"))]
    pub valid_since: u64,
    /// End of the validity window (0 = unset).
    #[cfg_attr(feature = "serde", serde(rename = "validuntil"))]
    pub valid_until: u64,
    /// Ban severity; any nonzero value bans the credential.
    #[cfg_attr(feature = "serde", serde(rename = "is_banned"))]
    pub banned: u8,
    /// When the record was last written to the local store.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "local_update", skip_serializing_if = "Option::is_none")
    )]
    pub last_updated: Option<u64>,
}

impl UserRecord {
    /// Create an unbounded, unbanned record.
    pub fn new(credential: &str, person: &str) -> Self {
        Self {
            credential: truncated(credential),
            person: truncated(person),
            ..Self::default()
        }
    }

    /// Set the start of the validity window.
    pub fn with_valid_since(mut self, epoch_secs: u64) -> Self {
        self.valid_since = epoch_secs;
        self
    }

    /// Set the end of the validity window.
    pub fn with_valid_until(mut self, epoch_secs: u64) -> Self {
        self.valid_until = epoch_secs;
        self
    }

    /// Set the ban severity.
    pub fn with_banned(mut self, severity: u8) -> Self {
        self.banned = severity;
        self
    }

    /// Set the local update timestamp.
    pub fn with_last_updated(mut self, epoch_secs: u64) -> Self {
        self.last_updated = Some(epoch_secs);
        self
    }

    /// Name to report, falling back to [`UNKNOWN_PERSON`].
    pub fn person_or_unknown(&self) -> &str {
        if self.person.is_empty() {
            UNKNOWN_PERSON
        } else {
            self.person.as_str()
        }
    }
}

// ============================================================================
// Access Result
// ============================================================================

/// Verdict for one presented credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessResult {
    /// No usable record, locally or remotely.
    Unrecognized,
    /// The record carries a nonzero ban flag.
    Banned,
    /// The validity window has ended.
    Expired,
    /// The validity window has not started yet.
    NotYetValid,
    /// The local clock cannot be trusted to check the validity window.
    TimeNotValid,
    /// Access granted.
    Granted,
}

impl AccessResult {
    /// Wire/log name of the verdict.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessResult::Unrecognized => "unrecognized",
            AccessResult::Banned => "banned",
            AccessResult::Expired => "expired",
            AccessResult::NotYetValid => "not_yet_valid",
            AccessResult::TimeNotValid => "time_not_valid",
            AccessResult::Granted => "granted",
        }
    }

    /// Returns true for [`AccessResult::Granted`].
    pub fn is_granted(self) -> bool {
        self == AccessResult::Granted
    }

    /// Granted and banned are final; anything else may be overturned by
    /// the remote authority.
    pub fn is_conclusive(self) -> bool {
        matches!(self, AccessResult::Granted | AccessResult::Banned)
    }
}

impl fmt::Display for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Validity Policy
// ============================================================================

/// Meaning of `valid_until == 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnsetValidUntil {
    /// No end date: the record never expires.
    #[default]
    Unbounded,
    /// A missing end date counts as already expired.
    Expired,
}

/// What to do with a bounded record while the clock is unsynchronised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnsyncedClock {
    /// Resolve a not-yet-valid window to granted.
    #[default]
    FailOpen,
    /// Report a future start date as `time_not_valid`.
    Deny,
}

/// Knobs for [`evaluate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityPolicy {
    /// Wall-clock seconds below which the clock counts as unsynchronised.
    pub min_synced_epoch: u64,
    /// Interpretation of an unset end date.
    pub unset_valid_until: UnsetValidUntil,
    /// Behaviour while the clock is unsynchronised.
    pub unsynced_clock: UnsyncedClock,
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self {
            min_synced_epoch: DEFAULT_MIN_SYNCED_EPOCH,
            unset_valid_until: UnsetValidUntil::Unbounded,
            unsynced_clock: UnsyncedClock::FailOpen,
        }
    }
}

impl ValidityPolicy {
    /// Returns true if `now_epoch` looks like a synchronised wall clock.
    pub fn is_synced(&self, now_epoch: u64) -> bool {
        now_epoch >= self.min_synced_epoch
    }
}

/// Classify `record` at time `now_epoch`.
///
/// Precedence: banned, then expiry, then not-yet-valid, then granted. A
/// future start date seen through an unsynchronised clock resolves to
/// granted, or to `time_not_valid` under [`UnsyncedClock::Deny`].
pub fn evaluate(record: &UserRecord, now_epoch: u64, policy: &ValidityPolicy) -> AccessResult {
    if record.banned != 0 {
        return AccessResult::Banned;
    }

    let expired = match record.valid_until {
        0 => policy.unset_valid_until == UnsetValidUntil::Expired,
        until => until < now_epoch,
    };
    if expired {
        return AccessResult::Expired;
    }

    if record.valid_since != 0 && record.valid_since > now_epoch {
        if policy.is_synced(now_epoch) {
            return AccessResult::NotYetValid;
        }
        return match policy.unsynced_clock {
            UnsyncedClock::FailOpen => AccessResult::Granted,
            UnsyncedClock::Deny => AccessResult::TimeNotValid,
        };
    }

    AccessResult::Granted
}

/// Build the detail text for a verdict, without the source suffix.
pub fn describe(result: AccessResult, record: Option<&UserRecord>) -> Detail {
    let mut detail = Detail::new();
    // Detail capacity fits every variant below
    match (result, record) {
        (AccessResult::Unrecognized, _) | (_, None) => {
            let _ = detail.push_str(result.as_str());
        }
        (AccessResult::Banned, Some(r)) => {
            let _ = write!(detail, "is_banned={}", r.banned);
        }
        (AccessResult::Expired, Some(r)) => write_bound(&mut detail, "validuntil", r.valid_until),
        (AccessResult::TimeNotValid, Some(_)) => {
            let _ = detail.push_str("clock unsynced");
        }
        (AccessResult::NotYetValid | AccessResult::Granted, Some(r)) => {
            write_bound(&mut detail, "validsince", r.valid_since)
        }
    }
    detail
}

fn write_bound(out: &mut Detail, name: &str, value: u64) {
    let _ = if value == 0 {
        write!(out, "{}=unset", name)
    } else {
        write!(out, "{}={}", name, value)
    };
}
