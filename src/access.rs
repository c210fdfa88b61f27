//! Access decision engine.
//!
//! Turns one presented credential at a time into a grant or deny verdict.
//! The engine is cooperative: [`AccessController::poll`] advances it by one
//! step per main-loop iteration and never blocks.
//!
//! ```text
//! wait_read             -- credential presented -----> lookup_local
//! lookup_local          -- record found -------------> process_record_local
//! lookup_local          -- missing or malformed -----> wait_remote | cool_down
//! process_record_local  -- granted or banned --------> cool_down
//! process_record_local  -- anything else ------------> wait_remote | cool_down
//! wait_remote           -- matching record arrives --> process_record_remote
//! wait_remote           -- lookup delay elapsed -----> timeout_remote
//! timeout_remote        -- last verdict delivered ---> cool_down
//! process_record_remote -- verdict delivered --------> cool_down
//! cool_down             -- dwell elapsed ------------> wait_read
//! ```
//!
//! Remote replies are queued with
//! [`submit_remote_record`](AccessController::submit_remote_record) and
//! drained at the top of the next poll. A reply is only accepted while the
//! engine is waiting on exactly that credential; anything else is dropped.
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::access::{AccessController, ControlState};
//! use rs_doorman::config::AccessConfig;
//! use rs_doorman::hal::{MockAccessHandler, MockRecordStore};
//! use rs_doorman::record::{AccessResult, UserRecord};
//! use rs_doorman::traits::NoRemote;
//!
//! let mut store = MockRecordStore::new();
//! store.insert(UserRecord::new("8400953", "alice"));
//!
//! let mut engine: AccessController<_, NoRemote> =
//!     AccessController::new(AccessConfig::default(), store);
//! let mut handler = MockAccessHandler::new();
//!
//! engine.present("8400953");
//! engine.poll(0, 1_700_000_000, &mut handler); // lookup_local
//! engine.poll(1, 1_700_000_000, &mut handler); // process_record_local
//!
//! assert_eq!(handler.granted.len(), 1);
//! assert_eq!(handler.granted[0].result, AccessResult::Granted);
//! assert_eq!(engine.state(), ControlState::CoolDown);
//! ```

use core::fmt::Write as _;

use heapless::Deque;

use crate::config::AccessConfig;
use crate::record::{
    describe, evaluate, truncated, AccessResult, Credential, CredentialRadix, Detail, PersonName,
    UserRecord, ValidityPolicy, UNKNOWN_PERSON,
};
use crate::traits::{AccessHandler, LocalLookup, RecordStore, RemoteLookup};
use crate::wiegand::WiegandRead;

/// Remote replies buffered between polls.
const INBOX_LEN: usize = 4;

/// Engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    /// Idle, ready for a credential.
    WaitRead,
    /// Query the local store.
    LookupLocal,
    /// Evaluate the local record.
    ProcessRecordLocal,
    /// Waiting for the remote authority.
    WaitRemote,
    /// Evaluate the remote record.
    ProcessRecordRemote,
    /// The remote authority did not answer in time.
    TimeoutRemote,
    /// Dwell after a verdict.
    CoolDown,
}

impl ControlState {
    /// Label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            ControlState::WaitRead => "wait_read",
            ControlState::LookupLocal => "lookup_local",
            ControlState::ProcessRecordLocal => "process_record_local",
            ControlState::WaitRemote => "wait_remote",
            ControlState::ProcessRecordRemote => "process_record_remote",
            ControlState::TimeoutRemote => "timeout_remote",
            ControlState::CoolDown => "cool_down",
        }
    }
}

/// Where a final verdict came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionSource {
    /// The local store settled it.
    Local,
    /// A record from the remote authority.
    Remote,
    /// The remote authority timed out; the last local verdict stands.
    RemoteTimeout,
    /// The request-to-exit button, no credential involved.
    ExitButton,
}

impl DecisionSource {
    /// Suffix appended to the detail text.
    pub fn suffix(self) -> &'static str {
        match self {
            DecisionSource::Local => " (local DB)",
            DecisionSource::Remote => " (remote DB)",
            DecisionSource::RemoteTimeout => " (remote DB timeout)",
            DecisionSource::ExitButton => "",
        }
    }
}

/// A final verdict, handed to the [`AccessHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessDecision {
    /// The verdict.
    pub result: AccessResult,
    /// Reason and source, e.g. `"validuntil=1690000000 (local DB)"`.
    pub detail: Detail,
    /// Credential that was presented.
    pub credential: Credential,
    /// Record holder, or `"N/A"`.
    pub person: PersonName,
    /// Where the verdict came from.
    pub source: DecisionSource,
}

impl AccessDecision {
    /// Grant raised by the exit button, reported like a card verdict.
    pub fn exit_button() -> Self {
        Self {
            result: AccessResult::Granted,
            detail: truncated("exit button"),
            credential: truncated("Button"),
            person: truncated(UNKNOWN_PERSON),
            source: DecisionSource::ExitButton,
        }
    }

    /// Returns true if access was granted.
    pub fn is_granted(&self) -> bool {
        self.result.is_granted()
    }
}

/// What happened to a presented credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Taken; a decision will follow.
    Accepted,
    /// A previous credential is still being decided. Dropped, not queued.
    Busy,
    /// Zero facility code or empty credential.
    BadRead,
}

/// The decision engine.
pub struct AccessController<S: RecordStore, R: RemoteLookup> {
    config: AccessConfig,
    policy: ValidityPolicy,
    store: S,
    remote: Option<R>,
    state: ControlState,
    credential: Credential,
    record: Option<UserRecord>,
    armed: Option<Credential>,
    inbox: Deque<(Credential, UserRecord), INBOX_LEN>,
    result: AccessResult,
    since_ms: u64,
}

impl<S: RecordStore, R: RemoteLookup> AccessController<S, R> {
    /// Create an engine with a local store and no remote authority.
    pub fn new(config: AccessConfig, store: S) -> Self {
        Self {
            policy: config.validity_policy(),
            config,
            store,
            remote: None,
            state: ControlState::WaitRead,
            credential: Credential::new(),
            record: None,
            armed: None,
            inbox: Deque::new(),
            result: AccessResult::Unrecognized,
            since_ms: 0,
        }
    }

    /// Attach a remote authority.
    pub fn with_remote(mut self, remote: R) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Current state.
    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Credential being decided (empty when idle).
    pub fn credential(&self) -> &str {
        self.credential.as_str()
    }

    /// Credential currently awaited from the remote authority.
    pub fn armed(&self) -> Option<&str> {
        self.armed.as_ref().map(|c| c.as_str())
    }

    /// The local store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The remote authority, if attached.
    pub fn remote_mut(&mut self) -> Option<&mut R> {
        self.remote.as_mut()
    }

    /// Hand over a decoded card read.
    pub fn on_read(&mut self, read: &WiegandRead, radix: CredentialRadix) -> ReadOutcome {
        if read.facility_code == 0 {
            log::warn!("access: bad read, facility code was zero");
            return ReadOutcome::BadRead;
        }
        self.present(read.credential(radix).as_str())
    }

    /// Present a credential directly.
    ///
    /// Only accepted in `wait_read`; otherwise the credential is discarded
    /// and the pending decision is left untouched.
    pub fn present(&mut self, credential: &str) -> ReadOutcome {
        if self.state != ControlState::WaitRead {
            log::warn!(
                "access: read {} discarded, still handling {} ({})",
                credential,
                self.credential,
                self.state.label()
            );
            return ReadOutcome::Busy;
        }
        if credential.is_empty() {
            log::warn!("access: bad read, empty credential");
            return ReadOutcome::BadRead;
        }
        self.credential = truncated(credential);
        log::info!("access: credential {} presented", self.credential);
        self.state = ControlState::LookupLocal;
        ReadOutcome::Accepted
    }

    /// Queue a record from the remote authority.
    ///
    /// Returns false if the inbox is full. Whether the record is used is
    /// decided on the next poll.
    pub fn submit_remote_record(&mut self, credential: &str, mut record: UserRecord) -> bool {
        if record.credential.is_empty() {
            record.credential = truncated(credential);
        }
        if self.inbox.push_back((truncated(credential), record)).is_err() {
            log::warn!("access: remote inbox full, dropping record for {}", credential);
            return false;
        }
        true
    }

    /// Advance one step.
    pub fn poll<H: AccessHandler>(&mut self, now_ms: u64, epoch_secs: u64, handler: &mut H) {
        self.drain_inbox();

        match self.state {
            ControlState::WaitRead => {}
            ControlState::LookupLocal => {
                self.record = None;
                match self.store.lookup(&self.credential) {
                    LocalLookup::Found(record) => {
                        self.record = Some(record);
                        self.state = ControlState::ProcessRecordLocal;
                    }
                    outcome => {
                        if outcome == LocalLookup::Malformed {
                            log::warn!("access: local record for {} is malformed", self.credential);
                        }
                        self.result = AccessResult::Unrecognized;
                        self.since_ms = now_ms;
                        self.escalate_or_finish(now_ms, handler);
                    }
                }
            }
            ControlState::ProcessRecordLocal => {
                self.result = self.evaluate(epoch_secs);
                self.since_ms = now_ms;
                if self.result.is_conclusive() {
                    self.finish(DecisionSource::Local, now_ms, handler);
                } else {
                    self.escalate_or_finish(now_ms, handler);
                }
            }
            ControlState::WaitRemote => {
                if now_ms.saturating_sub(self.since_ms) > u64::from(self.config.lookup_delay_ms) {
                    log::debug!("access: remote lookup for {} timed out", self.credential);
                    self.state = ControlState::TimeoutRemote;
                }
            }
            ControlState::TimeoutRemote => {
                self.finish(DecisionSource::RemoteTimeout, now_ms, handler);
            }
            ControlState::ProcessRecordRemote => {
                self.result = self.evaluate(epoch_secs);
                self.finish(DecisionSource::Remote, now_ms, handler);
            }
            ControlState::CoolDown => {
                if now_ms.saturating_sub(self.since_ms) > u64::from(self.config.cooldown_ms) {
                    self.credential.clear();
                    self.state = ControlState::WaitRead;
                }
            }
        }
    }

    fn evaluate(&self, epoch_secs: u64) -> AccessResult {
        match &self.record {
            Some(record) => evaluate(record, epoch_secs, &self.policy),
            None => AccessResult::Unrecognized,
        }
    }

    /// Hand an inconclusive local verdict to the remote authority, or make
    /// it final if there is none.
    fn escalate_or_finish<H: AccessHandler>(&mut self, now_ms: u64, handler: &mut H) {
        if !self.config.remote_enabled {
            self.finish(DecisionSource::Local, now_ms, handler);
            return;
        }
        let Some(remote) = self.remote.as_mut() else {
            self.finish(DecisionSource::Local, now_ms, handler);
            return;
        };
        log::debug!(
            "access: {} is {} locally, waiting remote",
            self.credential,
            self.result
        );
        self.armed = Some(self.credential.clone());
        remote.request(&self.credential);
        self.state = ControlState::WaitRemote;
    }

    fn drain_inbox(&mut self) {
        while let Some((credential, record)) = self.inbox.pop_front() {
            let matches = self.state == ControlState::WaitRemote
                && self.armed.as_ref() == Some(&credential);
            if matches {
                log::debug!("access: remote record for {} arrived", credential);
                self.record = Some(record);
                self.state = ControlState::ProcessRecordRemote;
            } else {
                log::warn!("access: ignoring unexpected remote record for {}", credential);
            }
        }
    }

    fn finish<H: AccessHandler>(&mut self, source: DecisionSource, now_ms: u64, handler: &mut H) {
        let mut detail = describe(self.result, self.record.as_ref());
        let _ = detail.write_str(source.suffix());
        let person = self
            .record
            .as_ref()
            .map_or(UNKNOWN_PERSON, |r| r.person_or_unknown());

        let decision = AccessDecision {
            result: self.result,
            detail,
            credential: self.credential.clone(),
            person: truncated(person),
            source,
        };
        log::info!(
            "access: {} {} for {} ({})",
            decision.result,
            decision.person,
            decision.credential,
            decision.detail
        );

        if decision.is_granted() {
            handler.access_granted(&decision);
        } else {
            handler.access_denied(&decision);
        }

        self.armed = None;
        self.since_ms = now_ms;
        self.state = ControlState::CoolDown;
    }
}
