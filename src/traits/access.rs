//! Collaborator seams of the access decision engine.
//!
//! The engine never touches storage, the network or the door directly. It
//! asks a [`RecordStore`] for the local record, hands inconclusive
//! credentials to a [`RemoteLookup`], and reports final verdicts to an
//! [`AccessHandler`].

use crate::access::AccessDecision;
use crate::record::{Credential, UserRecord};

/// Outcome of a local record lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalLookup {
    /// A record exists and parsed.
    Found(UserRecord),
    /// A record exists but could not be read or parsed.
    Malformed,
    /// No record for this credential.
    NotFound,
}

/// Read-only local record source keyed by credential.
pub trait RecordStore {
    /// Look up the record for `credential`.
    ///
    /// Must not block for longer than a flash read.
    fn lookup(&mut self, credential: &Credential) -> LocalLookup;
}

/// Asynchronous remote record request.
///
/// The reply, if any, comes back later through
/// [`AccessController::submit_remote_record`](crate::access::AccessController::submit_remote_record).
pub trait RemoteLookup {
    /// Ask the remote authority for the record of `credential`.
    fn request(&mut self, credential: &Credential);
}

/// Receives exactly one final verdict per presented credential.
pub trait AccessHandler {
    /// Called when the verdict is [`AccessResult::Granted`](crate::record::AccessResult::Granted).
    fn access_granted(&mut self, decision: &AccessDecision);

    /// Called for every other verdict.
    fn access_denied(&mut self, decision: &AccessDecision);
}

/// Placeholder for an engine built without a remote authority.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRemote;

impl RemoteLookup for NoRemote {
    fn request(&mut self, _credential: &Credential) {}
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn lookup(&mut self, credential: &Credential) -> LocalLookup {
        (**self).lookup(credential)
    }
}

impl<R: RemoteLookup + ?Sized> RemoteLookup for &mut R {
    fn request(&mut self, credential: &Credential) {
        (**self).request(credential)
    }
}
