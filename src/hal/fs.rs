//! File-per-credential record store.
//!
//! Records live at `<root>/P/<credential>`, one JSON document each. On the
//! device `root` is a mounted flash partition; on desktop any directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::RecordError;
use crate::messages::parse_user_record;
use crate::record::{Credential, UserRecord};
use crate::traits::{LocalLookup, RecordStore};

const RECORD_DIR: &str = "P";
const RECORD_BUF_LEN: usize = 256;

/// Local record store on a filesystem.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    /// Store rooted at `root`. Nothing is touched until the first access.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> PathBuf {
        self.root.join(RECORD_DIR)
    }

    fn path(&self, credential: &str) -> PathBuf {
        self.dir().join(credential)
    }

    /// Read the record for `credential`; `Ok(None)` if there is none.
    pub fn load(&self, credential: &str) -> Result<Option<UserRecord>, RecordError> {
        let bytes = match fs::read(self.path(credential)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                log::error!("store: reading record {} failed: {}", credential, e);
                return Err(RecordError::Io);
            }
        };
        parse_user_record(&bytes)
            .map(Some)
            .ok_or(RecordError::Malformed)
    }

    /// Write `record` under its credential, replacing any previous one.
    pub fn save(&self, record: &UserRecord) -> Result<(), RecordError> {
        if record.credential.is_empty() || !is_plain_name(record.credential.as_str()) {
            return Err(RecordError::Malformed);
        }
        let mut buf = [0u8; RECORD_BUF_LEN];
        let len = serde_json_core::to_slice(record, &mut buf).map_err(|_| RecordError::Malformed)?;

        fs::create_dir_all(self.dir()).map_err(|_| RecordError::Io)?;
        fs::write(self.path(record.credential.as_str()), &buf[..len]).map_err(|e| {
            log::error!("store: writing record {} failed: {}", record.credential, e);
            RecordError::Io
        })
    }

    /// Stamp `record` with the time it reached this device and save it.
    pub fn save_update(&self, record: &mut UserRecord, epoch_secs: u64) -> Result<(), RecordError> {
        record.last_updated = Some(epoch_secs);
        self.save(record)
    }

    /// Delete the record for `credential`, if any.
    pub fn remove(&self, credential: &str) -> Result<(), RecordError> {
        if credential.is_empty() || !is_plain_name(credential) {
            return Err(RecordError::Malformed);
        }
        match fs::remove_file(self.path(credential)) {
            Ok(()) => {
                log::info!("store: removed record {}", credential);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                log::error!("store: removing record {} failed: {}", credential, e);
                Err(RecordError::Io)
            }
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

// A credential must not escape the record directory.
fn is_plain_name(credential: &str) -> bool {
    credential.chars().all(|c| c.is_ascii_alphanumeric())
}

impl RecordStore for FsRecordStore {
    fn lookup(&mut self, credential: &Credential) -> LocalLookup {
        if !is_plain_name(credential.as_str()) {
            return LocalLookup::NotFound;
        }
        match self.load(credential.as_str()) {
            Ok(Some(record)) => LocalLookup::Found(record),
            Ok(None) => LocalLookup::NotFound,
            Err(_) => LocalLookup::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::truncated;

    fn scratch(name: &str) -> FsRecordStore {
        let root = std::env::temp_dir().join(format!("rs-doorman-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        FsRecordStore::new(root)
    }

    #[test]
    fn missing_record_not_found() {
        let mut store = scratch("missing");
        assert_eq!(store.lookup(&truncated("123")), LocalLookup::NotFound);
    }

    #[test]
    fn save_then_lookup() {
        let mut store = scratch("save");
        let record = UserRecord::new("8400953", "alice").with_valid_until(1_900_000_000);
        store.save(&record).unwrap();

        assert_eq!(store.lookup(&truncated("8400953")), LocalLookup::Found(record));

        store.remove("8400953").unwrap();
        assert_eq!(store.lookup(&truncated("8400953")), LocalLookup::NotFound);
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn unparsable_document_is_malformed() {
        let mut store = scratch("malformed");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("77"), b"{\"username\":").unwrap();

        assert_eq!(store.lookup(&truncated("77")), LocalLookup::Malformed);
        assert_eq!(store.load("77"), Err(RecordError::Malformed));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn path_like_credentials_rejected() {
        let mut store = scratch("escape");
        assert_eq!(store.lookup(&truncated("../etc")), LocalLookup::NotFound);
        let record = UserRecord::new("../x", "mallory");
        assert_eq!(store.save(&record), Err(RecordError::Malformed));
        assert_eq!(store.remove("../P"), Err(RecordError::Malformed));
        assert_eq!(store.remove(""), Err(RecordError::Malformed));
    }

    #[test]
    fn update_is_stamped_with_arrival_time() {
        let store = scratch("stamp");
        let mut record = UserRecord::new("42", "bob").with_last_updated(1);
        store.save_update(&mut record, 1_700_000_123).unwrap();

        assert_eq!(record.last_updated, Some(1_700_000_123));
        let stored = store.load("42").unwrap().unwrap();
        assert_eq!(stored.last_updated, Some(1_700_000_123));
        assert_eq!(stored.person.as_str(), "bob");

        let raw = fs::read_to_string(store.dir().join("42")).unwrap();
        assert!(raw.contains(r#""local_update":1700000123"#));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn removing_missing_record_is_ok() {
        let store = scratch("remove-missing");
        assert_eq!(store.remove("999"), Ok(()));
    }
}
