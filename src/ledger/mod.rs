//! Void Ledger
//!
//! Tamper-evident, append-only JSONL ledger with a SHA-256 hash chain.
//! The ledger file is the single source of truth: one JSON object per
//! line, oldest first, each line linked to its predecessor through
//! `prev_hash`.

pub mod canonical;
pub mod entry;
pub mod lock;
pub mod reader;
pub mod tail;
pub mod verify;
pub mod writer;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde_json::json;
use tracing::info;

use crate::config::{LedgerConfig, DEFAULT_TAIL_WINDOW};
use crate::error::LedgerResult;

pub use entry::{is_hex_hash, LedgerEntry, GENESIS_HASH};
pub use lock::{locker_for, AdvisoryLock, FileLocker, LockMode, NoLock};
pub use verify::{ChainBreak, FailureReason, VerificationResult, VerificationStatus};

/// Handle on a single ledger file.
///
/// Cheap to clone; holds no open file descriptors between calls.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    locker: Arc<dyn FileLocker>,
    tail_window: u64,
}

impl Ledger {
    /// Ledger at `path` with advisory locking and the default tail window
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locker: locker_for(LockMode::Advisory),
            tail_window: DEFAULT_TAIL_WINDOW,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;

        let ledger = Self {
            path: config.ledger_path.clone(),
            locker: locker_for(config.locking),
            tail_window: config.tail_window_bytes,
        };

        info!(
            "Ledger at {:?} (locking: {}, tail window: {} bytes)",
            ledger.path,
            ledger.locker.name(),
            ledger.tail_window
        );
        Ok(ledger)
    }

    pub fn with_locker(mut self, locker: Arc<dyn FileLocker>) -> Self {
        self.locker = locker;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn locker(&self) -> &dyn FileLocker {
        self.locker.as_ref()
    }

    /// True when the file is absent or holds only whitespace
    pub fn is_empty(&self) -> LedgerResult<bool> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes.iter().all(u8::is_ascii_whitespace)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a `genesis` entry if the ledger holds no entries yet.
    ///
    /// Safe to race: only one concurrent caller writes the entry.
    pub fn init_genesis(&self) -> LedgerResult<Option<LedgerEntry>> {
        let entry = self.append_if_empty("genesis", json!({"msg": "Void ledger initialized"}))?;
        if let Some(entry) = &entry {
            info!("Initialized ledger {:?} with genesis entry {}", self.path, entry.id);
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_genesis_once() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let genesis = ledger.init_genesis().unwrap().expect("genesis appended");
        assert_eq!(genesis.entry_type, "genesis");
        assert_eq!(genesis.prev_hash, GENESIS_HASH);
        assert_eq!(genesis.data["msg"], "Void ledger initialized");

        assert!(ledger.init_genesis().unwrap().is_none());
        assert_eq!(ledger.read(None).unwrap().len(), 1);
    }

    #[test]
    fn test_init_genesis_on_whitespace_only_file() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));
        fs::write(ledger.path(), "\n").unwrap();
        assert!(ledger.is_empty().unwrap());

        let genesis = ledger.init_genesis().unwrap().expect("genesis appended");
        assert_eq!(genesis.prev_hash, GENESIS_HASH);
        assert!(!ledger.is_empty().unwrap());

        let result = ledger.verify().unwrap();
        assert!(result.is_valid);
        assert_eq!(result.entry_count, 1);
    }

    #[test]
    fn test_concurrent_init_writes_one_genesis() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.init_genesis().unwrap().is_some())
            })
            .collect();
        let written = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();

        assert_eq!(written, 1);
        assert_eq!(ledger.read(None).unwrap().len(), 1);
    }

    #[test]
    fn test_single_writer_correct_without_locking() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl")).with_locker(Arc::new(NoLock));

        for i in 0..5 {
            ledger.append("request", json!({"i": i})).unwrap();
        }

        let result = ledger.verify().unwrap();
        assert!(result.is_valid);
        assert_eq!(result.entry_count, 5);
    }

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().join("l.jsonl")).with_locking(LockMode::Disabled);

        let ledger = Ledger::from_config(&config).unwrap();
        assert_eq!(ledger.locker().name(), "none");
        assert_eq!(ledger.path(), dir.path().join("l.jsonl"));
        assert!(ledger.is_empty().unwrap());
    }
}
