//! Tip-Hash Cache
//!
//! Small side-file remembering the last appended hash so a calling layer
//! can skip the tail read. It is never authoritative: an absent, corrupt
//! or stale cache only costs a tail read, and integrity questions are
//! always answered by `Ledger::verify`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::entry::{is_hex_hash, utc_timestamp};
use crate::ledger::{Ledger, LedgerEntry};

/// On-disk cache contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipState {
    pub last_event_hash: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct TipCache {
    path: PathBuf,
}

impl TipCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached state, or `None` if absent, unreadable or malformed
    pub fn load(&self) -> Option<TipState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Tip cache {:?} unreadable: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<TipState>(&contents) {
            Ok(state) if is_hex_hash(&state.last_event_hash) => Some(state),
            Ok(_) => {
                warn!("Tip cache {:?} holds a malformed hash; ignoring", self.path);
                None
            }
            Err(e) => {
                warn!("Tip cache {:?} is corrupt: {}", self.path, e);
                None
            }
        }
    }

    /// Replace the cache via write-to-temp and rename
    pub fn store(&self, hash: &str) -> LedgerResult<TipState> {
        let state = TipState {
            last_event_hash: hash.to_string(),
            updated_at: utc_timestamp(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let written = write_state(&tmp, &state)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(LedgerError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        debug!("Tip cache updated to {}", hash);
        Ok(state)
    }

    /// Per-call temp file beside the cache, so concurrent stores never share one
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tip".to_string());
        self.path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }

    /// Cached tip if usable, else the ledger's own tail read
    pub fn resolve_tip(&self, ledger: &Ledger) -> String {
        match self.load() {
            Some(state) => state.last_event_hash,
            None => ledger.latest_hash(),
        }
    }

    /// Append through the ledger, then refresh the cache.
    ///
    /// A cache write failure is logged, not returned: the entry is already
    /// durable and the cache is only a shortcut.
    pub fn append(&self, ledger: &Ledger, entry_type: &str, data: Value) -> LedgerResult<LedgerEntry> {
        let entry = ledger.append(entry_type, data)?;

        if let Err(e) = self.store(&entry.entry_hash) {
            warn!("Failed to refresh tip cache {:?}: {}", self.path, e);
        }
        Ok(entry)
    }
}

fn write_state(path: &Path, state: &TipState) -> LedgerResult<()> {
    let mut file = fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, state)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}
