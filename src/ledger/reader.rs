//! Bulk Reader
//!
//! Loads entries in file order for inspection and export. Does not
//! verify the chain.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::entry::LedgerEntry;
use crate::ledger::lock::LockGuard;
use crate::ledger::verify::trim_ascii;
use crate::ledger::Ledger;

impl Ledger {
    /// Read all entries, or only the last `limit` of them.
    ///
    /// `Some(0)` is treated like `None`. A line that fails to parse is an
    /// error; no partial recovery is attempted.
    pub fn read(&self, limit: Option<usize>) -> LedgerResult<Vec<LedgerEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let _guard = LockGuard::shared(self.locker(), &file);
        let entries = read_entries(BufReader::new(&file), limit)?;

        debug!("Loaded {} entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }

    /// Entries whose `type` matches `entry_type`, in file order
    pub fn read_by_type(&self, entry_type: &str) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .read(None)?
            .into_iter()
            .filter(|entry| entry.entry_type == entry_type)
            .collect())
    }
}

/// Parse every non-blank line, keeping at most the last `limit` entries
pub fn read_entries<R: BufRead>(mut reader: R, limit: Option<usize>) -> LedgerResult<Vec<LedgerEntry>> {
    let bound = limit.filter(|n| *n > 0);
    let mut entries = VecDeque::new();
    let mut raw = Vec::new();
    let mut line_no = 0;

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        line_no += 1;

        let line = trim_ascii(&raw);
        if line.is_empty() {
            continue;
        }

        let entry: LedgerEntry = serde_json::from_slice(line).map_err(|e| LedgerError::Parse {
            line: line_no,
            message: e.to_string(),
        })?;

        if let Some(n) = bound {
            if entries.len() == n {
                entries.pop_front();
            }
        }
        entries.push_back(entry);
    }

    Ok(entries.into())
}
