//! Chain Verification
//!
//! Single forward pass over every line of the ledger, recomputing each
//! link. Stops at the first violation: once a link is broken the validity
//! of everything after it is undefined.

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::ledger::entry::{LedgerEntry, GENESIS_HASH};
use crate::ledger::lock::LockGuard;
use crate::ledger::Ledger;

/// Why verification stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Line is not a parseable entry; expected after a crash mid-append
    CorruptLineOrPartialWrite,
    /// Declared predecessor does not match: deletion, reordering or insertion
    PrevHashMismatch,
    /// Stored hash does not match content: in-place edit
    EntryHashMismatch,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CorruptLineOrPartialWrite => "CORRUPT_LINE_OR_PARTIAL_WRITE",
            Self::PrevHashMismatch => "PREV_HASH_MISMATCH",
            Self::EntryHashMismatch => "ENTRY_HASH_MISMATCH",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location and nature of the first broken link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// 1-based physical line number, blank lines included
    pub line: usize,
    pub reason: FailureReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Ok,
    EmptyLedger,
    Broken,
}

/// Outcome of a full verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub status: VerificationStatus,
    /// Valid entries seen before the run ended
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ChainBreak>,
}

impl VerificationResult {
    fn ok(entry_count: usize) -> Self {
        Self {
            is_valid: true,
            status: VerificationStatus::Ok,
            entry_count,
            failure: None,
        }
    }

    fn empty() -> Self {
        Self {
            is_valid: true,
            status: VerificationStatus::EmptyLedger,
            entry_count: 0,
            failure: None,
        }
    }

    fn broken(entry_count: usize, failure: ChainBreak) -> Self {
        Self {
            is_valid: false,
            status: VerificationStatus::Broken,
            entry_count,
            failure: Some(failure),
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        self.failure.as_ref().map(|f| f.reason)
    }

    pub fn broken_line(&self) -> Option<usize> {
        self.failure.as_ref().map(|f| f.line)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match &self.failure {
            None => format!("Ledger is valid ({} entries)", self.entry_count),
            Some(failure) => format!(
                "Ledger is broken at line {}: {} ({} valid entries before it)",
                failure.line, failure.reason, self.entry_count
            ),
        }
    }
}

impl Ledger {
    /// Recompute the whole chain from the file.
    ///
    /// Content problems are returned in the result, never as `Err`; only
    /// failures to read the file are errors. A missing file is a valid,
    /// empty ledger.
    pub fn verify(&self) -> LedgerResult<VerificationResult> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Ledger {:?} does not exist; nothing to verify", self.path);
                return Ok(VerificationResult::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let _guard = LockGuard::shared(self.locker(), &file);
        let result = verify_chain(BufReader::new(&file))?;

        match &result.failure {
            None => info!("Ledger {:?} verified: {} entries", self.path, result.entry_count),
            Some(failure) => warn!(
                "Ledger {:?} failed verification at line {}: {}",
                self.path, failure.line, failure.reason
            ),
        }
        Ok(result)
    }
}

/// Verify a JSONL stream starting from `GENESIS_HASH`
pub fn verify_chain<R: BufRead>(mut reader: R) -> io::Result<VerificationResult> {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut count = 0;
    let mut line_no = 0;
    let mut raw = Vec::new();

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

        let entry: LedgerEntry = match serde_json::from_slice(line) {
            Ok(entry) => entry,
            Err(e) => {
                return Ok(VerificationResult::broken(
                    count,
                    ChainBreak {
                        line: line_no,
                        reason: FailureReason::CorruptLineOrPartialWrite,
                        expected: None,
                        found: None,
                        detail: Some(e.to_string()),
                    },
                ));
            }
        };

        if entry.prev_hash != expected_prev {
            return Ok(VerificationResult::broken(
                count,
                ChainBreak {
                    line: line_no,
                    reason: FailureReason::PrevHashMismatch,
                    expected: Some(expected_prev),
                    found: Some(entry.prev_hash),
                    detail: Some(format!("entry {} ({})", entry.id, entry.entry_hash)),
                },
            ));
        }

        let recomputed = match entry.calculate_hash() {
            Ok(hash) => hash,
            Err(e) => {
                return Ok(VerificationResult::broken(
                    count,
                    ChainBreak {
                        line: line_no,
                        reason: FailureReason::CorruptLineOrPartialWrite,
                        expected: None,
                        found: None,
                        detail: Some(e.to_string()),
                    },
                ));
            }
        };

        if recomputed != entry.entry_hash {
            return Ok(VerificationResult::broken(
                count,
                ChainBreak {
                    line: line_no,
                    reason: FailureReason::EntryHashMismatch,
                    expected: Some(recomputed),
                    found: Some(entry.entry_hash),
                    detail: Some(format!("entry {}", entry.id)),
                },
            ));
        }

        expected_prev = entry.entry_hash;
        count += 1;
    }

    Ok(VerificationResult::ok(count))
}

pub(crate) fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}
