//! Ledger Writer
//!
//! Appends one entry per call. The tip lookup, hashing, write and fsync
//! all happen while the exclusive lock is held, so concurrent writers
//! that honor the lock extend a single linear chain.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use serde_json::Value;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::entry::LedgerEntry;
use crate::ledger::lock::LockGuard;
use crate::ledger::tail::tail_hash_or_genesis;
use crate::ledger::Ledger;

impl Ledger {
    /// Append an event and return the stored entry.
    ///
    /// Returns only after the line has been flushed and synced to disk. On
    /// error nothing may be assumed about what was persisted; run `verify`.
    pub fn append(&self, entry_type: &str, data: Value) -> LedgerResult<LedgerEntry> {
        validate_event(entry_type, &data)?;

        let file = self.open_for_append()?;
        let guard = LockGuard::exclusive(self.locker(), &file);
        let entry = self.write_entry(&file, entry_type, data)?;
        drop(guard);

        debug!("Appended ledger entry: {}", entry.summary());
        Ok(entry)
    }

    /// Append only when the file holds no non-blank line.
    ///
    /// The emptiness check and the write share one exclusive lock, so two
    /// racing callers produce at most one entry.
    pub(crate) fn append_if_empty(
        &self,
        entry_type: &str,
        data: Value,
    ) -> LedgerResult<Option<LedgerEntry>> {
        validate_event(entry_type, &data)?;

        let file = self.open_for_append()?;
        let guard = LockGuard::exclusive(self.locker(), &file);
        if has_content(&mut &file)? {
            return Ok(None);
        }
        let entry = self.write_entry(&file, entry_type, data)?;
        drop(guard);

        debug!("Appended ledger entry: {}", entry.summary());
        Ok(Some(entry))
    }

    fn open_for_append(&self) -> LedgerResult<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        Ok(file)
    }

    /// Chain, write and sync one entry; the caller holds the exclusive lock
    fn write_entry(&self, file: &File, entry_type: &str, data: Value) -> LedgerResult<LedgerEntry> {
        let mut handle = file;

        let prev_hash = tail_hash_or_genesis(&mut handle, self.tail_window);
        let entry = LedgerEntry::new(entry_type, data, &prev_hash)?;

        let mut line = entry.to_line()?;
        // keep a torn final line from swallowing this record
        if !ends_with_newline(&mut handle)? {
            line.insert(0, '\n');
        }

        handle.write_all(line.as_bytes())?;
        handle.flush()?;
        file.sync_all()?;

        Ok(entry)
    }
}

fn validate_event(entry_type: &str, data: &Value) -> LedgerResult<()> {
    if entry_type.trim().is_empty() {
        return Err(LedgerError::empty_event_type());
    }
    if !data.is_object() {
        return Err(LedgerError::payload_not_object(json_kind(data)));
    }
    Ok(())
}

/// True when any line holds something other than ASCII whitespace
fn has_content<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    reader.seek(SeekFrom::Start(0))?;

    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(false);
        }
        if !buf[..n].iter().all(u8::is_ascii_whitespace) {
            return Ok(true);
        }
    }
}

fn ends_with_newline<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let size = reader.seek(SeekFrom::End(0))?;
    if size == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    reader.seek(SeekFrom::End(-1))?;
    reader.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::ledger::entry::GENESIS_HASH;

    #[test]
    fn test_first_append_links_to_genesis() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let entry = ledger.append("request", json!({"route": "/v1/ask"})).unwrap();
        assert_eq!(entry.prev_hash, GENESIS_HASH);
        assert!(entry.verify_hash());
        assert_eq!(ledger.latest_hash(), entry.entry_hash);
    }

    #[test]
    fn test_appends_chain_together() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let first = ledger.append("request", json!({"n": 1})).unwrap();
        let second = ledger.append("response", json!({"n": 2})).unwrap();
        let third = ledger.append("error", json!({"n": 3})).unwrap();

        assert_eq!(second.prev_hash, first.entry_hash);
        assert_eq!(third.prev_hash, second.entry_hash);

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("audit").join("nested").join("void.jsonl"));

        ledger.append("request", json!({})).unwrap();
        assert!(ledger.path().exists());
    }

    #[test]
    fn test_rejects_empty_type() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let err = ledger.append("  ", json!({})).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_rejects_non_object_payload() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        let err = ledger.append("request", json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_append_if_empty_skips_non_blank_file() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));

        std::fs::write(ledger.path(), "\n \n").unwrap();
        let first = ledger.append_if_empty("genesis", json!({})).unwrap();
        assert!(first.is_some());

        let second = ledger.append_if_empty("genesis", json!({})).unwrap();
        assert!(second.is_none());
        assert_eq!(ledger.read(None).unwrap().len(), 1);
    }

    #[test]
    fn test_has_content() {
        use std::io::Cursor;

        assert!(!has_content(&mut Cursor::new(Vec::new())).unwrap());
        assert!(!has_content(&mut Cursor::new(b"\n\r\n\t ".to_vec())).unwrap());
        assert!(has_content(&mut Cursor::new(b"\n{\"id\"".to_vec())).unwrap());
    }

    #[test]
    fn test_append_after_corrupt_tail_restarts_from_genesis() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));
        ledger.append("request", json!({"n": 1})).unwrap();

        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        file.write_all(b"{\"id\":\"trunc").unwrap();
        drop(file);

        // the partial line is left in place, not repaired
        let entry = ledger.append("request", json!({"n": 2})).unwrap();
        assert_eq!(entry.prev_hash, GENESIS_HASH);

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "{\"id\":\"trunc");
        assert_eq!(ledger.latest_hash(), entry.entry_hash);
    }
}
