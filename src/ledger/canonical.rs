//! Canonical Encoding
//!
//! Deterministic byte encoding of JSON values used for every hash
//! computation in the ledger. Object keys are emitted in sorted order,
//! separators are compact (`,` and `:`), no whitespace is produced and
//! non-ASCII text is written as raw UTF-8.
//!
//! Ordering is applied here explicitly rather than relying on the
//! ordering of `serde_json::Map`, which changes with the `preserve_order`
//! feature.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::LedgerResult;

/// Encode a value canonically into a fresh buffer.
pub fn to_canonical_bytes(value: &Value) -> LedgerResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Append the canonical encoding of `value` to `out`.
pub fn write_canonical(value: &Value, out: &mut Vec<u8>) -> LedgerResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // UTF-8 byte order matches code point order
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(&map[key], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// Lowercase hex SHA-256 digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 over the canonical encoding of `value`.
pub fn canonical_hash(value: &Value) -> LedgerResult<String> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}
