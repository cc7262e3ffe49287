//! Gateway Event Payloads
//!
//! Typed payloads for the events a gateway records. Sensitive content
//! (prompts, responses) is never stored; only its length and SHA-256
//! digest go into the ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::canonical::sha256_hex;
use crate::ledger::{Ledger, LedgerEntry};

/// An event with a fixed ledger `type` tag
pub trait LedgerEvent: Serialize {
    const EVENT_TYPE: &'static str;

    fn to_payload(&self) -> LedgerResult<Value> {
        let value = serde_json::to_value(self)?;
        if !value.is_object() {
            return Err(LedgerError::payload_not_object("non-object event"));
        }
        Ok(value)
    }
}

/// Digest of text content, as stored in place of the content itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    pub length: usize,
    pub sha256: String,
}

impl ContentDigest {
    pub fn of(text: &str) -> Self {
        Self {
            length: text.chars().count(),
            sha256: sha256_hex(text.as_bytes()),
        }
    }
}

/// An incoming request accepted by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub request_id: String,
    pub route: String,
    pub model: String,
    pub prompt: ContentDigest,
}

impl RequestEvent {
    pub fn new(request_id: &str, route: &str, model: &str, prompt: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            route: route.to_string(),
            model: model.to_string(),
            prompt: ContentDigest::of(prompt),
        }
    }
}

impl LedgerEvent for RequestEvent {
    const EVENT_TYPE: &'static str = "request";
}

/// A completed downstream response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub request_id: String,
    pub model: String,
    pub response: ContentDigest,
    pub latency_ms: u64,
}

impl ResponseEvent {
    pub fn new(request_id: &str, model: &str, response: &str, latency_ms: u64) -> Self {
        Self {
            request_id: request_id.to_string(),
            model: model.to_string(),
            response: ContentDigest::of(response),
            latency_ms,
        }
    }
}

impl LedgerEvent for ResponseEvent {
    const EVENT_TYPE: &'static str = "response";
}

/// A failed request; `error` is a short code, never a stack trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub request_id: String,
    pub route: String,
    pub error: String,
    pub latency_ms: u64,
}

impl ErrorEvent {
    pub fn new(request_id: &str, route: &str, error: &str, latency_ms: u64) -> Self {
        Self {
            request_id: request_id.to_string(),
            route: route.to_string(),
            error: error.to_string(),
            latency_ms,
        }
    }
}

impl LedgerEvent for ErrorEvent {
    const EVENT_TYPE: &'static str = "error";
}

impl Ledger {
    /// Append a typed event under its own `type` tag
    pub fn record<E: LedgerEvent>(&self, event: &E) -> LedgerResult<LedgerEntry> {
        self.append(E::EVENT_TYPE, event.to_payload()?)
    }
}
