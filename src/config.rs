use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::lock::LockMode;

pub const DEFAULT_LEDGER_FILE: &str = "void_ledger.jsonl";
pub const DEFAULT_TAIL_WINDOW: u64 = 8192;
const MIN_TAIL_WINDOW: u64 = 512;

/// Explicit ledger configuration, handed to `Ledger::from_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub ledger_path: PathBuf,
    #[serde(default)]
    pub tip_cache_path: Option<PathBuf>,
    #[serde(default = "default_tail_window")]
    pub tail_window_bytes: u64,
    #[serde(default)]
    pub locking: LockMode,
}

fn default_tail_window() -> u64 {
    DEFAULT_TAIL_WINDOW
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILE),
            tip_cache_path: None,
            tail_window_bytes: DEFAULT_TAIL_WINDOW,
            locking: LockMode::default(),
        }
    }
}

impl LedgerConfig {
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            ..Self::default()
        }
    }

    pub fn with_tip_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.tip_cache_path = Some(path.into());
        self
    }

    pub fn with_locking(mut self, locking: LockMode) -> Self {
        self.locking = locking;
        self
    }

    /// Layer defaults, an optional TOML file and `VOID_LEDGER_*` env vars.
    pub fn load(file: Option<&Path>) -> LedgerResult<Self> {
        let mut builder = config::Config::builder()
            .set_default("ledger_path", DEFAULT_LEDGER_FILE)?
            .set_default("tail_window_bytes", DEFAULT_TAIL_WINDOW)?
            .set_default("locking", "advisory")?;

        if let Some(path) = file {
            debug!("Loading ledger configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let cfg: LedgerConfig = builder
            .add_source(config::Environment::with_prefix("VOID_LEDGER"))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.ledger_path.as_os_str().is_empty() {
            return Err(LedgerError::Config("ledger_path must not be empty".to_string()));
        }

        if self.tail_window_bytes < MIN_TAIL_WINDOW {
            return Err(LedgerError::Config(format!(
                "tail_window_bytes must be at least {} (got {})",
                MIN_TAIL_WINDOW, self.tail_window_bytes
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.ledger_path, PathBuf::from("void_ledger.jsonl"));
        assert_eq!(cfg.tail_window_bytes, 8192);
        assert_eq!(cfg.locking, LockMode::Advisory);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "ledger_path = \"/tmp/audit/void.jsonl\"\ntail_window_bytes = 4096\nlocking = \"disabled\""
        )
        .unwrap();

        let cfg = LedgerConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.ledger_path, PathBuf::from("/tmp/audit/void.jsonl"));
        assert_eq!(cfg.tail_window_bytes, 4096);
        assert_eq!(cfg.locking, LockMode::Disabled);
        assert!(cfg.tip_cache_path.is_none());
    }

    #[test]
    fn test_rejects_tiny_tail_window() {
        let mut cfg = LedgerConfig::new("ledger.jsonl");
        cfg.tail_window_bytes = 16;
        assert!(matches!(cfg.validate(), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_path() {
        let cfg = LedgerConfig::new("");
        assert!(cfg.validate().is_err());
    }
}
