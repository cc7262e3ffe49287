pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod tip_cache;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Ledger, LedgerEntry, VerificationResult, GENESIS_HASH};
pub use tip_cache::TipCache;
