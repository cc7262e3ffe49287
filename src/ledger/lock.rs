//! File Locking
//!
//! Advisory locking is an explicit capability. `AdvisoryLock` uses
//! `flock`/`LockFileEx` through `fs2`; `NoLock` performs no
//! synchronization at all.
//!
//! Single-writer usage is correct with either implementation. With
//! `NoLock`, or when the platform rejects the lock, concurrent writers
//! from several processes may interleave and fork the chain; a later
//! verify run will report the break.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing::warn;

/// Which locking implementation a ledger uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    #[default]
    Advisory,
    Disabled,
}

pub trait FileLocker: fmt::Debug + Send + Sync {
    fn lock_exclusive(&self, file: &File) -> io::Result<()>;
    fn lock_shared(&self, file: &File) -> io::Result<()>;
    fn unlock(&self, file: &File) -> io::Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AdvisoryLock;

impl FileLocker for AdvisoryLock {
    fn lock_exclusive(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::lock_exclusive(file)
    }

    fn lock_shared(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::lock_shared(file)
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::unlock(file)
    }

    fn name(&self) -> &'static str {
        "advisory"
    }
}

/// Reduces the concurrency guarantee to single-writer only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLock;

impl FileLocker for NoLock {
    fn lock_exclusive(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn lock_shared(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn unlock(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Pick a locker for the configured mode and the current platform
pub fn locker_for(mode: LockMode) -> Arc<dyn FileLocker> {
    match mode {
        LockMode::Advisory if cfg!(any(unix, windows)) => Arc::new(AdvisoryLock),
        LockMode::Advisory => {
            warn!("Advisory file locking unavailable on this platform; falling back to single-writer mode");
            Arc::new(NoLock)
        }
        LockMode::Disabled => Arc::new(NoLock),
    }
}

/// Scoped lock, released on drop.
///
/// Acquisition failures are logged and the guard proceeds unlocked.
pub struct LockGuard<'a> {
    file: &'a File,
    locker: &'a dyn FileLocker,
    held: bool,
}

impl<'a> LockGuard<'a> {
    pub fn exclusive(locker: &'a dyn FileLocker, file: &'a File) -> Self {
        let held = match locker.lock_exclusive(file) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to acquire exclusive {} lock, continuing unsynchronized: {}", locker.name(), e);
                false
            }
        };
        Self { file, locker, held }
    }

    pub fn shared(locker: &'a dyn FileLocker, file: &'a File) -> Self {
        let held = match locker.lock_shared(file) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to acquire shared {} lock, continuing unsynchronized: {}", locker.name(), e);
                false
            }
        };
        Self { file, locker, held }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.locker.unlock(self.file) {
                warn!("Failed to release {} lock: {}", self.locker.name(), e);
            }
        }
    }
}
