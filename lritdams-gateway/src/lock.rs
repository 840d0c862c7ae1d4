//! Single-instance lock file.
//!
//! The file holds the owner's PID and is touched periodically. A lock
//! file that has not been touched within [`STALE_AFTER`] is treated as
//! left over from a dead process and taken over.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lritdams_core::GatewayError;

/// Age after which an existing lock file is considered abandoned.
pub const STALE_AFTER: Duration = Duration::from_secs(20);

/// How often the owner refreshes the lock file.
pub const TOUCH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    released: AtomicBool,
}

impl LockFile {
    /// Take the lock, refusing while another live instance holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let path = path.into();
        if let Ok(meta) = fs::metadata(&path) {
            let age = meta
                .modified()
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or_default();
            if age < STALE_AFTER {
                return Err(GatewayError::LockHeld(path));
            }
            warn!("taking over stale lock file {} ({}s old)", path.display(), age.as_secs());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        info!("acquired lock {}", path.display());
        Ok(Self {
            path,
            released: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refresh the modification time. Fails if the file is gone.
    pub fn touch(&self) -> Result<(), GatewayError> {
        let file = fs::File::options()
            .write(true)
            .open(&self.path)
            .map_err(|_| GatewayError::LockLost(self.path.clone()))?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }

    /// Touch the file every `interval` until `cancel` fires. Returns
    /// [`GatewayError::LockLost`] as soon as the file disappears.
    pub async fn watch(&self, interval: Duration, cancel: CancellationToken) -> Result<(), GatewayError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.touch() {
                error!("{e}; shutting down");
                return Err(e);
            }
            debug!("lock refreshed");
        }
    }

    /// Delete the lock file. Safe to call more than once.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!("released lock {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove lock {}: {e}", self.path.display()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        self.release();
    }
}
