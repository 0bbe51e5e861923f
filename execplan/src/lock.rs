//! Per-ExecPlan cross-process mutation lock.
//!
//! Every structural change to one plan root (create, archive, milestone
//! create/archive) runs while holding `<execplans_dir>/.locks/<id>.lock`.
//! Locks for different IDs are different files and never contend.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;

use crate::error::{ExecPlanError, Result};
use crate::identity::ExecPlanId;
use crate::paths::LOCKS_DIR;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 200;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// How the advisory lock is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// Blocks in the OS until the holder releases.
    Blocking,
    /// Non-blocking attempts with a fixed delay; never waits indefinitely.
    Polling { attempts: u32, delay: Duration },
}

impl LockBackend {
    pub fn polling_default() -> Self {
        LockBackend::Polling {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }

    #[cfg(unix)]
    pub fn platform_default() -> Self {
        LockBackend::Blocking
    }

    #[cfg(not(unix))]
    pub fn platform_default() -> Self {
        Self::polling_default()
    }
}

impl Default for LockBackend {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct MutationLock {
    file: File,
    path: PathBuf,
    execplan_id: String,
}

impl MutationLock {
    pub fn acquire(
        execplans_dir: &Path,
        execplan_id: &ExecPlanId,
        backend: &LockBackend,
    ) -> Result<Self> {
        if !execplans_dir.is_dir() {
            return Err(ExecPlanError::NotFound(format!(
                "ExecPlans directory not found: {}",
                execplans_dir.display()
            )));
        }
        let lock_dir = execplans_dir.join(LOCKS_DIR);
        std::fs::create_dir_all(&lock_dir)
            .map_err(|e| ExecPlanError::io("create lock directory", &lock_dir, e))?;

        let execplan_id = execplan_id.to_string();
        let path = lock_dir.join(format!("{execplan_id}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ExecPlanError::io("open lock file", &path, e))?;

        match *backend {
            LockBackend::Blocking => file
                .lock_exclusive()
                .map_err(|e| ExecPlanError::io("lock", &path, e))?,
            LockBackend::Polling { attempts, delay } => {
                poll_exclusive(&file, &path, &execplan_id, attempts, delay)?
            }
        }

        tracing::debug!(execplan_id = %execplan_id, path = %path.display(), "acquired mutation lock");
        Ok(Self {
            file,
            path,
            execplan_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn execplan_id(&self) -> &str {
        &self.execplan_id
    }
}

fn poll_exclusive(
    file: &File,
    path: &Path,
    execplan_id: &str,
    attempts: u32,
    delay: Duration,
) -> Result<()> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
            Err(e) => return Err(ExecPlanError::io("lock", path, e)),
        }
    }
    tracing::warn!(execplan_id, attempts, path = %path.display(), "mutation lock timed out");
    Err(ExecPlanError::LockTimeout {
        execplan_id: execplan_id.to_string(),
        lock_path: path.to_path_buf(),
        attempts,
        delay,
    })
}

impl Drop for MutationLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(execplan_id = %self.execplan_id, "failed to release mutation lock: {e}");
        } else {
            tracing::debug!(execplan_id = %self.execplan_id, "released mutation lock");
        }
    }
}
