//! Advisory lock guarding backup creation

use super::error::BackupError;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Name of the lock file inside the backup directory
pub const LOCK_FILE_NAME: &str = ".reia-backup.lock";

/// Held while a backup is being created; released on drop
#[derive(Debug)]
pub struct BackupLock {
    path: PathBuf,
}

impl BackupLock {
    /// Take the lock in `dir`
    ///
    /// A lock file older than `stale_after` is assumed abandoned by a
    /// crashed run and replaced.
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if a live lock exists, or an IO error
    pub fn acquire(dir: &Path, stale_after: Duration) -> Result<Self, BackupError> {
        let path = dir.join(LOCK_FILE_NAME);

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !is_stale(&path, stale_after) {
                    return Err(BackupError::AlreadyRunning(path));
                }
                tracing::warn!(path = %path.display(), "replacing stale backup lock");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Self::create(&path).map_err(|e| {
                    if e.kind() == io::ErrorKind::AlreadyExists {
                        BackupError::AlreadyRunning(path.clone())
                    } else {
                        e.into()
                    }
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "pid={}", std::process::id())?;
        writeln!(file, "started={}", Utc::now().to_rfc3339())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not release backup lock"
            );
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}
