//! Backup error types

use crate::archive::ArchiveError;
use crate::dump::DumpError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from backup creation and catalogue operations
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid backup filename: {0}")]
    InvalidFilename(String),

    #[error("Unknown backup type: {0}")]
    UnknownType(String),

    #[error("No database configured for this site")]
    MissingDatabase,

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Another backup is already running (lock file {0})")]
    AlreadyRunning(PathBuf),

    #[error("No files were added to the backup.")]
    Empty,

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Database dump failed: {0}")]
    Dump(#[from] DumpError),

    #[error("Exclusion error: {0}")]
    Exclusion(#[from] reia_scanner::ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Whether the request was rejected before touching the filesystem
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilename(_) | Self::UnknownType(_) | Self::MissingDatabase
        )
    }
}
