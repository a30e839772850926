//! Listing, deleting and pruning backups on disk
//!
//! The backup directory is the only source of truth: every call re-reads
//! it, and records are rebuilt from file names and metadata each time.

use super::error::BackupError;
use super::naming::{parse_filename, validate_filename};
use super::types::BackupType;
use crate::config::Limits;
use crate::history;
use chrono::{DateTime, Utc};
use reia_scanner::format_bytes;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Access-restriction marker written into a fresh backup directory
pub const ACCESS_MARKER_NAME: &str = ".htaccess";
const ACCESS_MARKER: &str = "Order deny,allow\nDeny from all\n";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One archive in the backup directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    pub size_bytes: u64,
    /// Formatted size
    pub size: String,
    /// Taken from the file's modification time
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    modified: SystemTime,
}

impl BackupRecord {
    fn read(path: PathBuf) -> Result<Option<Self>, BackupError> {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            return Ok(None);
        };
        let Some(parsed) = parse_filename(&filename) else {
            return Ok(None);
        };
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Ok(None);
        }
        let modified = metadata.modified()?;

        Ok(Some(Self {
            filename,
            path,
            backup_type: parsed.backup_type,
            size_bytes: metadata.len(),
            size: format_bytes(metadata.len()),
            created_at: modified.into(),
            modified,
        }))
    }

    /// Creation time as shown to users
    #[must_use]
    pub fn created_display(&self) -> String {
        self.created_at.format(DATE_FORMAT).to_string()
    }

    fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }
}

/// Dry-run result for deleting one backup
#[derive(Debug, Clone, Serialize)]
pub struct DeletePreview {
    pub dry_run: bool,
    pub backup_file: String,
    pub file_size: String,
    pub file_date: String,
    pub message: String,
}

/// Outcome of deleting one backup
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub backup_file: String,
    pub bytes_freed: u64,
    pub message: String,
}

/// Outcome (or preview) of retention pruning
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub deleted_backups: Vec<String>,
    pub total_deleted: usize,
    pub bytes_freed: u64,
    pub space_freed: String,
    pub age_days: u64,
    pub message: String,
}

/// The set of backups in one directory
#[derive(Debug, Clone)]
pub struct BackupCatalog {
    dir: PathBuf,
    limits: Limits,
}

impl BackupCatalog {
    /// Catalogue over `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            dir: dir.into(),
            limits,
        }
    }

    /// The backup directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Thresholds in effect
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Create the backup directory with its access marker if missing
    ///
    /// # Errors
    /// Returns an error if the directory or marker cannot be written
    pub fn ensure_dir(&self) -> Result<&Path, BackupError> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir)?;
            tracing::info!(dir = %self.dir.display(), "created backup directory");
        }
        let marker = self.dir.join(ACCESS_MARKER_NAME);
        if !marker.exists() {
            fs::write(&marker, ACCESS_MARKER)?;
        }
        Ok(&self.dir)
    }

    /// Every backup, newest first
    ///
    /// Ties on modification time are broken by file name. Files that do
    /// not follow the naming pattern are ignored. A missing directory
    /// lists as empty.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn list(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            if let Some(record) = BackupRecord::read(entry?.path())? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(records)
    }

    /// Validate a file name and return the backup's path
    ///
    /// # Errors
    /// Returns `InvalidFilename` or `NotFound`
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, BackupError> {
        validate_filename(filename)?;
        let path = self.dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(BackupError::NotFound(filename.to_string()))
        }
    }

    fn record(&self, filename: &str) -> Result<BackupRecord, BackupError> {
        let path = self.resolve(filename)?;
        BackupRecord::read(path)?.ok_or_else(|| BackupError::NotFound(filename.to_string()))
    }

    /// Describe what deleting `filename` would do
    ///
    /// # Errors
    /// Returns `InvalidFilename` or `NotFound`
    pub fn preview_delete(&self, filename: &str) -> Result<DeletePreview, BackupError> {
        let record = self.record(filename)?;
        let file_date = record.created_display();
        Ok(DeletePreview {
            dry_run: true,
            message: format!(
                "Would delete backup: {} ({}, created {file_date})",
                record.filename, record.size
            ),
            backup_file: record.filename,
            file_size: record.size,
            file_date,
        })
    }

    /// Delete one backup
    ///
    /// # Errors
    /// Returns `InvalidFilename`, `NotFound`, or an IO error
    pub fn delete(&self, filename: &str) -> Result<DeleteReport, BackupError> {
        let record = self.record(filename)?;
        fs::remove_file(&record.path)?;
        let report = DeleteReport {
            message: "Backup deleted successfully.".to_string(),
            backup_file: record.filename,
            bytes_freed: record.size_bytes,
        };
        history::record("backup", "delete", &report.message, &report);
        Ok(report)
    }

    /// Backups whose modification time is more than `days` old
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn older_than(&self, days: u64) -> Result<Vec<BackupRecord>, BackupError> {
        let max_age = Duration::from_secs(days * 24 * 60 * 60);
        let now = SystemTime::now();
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.age(now) > max_age)
            .collect())
    }

    /// Report which backups pruning would delete
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn preview_prune(&self, days: u64) -> Result<PruneReport, BackupError> {
        let old = self.older_than(days)?;
        let bytes: u64 = old.iter().map(|r| r.size_bytes).sum();
        let message = if old.is_empty() {
            "No old backups found to clean up".to_string()
        } else {
            format!(
                "Would delete {} old backups ({days}+ days), freeing {} of space",
                old.len(),
                format_bytes(bytes)
            )
        };
        Ok(PruneReport {
            dry_run: true,
            total_deleted: old.len(),
            deleted_backups: old.into_iter().map(|r| r.filename).collect(),
            bytes_freed: bytes,
            space_freed: format_bytes(bytes),
            age_days: days,
            message,
        })
    }

    /// Delete every backup older than `days`
    ///
    /// A file that fails to delete is logged and left out of the report.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn prune_older_than(&self, days: u64) -> Result<PruneReport, BackupError> {
        let mut deleted = Vec::new();
        let mut bytes = 0;

        for record in self.older_than(days)? {
            match fs::remove_file(&record.path) {
                Ok(()) => {
                    bytes += record.size_bytes;
                    deleted.push(record.filename);
                }
                Err(e) => {
                    tracing::warn!(
                        file = %record.filename,
                        error = %e,
                        "could not delete old backup"
                    );
                }
            }
        }

        let report = PruneReport {
            dry_run: false,
            message: format!(
                "Successfully deleted {} old backups, freed {} of space",
                deleted.len(),
                format_bytes(bytes)
            ),
            total_deleted: deleted.len(),
            deleted_backups: deleted,
            bytes_freed: bytes,
            space_freed: format_bytes(bytes),
            age_days: days,
        };
        history::record("backup", "prune", &report.message, &report);
        Ok(report)
    }

    /// Prune with the configured retention window
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn prune(&self) -> Result<PruneReport, BackupError> {
        self.prune_older_than(self.limits.retention_days)
    }
}
