//! Backup creation and size estimation

use super::catalog::BackupCatalog;
use super::error::BackupError;
use super::lock::BackupLock;
use super::naming::backup_filename;
use super::types::{BackupOptions, BackupStep, BackupType};
use crate::archive::{measure_directory, ArchiveBuilder};
use crate::config::SiteConfig;
use crate::db::TableSource;
use crate::dump::{DatabaseDumper, SqlDump, DUMP_FILE_NAME};
use crate::history;
use chrono::{DateTime, Local};
use reia_scanner::{format_bytes, ExclusionSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Archive name of the site configuration file
const CONFIG_ARCHIVE_NAME: &str = "wp-config.php";

/// A backup that was written successfully
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBackup {
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    pub size_bytes: u64,
    pub files_count: usize,
    /// Tables included in the dump
    pub tables: usize,
    pub created: DateTime<Local>,
}

/// Outcome of a creation request as reported to callers
///
/// Failures carry only a message; the error itself never crosses this
/// boundary.
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Formatted archive size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_count: Option<usize>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<BackupType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl BackupResult {
    /// Success payload for a written backup
    #[must_use]
    pub fn success(backup: &CreatedBackup) -> Self {
        Self {
            success: true,
            message: format!("Backup created successfully: {}", backup.filename),
            filename: Some(backup.filename.clone()),
            size: Some(format_bytes(backup.size_bytes)),
            size_bytes: Some(backup.size_bytes),
            files_count: Some(backup.files_count),
            backup_type: Some(backup.backup_type),
            created: Some(backup.created.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Failure payload
    ///
    /// Validation errors and empty backups are reported verbatim; other
    /// errors are prefixed with `Backup failed:`.
    #[must_use]
    pub fn failure(error: &BackupError) -> Self {
        let message = if error.is_validation()
            || matches!(error, BackupError::Empty | BackupError::AlreadyRunning(_))
        {
            error.to_string()
        } else {
            format!("Backup failed: {error}")
        };
        Self {
            success: false,
            message,
            filename: None,
            size: None,
            size_bytes: None,
            files_count: None,
            backup_type: None,
            created: None,
        }
    }
}

/// Size of one part of an estimate
#[derive(Debug, Clone, Serialize)]
pub struct EstimatePart {
    pub bytes: u64,
    pub formatted: String,
}

impl EstimatePart {
    fn new(bytes: u64) -> Self {
        Self {
            bytes,
            formatted: format_bytes(bytes),
        }
    }
}

/// Expected size and duration of a backup
#[derive(Debug, Clone, Serialize)]
pub struct SizeEstimate {
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    pub estimated_size: u64,
    pub estimated_size_formatted: String,
    pub estimated_files: usize,
    pub estimated_time: &'static str,
    /// Keyed by `database`, `wp_content`, `all_files` or `uploads`
    pub breakdown: BTreeMap<&'static str, EstimatePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub recommendations: Vec<&'static str>,
}

/// Rough creation time for an archive of `bytes`
#[must_use]
pub fn estimate_duration(bytes: u64) -> &'static str {
    match bytes / MIB {
        0..=49 => "under a minute",
        50..=199 => "1-3 minutes",
        200..=499 => "3-8 minutes",
        500..=999 => "8-15 minutes",
        _ => "more than 15 minutes",
    }
}

/// Creates and estimates backups for one site
///
/// Each call runs to completion on its own; nothing is kept between
/// calls except the configuration.
pub struct BackupManager<'a> {
    config: &'a SiteConfig,
    database: Option<&'a dyn TableSource>,
    catalog: BackupCatalog,
}

impl<'a> BackupManager<'a> {
    /// Create a manager; `database` is required for types that dump it
    #[must_use]
    pub fn new(config: &'a SiteConfig, database: Option<&'a dyn TableSource>) -> Self {
        Self {
            config,
            database,
            catalog: BackupCatalog::new(config.backup_dir(), config.limits.clone()),
        }
    }

    /// Catalogue of this site's backup directory
    #[must_use]
    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    fn exclusions(&self, options: &BackupOptions) -> Result<ExclusionSet, BackupError> {
        let mut exclusions = ExclusionSet::from_patterns(options.exclusion_patterns())?;
        exclusions.exclude_path(self.catalog.dir());
        Ok(exclusions)
    }

    fn database_for(
        &self,
        backup_type: BackupType,
    ) -> Result<Option<&'a dyn TableSource>, BackupError> {
        if !backup_type.includes_database() {
            return Ok(None);
        }
        self.database.map(Some).ok_or(BackupError::MissingDatabase)
    }

    /// First unused file name for a backup taken now
    fn next_path(&self, backup_type: BackupType, now: &DateTime<Local>) -> (String, PathBuf) {
        let mut sequence = None;
        loop {
            let filename = backup_filename(backup_type, now, sequence);
            let path = self.catalog.dir().join(&filename);
            if !path.exists() {
                return (filename, path);
            }
            sequence = Some(sequence.map_or(1, |n| n + 1));
        }
    }

    /// Create a backup
    ///
    /// Holds the backup lock for the duration. The database is dumped
    /// before the archive is opened, so a failed dump leaves nothing on
    /// disk. Any later failure removes the partial archive.
    ///
    /// # Errors
    /// Returns a validation error before any I/O, `AlreadyRunning` if
    /// another backup holds the lock, `Empty` if nothing was archived,
    /// or the underlying dump, archive or IO error
    pub fn try_create(
        &self,
        backup_type: BackupType,
        options: &BackupOptions,
    ) -> Result<CreatedBackup, BackupError> {
        let database = self.database_for(backup_type)?;

        // The directory must exist for its exclusion to be canonical
        self.catalog.ensure_dir()?;
        let exclusions = self.exclusions(options)?;
        let _lock = BackupLock::acquire(self.catalog.dir(), self.config.limits.lock_stale_after())?;

        let dump = match database {
            Some(db) => Some(DatabaseDumper::new(db, self.config.table_prefix()).dump()?),
            None => None,
        };

        let now = Local::now();
        let (filename, path) = self.next_path(backup_type, &now);
        tracing::info!(backup_type = %backup_type, file = %filename, "creating backup");

        let mut archive = ArchiveBuilder::open(&path, self.config.limits.max_file_size)?;
        let mut files_count = 0;
        for step in backup_type.steps() {
            files_count += self.run_step(*step, &mut archive, dump.as_ref(), &exclusions)?;
        }

        if files_count == 0 {
            archive.abort();
            tracing::warn!(backup_type = %backup_type, "backup contained no files");
            return Err(BackupError::Empty);
        }

        let size_bytes = archive.close()?;
        let created = CreatedBackup {
            filename,
            path,
            backup_type,
            size_bytes,
            files_count,
            tables: dump.as_ref().map_or(0, |d| d.tables.len()),
            created: now,
        };

        history::record(
            "backup",
            "create",
            &format!("Backup created successfully: {}", created.filename),
            &created,
        );
        Ok(created)
    }

    fn run_step(
        &self,
        step: BackupStep,
        archive: &mut ArchiveBuilder,
        dump: Option<&SqlDump>,
        exclusions: &ExclusionSet,
    ) -> Result<usize, BackupError> {
        let added = match step {
            BackupStep::DatabaseDump => match dump {
                Some(dump) if !dump.is_empty() => {
                    archive.add_virtual_file(DUMP_FILE_NAME, dump.sql.as_bytes())?;
                    1
                }
                _ => 0,
            },
            BackupStep::ContentDir => {
                add_dir_if_present(archive, &self.config.content_dir(), "wp-content/", exclusions)?
            }
            BackupStep::ConfigFile => {
                let config_file = self.config.config_file();
                if config_file.is_file() {
                    archive.add_file(&config_file, CONFIG_ARCHIVE_NAME)?;
                    1
                } else {
                    0
                }
            }
            BackupStep::SiteRoot => {
                add_dir_if_present(archive, &self.config.site_root, "", exclusions)?
            }
            BackupStep::UploadsDir => add_dir_if_present(
                archive,
                &self.config.uploads_dir(),
                "wp-content/uploads/",
                exclusions,
            )?,
        };
        tracing::debug!(?step, added, "backup step finished");
        Ok(added)
    }

    /// Create a backup and report the outcome as a payload
    #[must_use]
    pub fn create(&self, backup_type: BackupType, options: &BackupOptions) -> BackupResult {
        match self.try_create(backup_type, options) {
            Ok(backup) => BackupResult::success(&backup),
            Err(e) => {
                tracing::error!(backup_type = %backup_type, error = %e, "backup failed");
                BackupResult::failure(&e)
            }
        }
    }

    /// Create a backup from a type given by name
    #[must_use]
    pub fn create_named(&self, backup_type: &str, options: &BackupOptions) -> BackupResult {
        match backup_type.parse::<BackupType>() {
            Ok(backup_type) => self.create(backup_type, options),
            Err(_) => BackupResult::failure(&BackupError::UnknownType(backup_type.to_string())),
        }
    }

    /// Estimate the size of a backup without writing anything
    ///
    /// Directory sizes use the same exclusions and size ceiling as
    /// creation with default options. A site without a database
    /// estimates its database part as zero.
    ///
    /// # Errors
    /// Returns an error if a directory walk or the size query fails
    pub fn estimate(&self, backup_type: BackupType) -> Result<SizeEstimate, BackupError> {
        let exclusions = self.exclusions(&BackupOptions::default())?;
        let max = self.config.limits.max_file_size;
        let mut breakdown = BTreeMap::new();
        let mut files = 0;
        let mut warning = None;

        let database_bytes = match self.database {
            Some(db) if backup_type.includes_database() => {
                db.size_bytes().map_err(crate::dump::DumpError::from)?
            }
            _ => 0,
        };
        if backup_type.includes_database() {
            breakdown.insert("database", EstimatePart::new(database_bytes));
        }

        let files_part = match backup_type {
            BackupType::Content => Some(("wp_content", self.config.content_dir(), "wp-content/")),
            BackupType::Full => Some(("all_files", self.config.site_root.clone(), "")),
            BackupType::Uploads => {
                Some(("uploads", self.config.uploads_dir(), "wp-content/uploads/"))
            }
            BackupType::Database => None,
        };
        if let Some((key, dir, prefix)) = files_part {
            let (bytes, count) = measure_directory(&dir, prefix, &exclusions, max)?;
            files += count;
            breakdown.insert(key, EstimatePart::new(bytes));
            if backup_type == BackupType::Full && bytes > GIB {
                warning = Some(
                    "This backup will be very large and may take a long time to create and download."
                        .to_string(),
                );
            }
        }

        if backup_type == BackupType::Content && self.config.config_file().is_file() {
            files += 1;
        }

        let estimated_size: u64 = breakdown.values().map(|p| p.bytes).sum();
        Ok(SizeEstimate {
            backup_type,
            estimated_size,
            estimated_size_formatted: format_bytes(estimated_size),
            estimated_files: files + usize::from(backup_type.includes_database()),
            estimated_time: estimate_duration(estimated_size),
            breakdown,
            warning,
            recommendations: vec![backup_type.recommendation()],
        })
    }
}

fn add_dir_if_present(
    archive: &mut ArchiveBuilder,
    dir: &Path,
    prefix: &str,
    exclusions: &ExclusionSet,
) -> Result<usize, BackupError> {
    if dir.is_dir() {
        Ok(archive.add_directory(dir, prefix, exclusions)?)
    } else {
        tracing::debug!(dir = %dir.display(), "source directory missing, skipped");
        Ok(0)
    }
}
