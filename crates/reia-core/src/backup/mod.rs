//! Archive backups of a site
//!
//! [`BackupManager`] creates and estimates backups, [`BackupCatalog`]
//! lists, deletes and prunes them. Backups are zip files named
//! `reia-backup-<type>-<timestamp>.zip` in the site's backup directory.

pub mod catalog;
pub mod error;
pub mod lock;
pub mod manager;
pub mod naming;
pub mod types;

pub use catalog::{BackupCatalog, BackupRecord, DeletePreview, DeleteReport, PruneReport};
pub use error::BackupError;
pub use lock::{BackupLock, LOCK_FILE_NAME};
pub use manager::{
    estimate_duration, BackupManager, BackupResult, CreatedBackup, EstimatePart, SizeEstimate,
};
pub use naming::{backup_filename, parse_filename, validate_filename, ParsedName};
pub use types::{BackupOptions, BackupStep, BackupType};
