//! REIA Core - site maintenance engine
//!
//! This crate provides archive backups (with database dumps), the backup
//! catalogue and retention pruning, database housekeeping, the security
//! audit and performance analysis for a content-management deployment.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

pub mod archive;
pub mod audit;
pub mod backup;
pub mod config;
pub mod db;
pub mod dump;
pub mod history;
pub mod maintenance;

pub use reia_scanner;

pub use audit::{SecurityAudit, SecurityReport};
pub use backup::{
    BackupCatalog, BackupError, BackupManager, BackupOptions, BackupRecord, BackupResult,
    BackupType,
};
pub use config::{Limits, SiteConfig};
pub use db::{Database, SqlValue, TableSource};
pub use dump::DatabaseDumper;
pub use maintenance::{MaintenanceError, MaintenanceResult};
