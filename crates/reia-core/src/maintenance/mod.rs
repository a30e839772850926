//! Database housekeeping and performance analysis
//!
//! Every utility here has a preview that only reads and an execute step
//! that changes the database. Tables that do not exist are treated as
//! empty, so the same calls work against partial schemas.

pub mod autoload;
pub mod cache;
pub mod files;
pub mod optimizer;
pub mod performance;
pub mod plugins;

use crate::archive::ArchiveError;
use crate::db::{quote_ident, Database, DatabaseError};
use reia_scanner::ScanError;
use rusqlite::{OptionalExtension, Params};
use thiserror::Error;

pub use autoload::{AutoloadFixReport, AutoloadInspector, AutoloadStats, LargeOption};
pub use cache::{CacheCleaner, CacheOption, CachePreview, CacheReport};
pub use files::SiteFileCleaner;
pub use optimizer::{DatabaseOptimizer, OptimizeOption, OptimizePreview, OptimizeReport};
pub use performance::{
    PerfCheck, PerfStatus, PerformanceAnalyzer, PerformanceOptimizeReport, PerformanceReport,
};
pub use plugins::{PluginAnalyzer, PluginInfo, PluginReport};

/// Errors from maintenance utilities
#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Unknown option: {0}")]
    UnknownOption(String),
}

/// Result type for maintenance operations
pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

/// Prefixed access to the site's tables
#[derive(Clone, Copy)]
pub(crate) struct SiteTables<'a> {
    db: &'a Database,
    prefix: &'a str,
}

impl<'a> SiteTables<'a> {
    pub(crate) fn new(db: &'a Database, prefix: &'a str) -> Self {
        Self { db, prefix }
    }

    pub(crate) fn db(&self) -> &'a Database {
        self.db
    }

    /// Full table name for a base name such as `options`
    pub(crate) fn name(&self, base: &str) -> String {
        format!("{}{base}", self.prefix)
    }

    /// Quoted table name, or `None` if the table does not exist
    pub(crate) fn table(&self, base: &str) -> MaintenanceResult<Option<String>> {
        let name = self.name(base);
        Ok(self.db.table_exists(&name)?.then(|| quote_ident(&name)))
    }

    /// Run a `SELECT` yielding one integer; missing tables count as zero
    ///
    /// `{t}` in the query is replaced by the quoted name of `base`.
    pub(crate) fn scalar<P: Params>(
        &self,
        base: &str,
        sql: &str,
        params: P,
    ) -> MaintenanceResult<u64> {
        let Some(table) = self.table(base)? else {
            return Ok(0);
        };
        let value: Option<i64> = self
            .db
            .connection()
            .query_row(&sql.replace("{t}", &table), params, |row| row.get(0))?;
        Ok(value.unwrap_or(0).max(0) as u64)
    }

    /// Run a `SELECT` yielding at most one text value; missing tables,
    /// rows and `NULL` all yield `None`
    pub(crate) fn text<P: Params>(
        &self,
        base: &str,
        sql: &str,
        params: P,
    ) -> MaintenanceResult<Option<String>> {
        let Some(table) = self.table(base)? else {
            return Ok(None);
        };
        let value: Option<Option<String>> = self
            .db
            .connection()
            .query_row(&sql.replace("{t}", &table), params, |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    /// Value of a site option
    pub(crate) fn option(&self, name: &str) -> MaintenanceResult<Option<String>> {
        self.text(
            "options",
            "SELECT option_value FROM {t} WHERE option_name = ?1",
            [name],
        )
    }

    /// Run a statement and return the affected row count; missing tables
    /// affect nothing
    pub(crate) fn execute<P: Params>(
        &self,
        base: &str,
        sql: &str,
        params: P,
    ) -> MaintenanceResult<u64> {
        let Some(table) = self.table(base)? else {
            return Ok(0);
        };
        let changed = self
            .db
            .connection()
            .execute(&sql.replace("{t}", &table), params)?;
        Ok(changed as u64)
    }
}

