//! Autoloaded option statistics and the autoload fixer
//!
//! Options flagged `autoload = 'yes'` are loaded on every page request.
//! Large ones are switched to load on demand, except for a handful the
//! platform cannot run without.

use super::{MaintenanceResult, SiteTables};
use crate::db::Database;
use crate::history;
use reia_scanner::format_bytes;
use rusqlite::params;
use serde::Serialize;

/// Options that must stay autoloaded regardless of size
pub const CRITICAL_OPTIONS: [&str; 5] = [
    "wp_user_roles",
    "active_plugins",
    "cron",
    "stylesheet",
    "template",
];

const MIB: f64 = 1024.0 * 1024.0;

/// A large autoloaded option that can be switched off
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeOption {
    pub name: String,
    pub size_bytes: u64,
    pub size: String,
}

/// Current autoload footprint
#[derive(Debug, Clone, Serialize)]
pub struct AutoloadStats {
    pub size_bytes: u64,
    pub size_mb: f64,
    pub count: u64,
    pub large_options_count: usize,
    pub potential_savings_bytes: u64,
    pub potential_savings_mb: f64,
}

/// Outcome of switching large options off
#[derive(Debug, Clone, Serialize)]
pub struct AutoloadFixReport {
    pub fixed_count: usize,
    pub saved_bytes: u64,
    pub old_size_bytes: u64,
    pub new_size_bytes: u64,
    pub old_size_mb: f64,
    pub new_size_mb: f64,
    /// Reduction in autoload size, in percent
    pub performance_improvement: f64,
}

fn megabytes(bytes: u64) -> f64 {
    (bytes as f64 / MIB * 100.0).round() / 100.0
}

/// Reads and adjusts the autoload flags in the options table
pub struct AutoloadInspector<'a> {
    tables: SiteTables<'a>,
    threshold: u64,
}

impl<'a> AutoloadInspector<'a> {
    /// Inspector treating options above `threshold` bytes as large
    #[must_use]
    pub fn new(db: &'a Database, prefix: &'a str, threshold: u64) -> Self {
        Self {
            tables: SiteTables::new(db, prefix),
            threshold,
        }
    }

    /// Total size and count of autoloaded options
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn totals(&self) -> MaintenanceResult<(u64, u64)> {
        let size = self.tables.scalar(
            "options",
            "SELECT SUM(LENGTH(CAST(option_value AS BLOB))) FROM {t} WHERE autoload = 'yes'",
            [],
        )?;
        let count = self.tables.scalar(
            "options",
            "SELECT COUNT(*) FROM {t} WHERE autoload = 'yes'",
            [],
        )?;
        Ok((size, count))
    }

    /// Large autoloaded options that may be switched off, largest first
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn large_options(&self) -> MaintenanceResult<Vec<LargeOption>> {
        let Some(table) = self.tables.table("options")? else {
            return Ok(Vec::new());
        };
        let mut stmt = self.tables.db().connection().prepare(&format!(
            r"
            SELECT option_name, LENGTH(CAST(option_value AS BLOB)) AS size_bytes
            FROM {table}
            WHERE autoload = 'yes' AND LENGTH(CAST(option_value AS BLOB)) > ?1
            ORDER BY size_bytes DESC, option_name
            "
        ))?;
        let rows = stmt.query_map(params![self.threshold as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut options = Vec::new();
        for row in rows {
            let (name, size) = row?;
            if CRITICAL_OPTIONS.contains(&name.as_str()) {
                continue;
            }
            let size_bytes = size.max(0) as u64;
            options.push(LargeOption {
                name,
                size_bytes,
                size: format_bytes(size_bytes),
            });
        }
        Ok(options)
    }

    /// Current autoload statistics
    ///
    /// # Errors
    /// Returns an error if a query fails
    pub fn stats(&self) -> MaintenanceResult<AutoloadStats> {
        let (size_bytes, count) = self.totals()?;
        let large = self.large_options()?;
        let savings: u64 = large.iter().map(|o| o.size_bytes).sum();
        Ok(AutoloadStats {
            size_bytes,
            size_mb: megabytes(size_bytes),
            count,
            large_options_count: large.len(),
            potential_savings_bytes: savings,
            potential_savings_mb: megabytes(savings),
        })
    }

    /// Switch every large, non-critical option to load on demand
    ///
    /// Returns the number of options changed and their combined size.
    ///
    /// # Errors
    /// Returns an error if a query or update fails
    pub fn disable_large(&self) -> MaintenanceResult<(usize, u64)> {
        let large = self.large_options()?;
        let mut saved = 0;
        for option in &large {
            self.tables.execute(
                "options",
                "UPDATE {t} SET autoload = 'no' WHERE option_name = ?1",
                params![option.name],
            )?;
            saved += option.size_bytes;
        }
        Ok((large.len(), saved))
    }

    /// Run the fixer and report the before and after footprint
    ///
    /// # Errors
    /// Returns an error if a query or update fails
    pub fn fix(&self) -> MaintenanceResult<AutoloadFixReport> {
        let (old_size, _) = self.totals()?;
        let (fixed_count, saved_bytes) = self.disable_large()?;
        let (new_size, _) = self.totals()?;

        let improvement = if old_size > 0 {
            ((old_size - new_size.min(old_size)) as f64 / old_size as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        let report = AutoloadFixReport {
            fixed_count,
            saved_bytes,
            old_size_bytes: old_size,
            new_size_bytes: new_size,
            old_size_mb: megabytes(old_size),
            new_size_mb: megabytes(new_size),
            performance_improvement: improvement,
        };
        history::record(
            "autoload fixer",
            "fix",
            &format!("Optimized {fixed_count} autoloaded options"),
            &report,
        );
        Ok(report)
    }
}
