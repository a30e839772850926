//! Performance analysis and quick optimizations

use super::autoload::AutoloadInspector;
use super::cache::CacheCleaner;
use super::optimizer::{overhead_bytes, reclaim_space};
use super::{MaintenanceResult, SiteTables};
use crate::archive::measure_directory;
use crate::config::SiteConfig;
use crate::db::Database;
use crate::history;
use reia_scanner::{format_bytes, ConfigFlags, ExclusionSet};
use serde::Serialize;
use std::fs;

const MIB: u64 = 1024 * 1024;
const OVERHEAD_WARNING: u64 = MIB;
const AUTOLOAD_WARNING: u64 = MIB;
const THEME_SIZE_WARNING: u64 = 10 * MIB;
const STYLESHEET_WARNING: u64 = MIB;
const PLUGIN_COUNT_WARNING: usize = 30;
const ENQUEUE_WARNING: usize = 10;

/// Verdict of one performance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerfStatus {
    Good,
    Warning,
    Info,
}

/// One performance check
#[derive(Debug, Clone, Serialize)]
pub struct PerfCheck {
    pub name: &'static str,
    pub status: PerfStatus,
    pub message: String,
}

impl PerfCheck {
    fn new(name: &'static str, warn: bool, message: String) -> Self {
        Self {
            name,
            status: if warn { PerfStatus::Warning } else { PerfStatus::Good },
            message,
        }
    }
}

/// Result of an analysis
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub checks: Vec<PerfCheck>,
    /// 100 minus 10 per warning, never below 0
    pub overall_score: u32,
}

impl PerformanceReport {
    fn new(checks: Vec<PerfCheck>) -> Self {
        let warnings = checks
            .iter()
            .filter(|c| c.status == PerfStatus::Warning)
            .count() as u32;
        Self {
            overall_score: 100u32.saturating_sub(warnings * 10),
            checks,
        }
    }

    /// Number of checks that produced a warning
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == PerfStatus::Warning)
            .count()
    }
}

/// Result of the quick optimizations
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceOptimizeReport {
    pub reclaimed_bytes: u64,
    pub reclaimed: String,
    pub expired_transients_deleted: u64,
    pub message: String,
}

/// Count entries in a serialized PHP array (`a:<n>:{...}`)
fn serialized_array_len(value: &str) -> Option<usize> {
    value.strip_prefix("a:")?.split_once(':')?.0.parse().ok()
}

/// Analyzes one site's database and files
pub struct PerformanceAnalyzer<'a> {
    config: &'a SiteConfig,
    db: Option<&'a Database>,
}

impl<'a> PerformanceAnalyzer<'a> {
    #[must_use]
    pub fn new(config: &'a SiteConfig, db: Option<&'a Database>) -> Self {
        Self { config, db }
    }

    fn option_value(&self, db: &Database, name: &str) -> MaintenanceResult<Option<String>> {
        SiteTables::new(db, self.config.table_prefix()).option(name)
    }

    fn database_checks(
        &self,
        db: &Database,
        checks: &mut Vec<PerfCheck>,
    ) -> MaintenanceResult<()> {
        let overhead = overhead_bytes(db)?;
        checks.push(PerfCheck::new(
            "table_overhead",
            overhead > OVERHEAD_WARNING,
            format!("Reclaimable database space: {}", format_bytes(overhead)),
        ));

        let autoload = AutoloadInspector::new(
            db,
            self.config.table_prefix(),
            self.config.limits.large_option_bytes,
        );
        let (autoload_size, _) = autoload.totals()?;
        checks.push(PerfCheck::new(
            "autoload_size",
            autoload_size > AUTOLOAD_WARNING,
            format!("Autoloaded options: {}", format_bytes(autoload_size)),
        ));

        let large = autoload.large_options()?;
        checks.push(PerfCheck {
            name: "large_autoload_options",
            status: if large.is_empty() {
                PerfStatus::Good
            } else {
                PerfStatus::Info
            },
            message: format!(
                "{} large autoloaded options ({})",
                large.len(),
                format_bytes(large.iter().map(|o| o.size_bytes).sum())
            ),
        });

        if let Some(plugins) = self.option_value(db, "active_plugins")? {
            let count = serialized_array_len(&plugins).unwrap_or(0);
            checks.push(PerfCheck::new(
                "plugin_count",
                count > PLUGIN_COUNT_WARNING,
                format!("{count} active plugins"),
            ));
        }

        if let Some(theme) = self.option_value(db, "stylesheet")? {
            self.theme_checks(&theme, checks)?;
        }
        Ok(())
    }

    fn theme_checks(&self, theme: &str, checks: &mut Vec<PerfCheck>) -> MaintenanceResult<()> {
        if theme.is_empty() || theme.contains(['/', '\\']) || theme.contains("..") {
            return Ok(());
        }
        let dir = self.config.content_dir().join("themes").join(theme);
        if !dir.is_dir() {
            return Ok(());
        }

        let (size, _) = measure_directory(&dir, "", &ExclusionSet::new(), u64::MAX)?;
        checks.push(PerfCheck::new(
            "theme_size",
            size > THEME_SIZE_WARNING,
            format!("Theme size: {}", format_bytes(size)),
        ));

        let mut issues = Vec::new();
        if let Ok(meta) = fs::metadata(dir.join("style.css")) {
            if meta.len() > STYLESHEET_WARNING {
                issues.push(format!("Large CSS file ({})", format_bytes(meta.len())));
            }
        }
        if let Ok(functions) = fs::read_to_string(dir.join("functions.php")) {
            let enqueues = functions.matches("wp_enqueue_script").count()
                + functions.matches("wp_enqueue_style").count();
            if enqueues > ENQUEUE_WARNING {
                issues.push(format!("Many enqueued scripts/styles ({enqueues})"));
            }
        }
        checks.push(PerfCheck::new(
            "theme_issues",
            !issues.is_empty(),
            if issues.is_empty() {
                "No theme issues found".to_string()
            } else {
                issues.join("; ")
            },
        ));
        Ok(())
    }

    /// Run every check
    ///
    /// Database checks are skipped when no database is configured.
    ///
    /// # Errors
    /// Returns an error if a query fails or the configuration file
    /// cannot be read
    pub fn analyze(&self) -> MaintenanceResult<PerformanceReport> {
        let mut checks = Vec::new();
        if let Some(db) = self.db {
            self.database_checks(db, &mut checks)?;
        }

        let flags = ConfigFlags::read(&self.config.config_file())?;
        checks.push(PerfCheck::new(
            "debug_mode",
            flags.debug,
            if flags.debug {
                "Debug mode enabled".to_string()
            } else {
                "Debug mode disabled".to_string()
            },
        ));

        Ok(PerformanceReport::new(checks))
    }

    /// Reclaim free pages and delete expired transients
    ///
    /// Without a database there is nothing to optimize and an empty
    /// report is returned.
    ///
    /// # Errors
    /// Returns an error if a statement fails
    pub fn optimize(&self) -> MaintenanceResult<PerformanceOptimizeReport> {
        let Some(db) = self.db else {
            return Ok(PerformanceOptimizeReport {
                reclaimed_bytes: 0,
                reclaimed: format_bytes(0),
                expired_transients_deleted: 0,
                message: "No database configured".to_string(),
            });
        };

        let expired = CacheCleaner::new(db, self.config.table_prefix()).clear_expired()?;
        let reclaimed = reclaim_space(db)?;
        let report = PerformanceOptimizeReport {
            reclaimed_bytes: reclaimed,
            reclaimed: format_bytes(reclaimed),
            expired_transients_deleted: expired,
            message: format!(
                "Deleted {expired} expired transient rows, reclaimed {}",
                format_bytes(reclaimed)
            ),
        };
        history::record("performance booster", "optimize", &report.message, &report);
        Ok(report)
    }
}
