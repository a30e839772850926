//! Database optimizer
//!
//! Removes revisions, spam, trash and orphaned metadata, switches large
//! options off autoload and reclaims free pages.

use super::autoload::{AutoloadInspector, LargeOption};
use super::{MaintenanceError, MaintenanceResult, SiteTables};
use crate::db::{quote_ident, Database};
use crate::history;
use reia_scanner::format_bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum number of items listed in a preview
const PREVIEW_LIMIT: usize = 10;

/// Optimization steps a caller can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeOption {
    Autoload,
    Revisions,
    Spam,
    Trash,
    Orphaned,
    Optimize,
}

impl OptimizeOption {
    pub const ALL: [OptimizeOption; 6] = [
        OptimizeOption::Autoload,
        OptimizeOption::Revisions,
        OptimizeOption::Spam,
        OptimizeOption::Trash,
        OptimizeOption::Orphaned,
        OptimizeOption::Optimize,
    ];
}

impl FromStr for OptimizeOption {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "autoload" => Ok(Self::Autoload),
            "revisions" => Ok(Self::Revisions),
            "spam" => Ok(Self::Spam),
            "trash" => Ok(Self::Trash),
            "orphaned" => Ok(Self::Orphaned),
            "optimize" => Ok(Self::Optimize),
            _ => Err(MaintenanceError::UnknownOption(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoloadPreview {
    pub will_fix_count: usize,
    /// The largest few options
    pub options: Vec<LargeOption>,
    pub total_savings: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountPreview {
    pub will_delete_count: u64,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanedPreview {
    pub postmeta_count: u64,
    pub usermeta_count: u64,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverheadPreview {
    pub overhead_bytes: u64,
    pub total_overhead: String,
    pub description: &'static str,
}

/// What an optimization run would change
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizePreview {
    pub dry_run: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoload: Option<AutoloadPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisions: Option<CountPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spam: Option<CountPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash: Option<CountPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<OrphanedPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize: Option<OverheadPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoloadFixed {
    pub fixed_options: usize,
    pub saved_bytes: u64,
    pub saved: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanedDeleted {
    pub postmeta_deleted: u64,
    pub usermeta_deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reclaimed {
    pub reclaimed_bytes: u64,
    pub reclaimed: String,
}

/// What an optimization run changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoload: Option<AutoloadFixed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Deleted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spam: Option<Deleted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash: Option<Deleted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<OrphanedDeleted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize: Option<Reclaimed>,
}

const REVISIONS: &str = "post_type = 'revision'";
const SPAM: &str = "comment_approved = 'spam'";
const TRASH: &str = "post_status = 'trash'";

/// Free pages left behind by deletes, in bytes
///
/// # Errors
/// Returns an error if the pragmas cannot be read
pub fn overhead_bytes(db: &Database) -> MaintenanceResult<u64> {
    Ok(db.free_bytes()?)
}

/// Rebuild the database file and refresh planner statistics
///
/// Returns the number of bytes reclaimed.
///
/// # Errors
/// Returns an error if `VACUUM` or `ANALYZE` fails
pub fn reclaim_space(db: &Database) -> MaintenanceResult<u64> {
    let before = db.free_bytes()?;
    db.connection().execute_batch("VACUUM; ANALYZE;")?;
    let after = db.free_bytes()?;
    Ok(before.saturating_sub(after))
}

/// Runs the selected optimization steps
pub struct DatabaseOptimizer<'a> {
    tables: SiteTables<'a>,
    autoload: AutoloadInspector<'a>,
}

impl<'a> DatabaseOptimizer<'a> {
    /// Optimizer for tables under `prefix`
    #[must_use]
    pub fn new(db: &'a Database, prefix: &'a str, large_option_bytes: u64) -> Self {
        Self {
            tables: SiteTables::new(db, prefix),
            autoload: AutoloadInspector::new(db, prefix, large_option_bytes),
        }
    }

    fn count(&self, base: &str, filter: &str) -> MaintenanceResult<u64> {
        self.tables
            .scalar(base, &format!("SELECT COUNT(*) FROM {{t}} WHERE {filter}"), [])
    }

    fn delete(&self, base: &str, filter: &str) -> MaintenanceResult<u64> {
        self.tables
            .execute(base, &format!("DELETE FROM {{t}} WHERE {filter}"), [])
    }

    /// Filter selecting `meta` rows whose `owner` no longer exists, or
    /// `None` when either table is missing
    fn orphan_filter(
        &self,
        meta: &str,
        owner: &str,
        key: &str,
    ) -> MaintenanceResult<Option<String>> {
        let exists = self.tables.db().table_exists(&self.tables.name(meta))?
            && self.tables.db().table_exists(&self.tables.name(owner))?;
        Ok(exists.then(|| {
            format!(
                "{key} NOT IN (SELECT ID FROM {})",
                quote_ident(&self.tables.name(owner))
            )
        }))
    }

    fn orphans(&self, delete: bool) -> MaintenanceResult<(u64, u64)> {
        let pairs = [
            ("postmeta", "posts", "post_id"),
            ("usermeta", "users", "user_id"),
        ];
        let mut counts = [0; 2];
        for (slot, (meta, owner, key)) in pairs.into_iter().enumerate() {
            if let Some(filter) = self.orphan_filter(meta, owner, key)? {
                counts[slot] = if delete {
                    self.delete(meta, &filter)?
                } else {
                    self.count(meta, &filter)?
                };
            }
        }
        Ok((counts[0], counts[1]))
    }

    /// Report what the selected steps would change
    ///
    /// # Errors
    /// Returns an error if a query fails
    pub fn preview(&self, options: &[OptimizeOption]) -> MaintenanceResult<OptimizePreview> {
        let mut preview = OptimizePreview {
            dry_run: true,
            message: "Preview of database optimization changes:".to_string(),
            ..OptimizePreview::default()
        };

        for option in options {
            match option {
                OptimizeOption::Autoload => {
                    let large = self.autoload.large_options()?;
                    let savings: u64 = large.iter().map(|o| o.size_bytes).sum();
                    preview.autoload = Some(AutoloadPreview {
                        will_fix_count: large.len(),
                        options: large.into_iter().take(PREVIEW_LIMIT).collect(),
                        total_savings: format_bytes(savings),
                        description: "Large autoloaded options that will be changed to non-autoload",
                    });
                }
                OptimizeOption::Revisions => {
                    preview.revisions = Some(CountPreview {
                        will_delete_count: self.count("posts", REVISIONS)?,
                        description: "Post revisions that will be permanently deleted",
                    });
                }
                OptimizeOption::Spam => {
                    preview.spam = Some(CountPreview {
                        will_delete_count: self.count("comments", SPAM)?,
                        description: "Spam comments that will be permanently deleted",
                    });
                }
                OptimizeOption::Trash => {
                    preview.trash = Some(CountPreview {
                        will_delete_count: self.count("posts", TRASH)?,
                        description: "Trashed posts that will be permanently deleted",
                    });
                }
                OptimizeOption::Orphaned => {
                    let (postmeta_count, usermeta_count) = self.orphans(false)?;
                    preview.orphaned = Some(OrphanedPreview {
                        postmeta_count,
                        usermeta_count,
                        description: "Orphaned metadata with no associated posts/users",
                    });
                }
                OptimizeOption::Optimize => {
                    let overhead = overhead_bytes(self.tables.db())?;
                    preview.optimize = Some(OverheadPreview {
                        overhead_bytes: overhead,
                        total_overhead: format_bytes(overhead),
                        description: "Free space that will be reclaimed from the database file",
                    });
                }
            }
        }
        Ok(preview)
    }

    /// Apply the selected steps
    ///
    /// Space is reclaimed last so it includes pages freed by the other
    /// steps.
    ///
    /// # Errors
    /// Returns an error if a query or update fails
    pub fn run(&self, options: &[OptimizeOption]) -> MaintenanceResult<OptimizeReport> {
        let mut report = OptimizeReport::default();
        let selected = |o| options.contains(&o);

        if selected(OptimizeOption::Autoload) {
            let (fixed_options, saved_bytes) = self.autoload.disable_large()?;
            report.autoload = Some(AutoloadFixed {
                fixed_options,
                saved_bytes,
                saved: format_bytes(saved_bytes),
            });
        }
        if selected(OptimizeOption::Revisions) {
            report.revisions = Some(Deleted {
                deleted_count: self.delete("posts", REVISIONS)?,
            });
        }
        if selected(OptimizeOption::Spam) {
            report.spam = Some(Deleted {
                deleted_count: self.delete("comments", SPAM)?,
            });
        }
        if selected(OptimizeOption::Trash) {
            report.trash = Some(Deleted {
                deleted_count: self.delete("posts", TRASH)?,
            });
        }
        if selected(OptimizeOption::Orphaned) {
            let (postmeta_deleted, usermeta_deleted) = self.orphans(true)?;
            report.orphaned = Some(OrphanedDeleted {
                postmeta_deleted,
                usermeta_deleted,
            });
        }
        if selected(OptimizeOption::Optimize) {
            let reclaimed_bytes = reclaim_space(self.tables.db())?;
            report.optimize = Some(Reclaimed {
                reclaimed_bytes,
                reclaimed: format_bytes(reclaimed_bytes),
            });
        }

        history::record("database optimizer", "optimize", "Optimized database", &report);
        Ok(report)
    }
}
