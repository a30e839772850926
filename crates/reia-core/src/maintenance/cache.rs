//! Transient cache cleanup

use super::{MaintenanceError, MaintenanceResult, SiteTables};
use crate::db::Database;
use crate::history;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const ALL_TRANSIENTS: &str = r"
    option_name LIKE '\_transient\_%' ESCAPE '\'
    OR option_name LIKE '\_site\_transient\_%' ESCAPE '\'";

const EXPIRED_TIMEOUTS: &str = r"
    (option_name LIKE '\_transient\_timeout\_%' ESCAPE '\'
     OR option_name LIKE '\_site\_transient\_timeout\_%' ESCAPE '\')
    AND CAST(option_value AS INTEGER) < ?1";

/// Cache groups that can be cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOption {
    /// Every transient, expired or not
    Transients,
    /// Transients past their timeout, with their timeout rows
    ExpiredTransients,
}

impl CacheOption {
    pub const ALL: [CacheOption; 2] = [CacheOption::Transients, CacheOption::ExpiredTransients];
}

impl FromStr for CacheOption {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "transients" => Ok(Self::Transients),
            "expired_transients" | "expired" => Ok(Self::ExpiredTransients),
            _ => Err(MaintenanceError::UnknownOption(s.to_string())),
        }
    }
}

/// What clearing would remove
#[derive(Debug, Clone, Default, Serialize)]
pub struct CachePreview {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transients: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_transients: Option<u64>,
    pub message: String,
}

/// Rows removed per cache group
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transients: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_transients: Option<u64>,
}

/// Clears cached rows from the options table
pub struct CacheCleaner<'a> {
    tables: SiteTables<'a>,
}

impl<'a> CacheCleaner<'a> {
    #[must_use]
    pub fn new(db: &'a Database, prefix: &'a str) -> Self {
        Self {
            tables: SiteTables::new(db, prefix),
        }
    }

    /// Count what each selected group would remove
    ///
    /// # Errors
    /// Returns an error if a query fails
    pub fn preview(&self, options: &[CacheOption]) -> MaintenanceResult<CachePreview> {
        let mut preview = CachePreview {
            dry_run: true,
            message: "These cache types will be cleared:".to_string(),
            ..CachePreview::default()
        };
        for option in options {
            match option {
                CacheOption::Transients => {
                    preview.transients = Some(self.tables.scalar(
                        "options",
                        &format!("SELECT COUNT(*) FROM {{t}} WHERE {ALL_TRANSIENTS}"),
                        [],
                    )?);
                }
                CacheOption::ExpiredTransients => {
                    preview.expired_transients = Some(self.tables.scalar(
                        "options",
                        &format!("SELECT COUNT(*) FROM {{t}} WHERE {EXPIRED_TIMEOUTS}"),
                        params![Utc::now().timestamp()],
                    )?);
                }
            }
        }
        Ok(preview)
    }

    /// Delete every transient
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn clear_transients(&self) -> MaintenanceResult<u64> {
        self.tables.execute(
            "options",
            &format!("DELETE FROM {{t}} WHERE {ALL_TRANSIENTS}"),
            [],
        )
    }

    /// Delete transients whose timeout has passed, with their timeout rows
    ///
    /// # Errors
    /// Returns an error if a delete fails
    pub fn clear_expired(&self) -> MaintenanceResult<u64> {
        let now = Utc::now().timestamp();
        let tx = self.tables.db().connection().unchecked_transaction()?;
        let values = self.tables.execute(
            "options",
            &format!(
                r"
                DELETE FROM {{t}} WHERE option_name IN (
                    SELECT CASE
                        WHEN option_name LIKE '\_site\_%' ESCAPE '\'
                            THEN '_site_transient_' || substr(option_name, 25)
                        ELSE '_transient_' || substr(option_name, 20)
                    END
                    FROM {{t}} WHERE {EXPIRED_TIMEOUTS}
                )"
            ),
            params![now],
        )?;
        let timeouts = self.tables.execute(
            "options",
            &format!("DELETE FROM {{t}} WHERE {EXPIRED_TIMEOUTS}"),
            params![now],
        )?;
        tx.commit()?;
        Ok(values + timeouts)
    }

    /// Clear the selected groups
    ///
    /// # Errors
    /// Returns an error if a delete fails
    pub fn run(&self, options: &[CacheOption]) -> MaintenanceResult<CacheReport> {
        let mut report = CacheReport::default();
        // Expired before all, otherwise its count is always zero
        if options.contains(&CacheOption::ExpiredTransients) {
            report.expired_transients = Some(self.clear_expired()?);
        }
        if options.contains(&CacheOption::Transients) {
            report.transients = Some(self.clear_transients()?);
        }
        history::record("cache cleaner", "clear", "Cleared cache", &report);
        Ok(report)
    }
}
