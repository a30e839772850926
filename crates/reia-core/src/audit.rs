//! Security audit
//!
//! Combines the file-level checks from `reia_scanner::security` with
//! checks on the user and option tables, and scores the result.

use crate::config::SiteConfig;
use crate::db::{quote_ident, Database};
use crate::maintenance::MaintenanceResult;
use reia_scanner::security::check_permissions;
use reia_scanner::{CheckStatus, CodeAuditor, CodeIssue, ConfigFlags, SecurityCheck};
use rusqlite::params;
use serde::Serialize;

/// Administrator logins that are guessed first by attackers
pub const WEAK_ADMIN_NAMES: [&str; 4] = ["admin", "administrator", "root", "test"];

const DEFAULT_PREFIX: &str = "wp_";

/// Full audit result, grouped by area
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub core: Vec<SecurityCheck>,
    pub permissions: Vec<SecurityCheck>,
    pub users: Vec<SecurityCheck>,
    pub plugins: Vec<SecurityCheck>,
    pub configuration: Vec<SecurityCheck>,
    /// Individual findings behind the plugin code check
    pub code_issues: Vec<CodeIssue>,
    /// Percentage of checks that passed, rounded
    pub score: u32,
}

impl SecurityReport {
    /// Every check in report order
    pub fn checks(&self) -> impl Iterator<Item = &SecurityCheck> {
        self.core
            .iter()
            .chain(&self.permissions)
            .chain(&self.users)
            .chain(&self.plugins)
            .chain(&self.configuration)
    }
}

/// Score checks as the rounded percentage that passed; zero checks score 0
#[must_use]
pub fn security_score(checks: &[&SecurityCheck]) -> u32 {
    if checks.is_empty() {
        return 0;
    }
    let passed = checks.iter().filter(|c| c.status == CheckStatus::Pass).count();
    (passed as f64 / checks.len() as f64 * 100.0).round() as u32
}

/// Runs the security checks for one site
pub struct SecurityAudit<'a> {
    config: &'a SiteConfig,
    db: Option<&'a Database>,
}

impl<'a> SecurityAudit<'a> {
    #[must_use]
    pub fn new(config: &'a SiteConfig, db: Option<&'a Database>) -> Self {
        Self { config, db }
    }

    fn table(&self, db: &Database, base: &str) -> MaintenanceResult<Option<String>> {
        let name = format!("{}{base}", self.config.table_prefix());
        Ok(db.table_exists(&name)?.then(|| quote_ident(&name)))
    }

    /// Logins of users holding the administrator role
    fn administrators(&self, db: &Database) -> MaintenanceResult<Vec<String>> {
        let (Some(users), Some(usermeta)) = (self.table(db, "users")?, self.table(db, "usermeta")?)
        else {
            return Ok(Vec::new());
        };
        let mut stmt = db.connection().prepare(&format!(
            r"
            SELECT u.user_login FROM {users} u
            JOIN {usermeta} m ON m.user_id = u.ID
            WHERE m.meta_key = ?1 AND m.meta_value LIKE '%administrator%'
            ORDER BY u.user_login
            "
        ))?;
        let capabilities = format!("{}capabilities", self.config.table_prefix());
        let logins = stmt
            .query_map(params![capabilities], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(logins)
    }

    fn core_checks(&self) -> MaintenanceResult<Vec<SecurityCheck>> {
        let mut checks = Vec::new();

        if let Some(db) = self.db {
            let weak: Vec<String> = self
                .administrators(db)?
                .into_iter()
                .filter(|login| WEAK_ADMIN_NAMES.contains(&login.as_str()))
                .collect();
            checks.push(SecurityCheck::verdict(
                "admin_usernames",
                weak.is_empty(),
                CheckStatus::Fail,
                if weak.is_empty() {
                    "No weak admin usernames found".to_string()
                } else {
                    format!("Weak admin usernames: {}", weak.join(", "))
                },
                "Change weak admin usernames",
            ));
        }

        let prefix = self.config.table_prefix();
        checks.push(SecurityCheck::verdict(
            "table_prefix",
            prefix != DEFAULT_PREFIX,
            CheckStatus::Warning,
            format!("Database prefix: {prefix}"),
            "Consider changing the database table prefix",
        ));
        Ok(checks)
    }

    fn user_checks(&self) -> MaintenanceResult<Vec<SecurityCheck>> {
        let Some(db) = self.db else {
            return Ok(Vec::new());
        };
        let Some(users) = self.table(db, "users")? else {
            return Ok(Vec::new());
        };
        let matching: i64 = db.connection().query_row(
            &format!("SELECT COUNT(*) FROM {users} WHERE user_login = display_name"),
            [],
            |row| row.get(0),
        )?;
        Ok(vec![SecurityCheck::verdict(
            "user_display_names",
            matching == 0,
            CheckStatus::Warning,
            if matching == 0 {
                "No users with login as display name".to_string()
            } else {
                format!("{matching} users using login as display name")
            },
            "Change display names to not match usernames",
        )])
    }

    fn plugin_checks(&self) -> MaintenanceResult<(Vec<SecurityCheck>, Vec<CodeIssue>)> {
        let plugins = self.config.content_dir().join("plugins");
        let issues = CodeAuditor::new()?.audit_directory(&plugins);
        let check = SecurityCheck::verdict(
            "plugin_code",
            issues.is_empty(),
            CheckStatus::Warning,
            if issues.is_empty() {
                "No risky constructs found in plugin code".to_string()
            } else {
                format!("{} potential issues found in plugin code", issues.len())
            },
            "Review the flagged plugin files or replace the plugins",
        );
        Ok((vec![check], issues))
    }

    /// Run every check and compute the score
    ///
    /// Checks that need the database are left out when none is
    /// configured.
    ///
    /// # Errors
    /// Returns an error if a query fails or the configuration file cannot
    /// be read
    pub fn run(&self) -> MaintenanceResult<SecurityReport> {
        let (plugins, code_issues) = self.plugin_checks()?;
        let mut report = SecurityReport {
            core: self.core_checks()?,
            permissions: check_permissions(&self.config.site_root),
            users: self.user_checks()?,
            plugins,
            configuration: ConfigFlags::read(&self.config.config_file())?.checks(),
            code_issues,
            score: 0,
        };
        report.score = security_score(&report.checks().collect::<Vec<_>>());
        tracing::info!(score = report.score, "security audit finished");
        Ok(report)
    }
}
