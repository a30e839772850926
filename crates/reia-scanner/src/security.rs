//! File-level security checks
//!
//! Covers what can be judged from disk alone: risky constructs in plugin
//! code, permissions on sensitive files and flags set in the site
//! configuration file.

use crate::error::{ScanError, ScanResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
    Info,
}

/// One named check with its verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl SecurityCheck {
    /// Build a check that passes when `ok` holds and otherwise takes `failing`
    #[must_use]
    pub fn verdict(
        name: &str,
        ok: bool,
        failing: CheckStatus,
        message: String,
        recommendation: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: if ok { CheckStatus::Pass } else { failing },
            message,
            recommendation: (!ok).then(|| recommendation.to_string()),
        }
    }
}

/// Kind of risky construct found in code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeIssueKind {
    Eval,
    RemoteInclusion,
    SqlInjection,
    UnescapedOutput,
}

impl CodeIssueKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Eval => "Contains eval() function in",
            Self::RemoteInclusion => "Remote file inclusion in",
            Self::SqlInjection => "Potential SQL injection in",
            Self::UnescapedOutput => "Unescaped user input output in",
        }
    }
}

/// A risky construct found in a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeIssue {
    pub kind: CodeIssueKind,
    pub file: PathBuf,
    pub message: String,
}

/// Regex-based auditor for PHP sources
#[derive(Debug, Clone)]
pub struct CodeAuditor {
    eval: Regex,
    remote_include: Regex,
    raw_query: Regex,
    prepared: Regex,
    echo_input: Regex,
}

fn compile(source: &str) -> ScanResult<Regex> {
    Regex::new(source).map_err(|e| ScanError::Pattern {
        pattern: source.to_string(),
        source: e,
    })
}

impl CodeAuditor {
    /// Compile the audit rules
    ///
    /// # Errors
    /// Returns an error if a rule fails to compile
    pub fn new() -> ScanResult<Self> {
        Ok(Self {
            eval: compile(r"\beval\s*\(")?,
            remote_include: compile(r#"file_get_contents\s*\(\s*['"]https?:"#)?,
            raw_query: compile(r"\$wpdb->(query|get_|prepare)\s*\([^)]*\$[^)]*\)")?,
            prepared: compile(r"\$wpdb->prepare")?,
            echo_input: compile(r"echo\s+\$_(GET|POST|REQUEST)")?,
        })
    }

    /// Audit one file's contents
    pub fn audit_source(&self, file: &Path, content: &str) -> Vec<CodeIssue> {
        let mut kinds = Vec::new();

        if self.eval.is_match(content) {
            kinds.push(CodeIssueKind::Eval);
        }
        if self.remote_include.is_match(content) {
            kinds.push(CodeIssueKind::RemoteInclusion);
        }
        // A file that prepares anywhere is given the benefit of the doubt
        if self.raw_query.is_match(content) && !self.prepared.is_match(content) {
            kinds.push(CodeIssueKind::SqlInjection);
        }
        if self.echo_input.is_match(content) {
            kinds.push(CodeIssueKind::UnescapedOutput);
        }

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        kinds
            .into_iter()
            .map(|kind| CodeIssue {
                kind,
                file: file.to_path_buf(),
                message: format!("{} {name}", kind.describe()),
            })
            .collect()
    }

    /// Audit every `.php` file below a directory
    ///
    /// A missing directory yields no issues. Unreadable or non-UTF-8 files
    /// are skipped.
    pub fn audit_directory(&self, dir: &Path) -> Vec<CodeIssue> {
        if !dir.is_dir() {
            return Vec::new();
        }

        let mut issues = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false).into_iter().flatten() {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("php")
            {
                continue;
            }
            match fs::read_to_string(path) {
                Ok(content) => issues.extend(self.audit_source(path, &content)),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping file"),
            }
        }
        issues
    }
}

/// Flags parsed from the site configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFlags {
    pub disallow_file_edit: bool,
    pub debug: bool,
}

impl ConfigFlags {
    /// Parse `define('NAME', true)` flags from a configuration file
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read
    pub fn read(config_file: &Path) -> ScanResult<Self> {
        if !config_file.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_file)?;
        Self::parse(&content)
    }

    /// Parse flags from configuration source text
    ///
    /// # Errors
    /// Returns an error if the flag pattern fails to compile
    pub fn parse(content: &str) -> ScanResult<Self> {
        let enabled = |name: &str| -> ScanResult<bool> {
            let rule = compile(&format!(
                r#"(?i)define\s*\(\s*['"]{name}['"]\s*,\s*true\s*\)"#
            ))?;
            Ok(rule.is_match(content))
        };

        Ok(Self {
            disallow_file_edit: enabled("DISALLOW_FILE_EDIT")?,
            debug: enabled("WP_DEBUG")?,
        })
    }

    /// Security checks derived from these flags
    #[must_use]
    pub fn checks(&self) -> Vec<SecurityCheck> {
        vec![
            SecurityCheck::verdict(
                "file_editing",
                self.disallow_file_edit,
                CheckStatus::Warning,
                if self.disallow_file_edit {
                    "File editing disabled".to_string()
                } else {
                    "File editing enabled".to_string()
                },
                "Add DISALLOW_FILE_EDIT to wp-config.php",
            ),
            SecurityCheck::verdict(
                "debug_mode",
                !self.debug,
                CheckStatus::Warning,
                if self.debug {
                    "Debug mode enabled".to_string()
                } else {
                    "Debug mode disabled".to_string()
                },
                "Disable debug mode in production",
            ),
        ]
    }
}

/// Sensitive paths and their expected Unix modes
const PERMISSION_TARGETS: [(&str, u32, bool); 4] = [
    ("wp-config.php", 0o600, true),
    (".htaccess", 0o644, false),
    ("wp-content", 0o755, false),
    ("wp-content/uploads", 0o755, false),
];

/// Compare permissions of sensitive paths under the site root
///
/// Paths that do not exist are not reported. On non-Unix platforms no
/// checks are produced.
#[must_use]
pub fn check_permissions(site_root: &Path) -> Vec<SecurityCheck> {
    let mut checks = Vec::new();

    for (relative, expected, critical) in PERMISSION_TARGETS {
        let path = site_root.join(relative);
        let Some(current) = unix_mode(&path) else {
            continue;
        };

        let status = if current == expected {
            CheckStatus::Pass
        } else if critical {
            CheckStatus::Fail
        } else {
            CheckStatus::Warning
        };

        checks.push(SecurityCheck {
            name: relative.to_string(),
            status,
            message: format!("{relative} permissions: {current:o} (expected: {expected:o})"),
            recommendation: (status != CheckStatus::Pass)
                .then(|| format!("chmod {expected:o} {relative}")),
        });
    }

    checks
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn unix_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auditor() -> CodeAuditor {
        CodeAuditor::new().unwrap()
    }

    #[test]
    fn test_detects_eval() {
        let issues = auditor().audit_source(Path::new("x/evil.php"), "<?php eval ($code);");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, CodeIssueKind::Eval);
        assert_eq!(issues[0].message, "Contains eval() function in evil.php");
    }

    #[test]
    fn test_ignores_medieval() {
        let issues = auditor().audit_source(Path::new("a.php"), "$medieval(1);");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_raw_query_excused_by_prepare() {
        let raw = r#"$wpdb->query("DELETE FROM t WHERE id = $id");"#;
        let issues = auditor().audit_source(Path::new("a.php"), raw);
        assert_eq!(issues[0].kind, CodeIssueKind::SqlInjection);

        let prepared = format!("{raw}\n$wpdb->prepare('x');");
        assert!(auditor().audit_source(Path::new("a.php"), &prepared).is_empty());
    }

    #[test]
    fn test_remote_include_and_echo() {
        let src = "file_get_contents('https://x.test/a'); echo $_GET['q'];";
        let kinds: Vec<_> = auditor()
            .audit_source(Path::new("a.php"), src)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![CodeIssueKind::RemoteInclusion, CodeIssueKind::UnescapedOutput]
        );
    }

    #[test]
    fn test_config_flags_parse() {
        let flags = ConfigFlags::parse(
            "define( 'WP_DEBUG', true );\ndefine('DISALLOW_FILE_EDIT', false);",
        )
        .unwrap();
        assert!(flags.debug);
        assert!(!flags.disallow_file_edit);

        let checks = flags.checks();
        assert_eq!(checks[0].status, CheckStatus::Warning);
        assert_eq!(checks[1].status, CheckStatus::Warning);
        assert!(checks[1].recommendation.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_check_flags_world_readable_config() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("wp-config.php");
        fs::write(&config, "<?php").unwrap();
        fs::set_permissions(&config, fs::Permissions::from_mode(0o644)).unwrap();

        let checks = check_permissions(temp.path());
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, CheckStatus::Fail);
        assert_eq!(checks[0].message, "wp-config.php permissions: 644 (expected: 600)");
    }
}
