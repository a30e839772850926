//! Deletion of scanned files under safety rules
//!
//! Files are only removed when they sit under one of the scan roots. Core
//! platform directories and extension (theme/plugin) directories accept a
//! narrower set of extensions so that code is never deleted.

use crate::format::format_bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions deletable inside core platform directories
const CORE_DELETABLE: [&str; 3] = ["log", "tmp", "cache"];

/// Extensions deletable inside theme and plugin directories
const EXTENSION_DELETABLE: [&str; 4] = ["log", "tmp", "cache", "bak"];

/// Where deletion is permitted
#[derive(Debug, Clone, Default)]
pub struct SafetyRules {
    roots: Vec<PathBuf>,
    core_dirs: Vec<PathBuf>,
    extension_dirs: Vec<PathBuf>,
}

impl SafetyRules {
    /// Allow deletion under the given roots
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots: roots.iter().map(|p| canonical(p)).collect(),
            ..Self::default()
        }
    }

    /// Directories holding platform code (only logs, temp and cache files may go)
    #[must_use]
    pub fn with_core_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.core_dirs = dirs.iter().map(|p| canonical(p)).collect();
        self
    }

    /// Directories holding themes and plugins
    #[must_use]
    pub fn with_extension_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.extension_dirs = dirs.iter().map(|p| canonical(p)).collect();
        self
    }

    /// Check whether a path may be deleted, returning the refusal reason
    ///
    /// # Errors
    /// Returns a human-readable reason when deletion is refused
    pub fn check(&self, path: &Path) -> Result<PathBuf, String> {
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err("Path contains parent directory reference".to_string());
        }

        if path.is_symlink() {
            return Err("Symlinks are never deleted".to_string());
        }

        let resolved = path
            .canonicalize()
            .map_err(|_| "File does not exist".to_string())?;

        if !resolved.is_file() {
            return Err("Not a regular file".to_string());
        }

        if !self.roots.iter().any(|root| resolved.starts_with(root)) {
            return Err("Outside of the scanned directories".to_string());
        }

        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if self.core_dirs.iter().any(|d| resolved.starts_with(d))
            && !CORE_DELETABLE.contains(&extension.as_str())
        {
            return Err("Protected platform file".to_string());
        }

        if self.extension_dirs.iter().any(|d| resolved.starts_with(d))
            && !EXTENSION_DELETABLE.contains(&extension.as_str())
        {
            return Err("Protected theme or plugin file".to_string());
        }

        Ok(resolved)
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// A path the cleaner refused or failed to delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a clean run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanReport {
    /// Names of deleted files
    pub cleaned_files: Vec<String>,
    pub total_cleaned: usize,
    pub bytes_freed: u64,
    pub space_freed: String,
    pub skipped: Vec<SkippedFile>,
    pub message: String,
}

/// Deletes files that pass the safety rules
#[derive(Debug, Clone)]
pub struct FileCleaner {
    rules: SafetyRules,
}

impl FileCleaner {
    /// Create a cleaner
    #[must_use]
    pub fn new(rules: SafetyRules) -> Self {
        Self { rules }
    }

    /// Delete each path that passes the safety rules
    ///
    /// Refusals and IO failures are recorded and the run continues.
    pub fn clean(&self, paths: &[PathBuf]) -> CleanReport {
        let mut report = CleanReport::default();

        for path in paths {
            let resolved = match self.rules.check(path) {
                Ok(resolved) => resolved,
                Err(reason) => {
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let size = fs::metadata(&resolved).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&resolved) {
                Ok(()) => {
                    let name = resolved
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    report.cleaned_files.push(name);
                    report.bytes_freed += size;
                }
                Err(e) => {
                    tracing::warn!(path = %resolved.display(), error = %e, "failed to delete file");
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.total_cleaned = report.cleaned_files.len();
        report.space_freed = format_bytes(report.bytes_freed);
        report.message = format!(
            "Successfully cleaned {} files and freed {} of space.",
            report.total_cleaned, report.space_freed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, SafetyRules) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("wp-admin")).unwrap();
        fs::create_dir_all(root.join("wp-content/plugins/shop")).unwrap();
        fs::create_dir_all(root.join("wp-content/uploads")).unwrap();

        let rules = SafetyRules::new(vec![root.join("wp-content"), root.join("wp-admin")])
            .with_core_dirs(vec![root.join("wp-admin"), root.join("wp-includes")])
            .with_extension_dirs(vec![root.join("wp-content/plugins")]);
        (temp, rules)
    }

    #[test]
    fn test_core_dir_allows_only_logs() {
        let (temp, rules) = layout();
        let log = temp.path().join("wp-admin/error.log");
        let php = temp.path().join("wp-admin/index.php.bak");
        fs::write(&log, "x").unwrap();
        fs::write(&php, "x").unwrap();

        assert!(rules.check(&log).is_ok());
        assert_eq!(rules.check(&php).unwrap_err(), "Protected platform file");
    }

    #[test]
    fn test_plugin_dir_allows_bak() {
        let (temp, rules) = layout();
        let bak = temp.path().join("wp-content/plugins/shop/main.php.bak");
        let old = temp.path().join("wp-content/plugins/shop/main.php.old");
        fs::write(&bak, "x").unwrap();
        fs::write(&old, "x").unwrap();

        assert!(rules.check(&bak).is_ok());
        assert!(rules.check(&old).is_err());
    }

    #[test]
    fn test_outside_roots_refused() {
        let (_temp, rules) = layout();
        let other = TempDir::new().unwrap();
        let file = other.path().join("stray.log");
        fs::write(&file, "x").unwrap();

        assert_eq!(
            rules.check(&file).unwrap_err(),
            "Outside of the scanned directories"
        );
    }

    #[test]
    fn test_clean_reports_freed_space_and_skips() {
        let (temp, rules) = layout();
        let a = temp.path().join("wp-content/uploads/a.tmp");
        let b = temp.path().join("wp-content/uploads/b.log");
        fs::write(&a, vec![0u8; 1024]).unwrap();
        fs::write(&b, vec![0u8; 512]).unwrap();
        let missing = temp.path().join("wp-content/uploads/missing.log");

        let report = FileCleaner::new(rules).clean(&[a.clone(), b.clone(), missing]);

        assert_eq!(report.total_cleaned, 2);
        assert_eq!(report.bytes_freed, 1536);
        assert_eq!(report.space_freed, "1.5 KB");
        assert_eq!(report.skipped.len(), 1);
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
