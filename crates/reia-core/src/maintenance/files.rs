//! Cleanup of temporary, log, backup and cache files across the site

use super::MaintenanceResult;
use crate::config::SiteConfig;
use crate::history;
use reia_scanner::{CleanReport, DirectoryScanner, FileCleaner, SafetyRules, ScanOption, ScanReport};
use std::path::PathBuf;

/// File cleaner bound to one site's layout
pub struct SiteFileCleaner<'a> {
    config: &'a SiteConfig,
}

impl<'a> SiteFileCleaner<'a> {
    #[must_use]
    pub fn new(config: &'a SiteConfig) -> Self {
        Self { config }
    }

    fn scanner(&self, options: &[ScanOption]) -> MaintenanceResult<DirectoryScanner> {
        let scanner = DirectoryScanner::new(self.config.scan_roots(), options)?
            .with_max_age(self.config.limits.retention());
        Ok(scanner)
    }

    fn rules(&self) -> SafetyRules {
        SafetyRules::new(self.config.scan_roots())
            .with_core_dirs(self.config.core_dirs())
            .with_extension_dirs(self.config.extension_dirs())
    }

    /// Scan for cleanable files without deleting anything
    ///
    /// # Errors
    /// Returns an error if a built-in pattern fails to compile
    pub fn preview(&self, options: &[ScanOption]) -> MaintenanceResult<ScanReport> {
        let report = self
            .scanner(options)?
            .report(self.config.limits.preview_file_limit);
        Ok(report)
    }

    /// Delete `paths`, or the results of a fresh scan when none are given
    ///
    /// Paths outside the scan roots, or code files inside core and
    /// extension directories, are reported as skipped.
    ///
    /// # Errors
    /// Returns an error if a built-in pattern fails to compile
    pub fn clean(
        &self,
        options: &[ScanOption],
        paths: &[PathBuf],
    ) -> MaintenanceResult<CleanReport> {
        let targets = if paths.is_empty() {
            self.scanner(options)?
                .scan()
                .into_iter()
                .map(|entry| entry.path)
                .collect()
        } else {
            paths.to_vec()
        };

        let report = FileCleaner::new(self.rules()).clean(&targets);
        history::record("file cleaner", "clean", &report.message, &report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, SiteConfig) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("wp-content/plugins/shop")).unwrap();
        fs::create_dir_all(root.join("wp-admin")).unwrap();
        fs::write(root.join("wp-content/debug.log"), "line\n").unwrap();
        fs::write(root.join("wp-content/upgrade.tmp"), "partial").unwrap();
        fs::write(root.join("wp-content/plugins/shop/shop.php.orig"), "<?php").unwrap();
        fs::write(root.join("wp-admin/install.log"), "ok").unwrap();
        fs::write(root.join("wp-config.php.bak"), "<?php").unwrap();
        let config = SiteConfig::for_site(root);
        (temp, config)
    }

    #[test]
    fn test_preview_leaves_files() {
        let (temp, config) = site();
        let cleaner = SiteFileCleaner::new(&config);

        let report = cleaner.preview(&[ScanOption::LogFiles]).unwrap();
        assert_eq!(report.total_files, 2);
        assert!(temp.path().join("wp-content/debug.log").exists());
    }

    #[test]
    fn test_clean_scanned_files() {
        let (temp, config) = site();
        let cleaner = SiteFileCleaner::new(&config);

        let report = cleaner.clean(&[], &[]).unwrap();
        assert_eq!(report.total_cleaned, 3);
        assert!(!temp.path().join("wp-content/upgrade.tmp").exists());
        assert!(!temp.path().join("wp-admin/install.log").exists());
        // .orig is not deletable inside plugins
        assert!(temp.path().join("wp-content/plugins/shop/shop.php.orig").exists());
        assert_eq!(report.skipped.len(), 1);
        // Outside every scan root
        assert!(temp.path().join("wp-config.php.bak").exists());
    }

    #[test]
    fn test_clean_refuses_outside_paths() {
        let (temp, config) = site();
        let cleaner = SiteFileCleaner::new(&config);

        let outside = temp.path().join("wp-config.php.bak");
        let report = cleaner.clean(&[], &[outside.clone()]).unwrap();
        assert_eq!(report.total_cleaned, 0);
        assert_eq!(report.skipped[0].path, outside);
        assert!(outside.exists());
    }
}
