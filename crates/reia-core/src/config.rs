//! Deployment configuration
//!
//! Thresholds live in [`Limits`] and are handed to every component
//! explicitly, so estimates, previews and executions read the same values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default retention window for backups and old-backup scans
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

/// Files at or above this size are left out of archives (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Backup locks older than this are considered abandoned
pub const DEFAULT_LOCK_STALE_AFTER_SECS: u64 = 2 * 60 * 60;

/// Autoloaded options larger than this are optimization candidates
pub const DEFAULT_LARGE_OPTION_BYTES: u64 = 5000;

/// Number of files listed in a cleaner preview
pub const DEFAULT_PREVIEW_FILE_LIMIT: usize = 50;

/// File name looked up in the site root when no config path is given
pub const CONFIG_FILE_NAME: &str = "reia.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Site root does not exist: {0}")]
    MissingSiteRoot(PathBuf),
}

/// Tunable thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub retention_days: u64,
    pub max_file_size: u64,
    pub lock_stale_after_secs: u64,
    pub large_option_bytes: u64,
    pub preview_file_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            lock_stale_after_secs: DEFAULT_LOCK_STALE_AFTER_SECS,
            large_option_bytes: DEFAULT_LARGE_OPTION_BYTES,
            preview_file_limit: DEFAULT_PREVIEW_FILE_LIMIT,
        }
    }
}

impl Limits {
    /// Retention window as a duration
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    /// Lock staleness threshold as a duration
    #[must_use]
    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_after_secs)
    }
}

/// Layout of one site deployment
///
/// Unset directories derive from `site_root` following the platform's
/// conventional layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_root: PathBuf,
    pub content_dir: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    /// SQLite database file holding the site tables
    pub database: Option<PathBuf>,
    pub table_prefix: Option<String>,
    /// Extra directory included in file-cleaner scans
    pub temp_dir: Option<PathBuf>,
    pub limits: Limits,
}

impl SiteConfig {
    /// Configuration with every path derived from the site root
    #[must_use]
    pub fn for_site(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Relative paths inside the file resolve against `site_root`, which
    /// itself resolves against the file's directory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if config.site_root.as_os_str().is_empty() {
            config.site_root = base.to_path_buf();
        } else if config.site_root.is_relative() {
            config.site_root = base.join(&config.site_root);
        }
        config.resolve_relative();
        Ok(config)
    }

    /// Load `reia.json` from the site root if present, else derive defaults
    ///
    /// # Errors
    /// Returns an error if the site root is missing or the file is invalid
    pub fn discover(site_root: &Path) -> Result<Self, ConfigError> {
        if !site_root.is_dir() {
            return Err(ConfigError::MissingSiteRoot(site_root.to_path_buf()));
        }
        let candidate = site_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::for_site(site_root))
        }
    }

    fn resolve_relative(&mut self) {
        let root = self.site_root.clone();
        for path in [
            &mut self.content_dir,
            &mut self.uploads_dir,
            &mut self.config_file,
            &mut self.backup_dir,
            &mut self.database,
            &mut self.temp_dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    /// User-content directory
    #[must_use]
    pub fn content_dir(&self) -> PathBuf {
        self.content_dir
            .clone()
            .unwrap_or_else(|| self.site_root.join("wp-content"))
    }

    /// Media uploads directory
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| self.content_dir().join("uploads"))
    }

    /// Site configuration file
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.site_root.join("wp-config.php"))
    }

    /// Directory holding backup archives
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.content_dir().join("reia-backups"))
    }

    /// Prefix shared by the site's tables
    #[must_use]
    pub fn table_prefix(&self) -> &str {
        self.table_prefix.as_deref().unwrap_or("wp_")
    }

    /// Core platform directories
    #[must_use]
    pub fn core_dirs(&self) -> Vec<PathBuf> {
        vec![self.site_root.join("wp-admin"), self.site_root.join("wp-includes")]
    }

    /// Theme and plugin directories
    #[must_use]
    pub fn extension_dirs(&self) -> Vec<PathBuf> {
        let content = self.content_dir();
        vec![content.join("themes"), content.join("plugins")]
    }

    /// Roots walked by the file cleaner
    #[must_use]
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.content_dir(), self.site_root.join("wp-admin")];
        if let Some(temp) = &self.temp_dir {
            roots.push(temp.clone());
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derived_layout() {
        let config = SiteConfig::for_site("/srv/site");
        assert_eq!(config.content_dir(), PathBuf::from("/srv/site/wp-content"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/srv/site/wp-content/uploads"));
        assert_eq!(config.config_file(), PathBuf::from("/srv/site/wp-config.php"));
        assert_eq!(
            config.backup_dir(),
            PathBuf::from("/srv/site/wp-content/reia-backups")
        );
        assert_eq!(config.table_prefix(), "wp_");
        assert_eq!(config.limits.retention_days, 30);
        assert_eq!(config.limits.max_file_size, 104_857_600);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{
                "database": "data/site.db",
                "table_prefix": "shop_",
                "limits": { "retention_days": 7 }
            }"#,
        )
        .unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.site_root, temp.path());
        assert_eq!(config.database, Some(temp.path().join("data/site.db")));
        assert_eq!(config.table_prefix(), "shop_");
        assert_eq!(config.limits.retention_days, 7);
        assert_eq!(config.limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            SiteConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_requires_site_root() {
        assert!(matches!(
            SiteConfig::discover(Path::new("/no/such/site")),
            Err(ConfigError::MissingSiteRoot(_))
        ));
    }
}
