//! Backup types, options and the steps each type performs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a backup covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Database plus the content directory and site configuration file
    Content,
    /// Database dump only
    Database,
    /// Uploads directory only
    Uploads,
    /// Entire site root plus the database dump
    Full,
}

/// One unit of work inside a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStep {
    /// `database.sql` at the archive root
    DatabaseDump,
    /// The content directory under `wp-content/`
    ContentDir,
    /// The site configuration file at the archive root
    ConfigFile,
    /// The whole site root at the archive root
    SiteRoot,
    /// The uploads directory under `wp-content/uploads/`
    UploadsDir,
}

impl BackupType {
    pub const ALL: [Self; 4] = [Self::Content, Self::Database, Self::Uploads, Self::Full];

    /// Identifier used in file names and on the command line
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Database => "database",
            Self::Uploads => "uploads",
            Self::Full => "full",
        }
    }

    /// Steps performed, in archive order
    #[must_use]
    pub fn steps(self) -> &'static [BackupStep] {
        match self {
            Self::Content => &[
                BackupStep::DatabaseDump,
                BackupStep::ContentDir,
                BackupStep::ConfigFile,
            ],
            Self::Database => &[BackupStep::DatabaseDump],
            Self::Uploads => &[BackupStep::UploadsDir],
            Self::Full => &[BackupStep::SiteRoot, BackupStep::DatabaseDump],
        }
    }

    /// Whether the backup includes a database dump
    #[must_use]
    pub fn includes_database(self) -> bool {
        self.steps().contains(&BackupStep::DatabaseDump)
    }

    /// Advice shown with size estimates
    #[must_use]
    pub fn recommendation(self) -> &'static str {
        match self {
            Self::Content => {
                "Recommended backup type - includes your data without platform core files"
            }
            Self::Database => "Quick backup option - only your database content",
            Self::Uploads => {
                "Media files only - good for backing up images, videos, and documents"
            }
            Self::Full => "Consider a content backup instead to exclude platform core files",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown backup type: {s}"))
    }
}

/// Flags accepted with a backup request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupOptions {
    /// Leave `*.log` files out
    pub exclude_logs: bool,
    /// Leave cache directories out
    pub exclude_cache: bool,
    /// Accepted for compatibility; images are stored as-is
    pub compress_images: bool,
}

impl BackupOptions {
    /// Exclusion patterns implied by the flags
    #[must_use]
    pub fn exclusion_patterns(&self) -> Vec<&'static str> {
        let mut patterns = Vec::new();
        if self.exclude_logs {
            patterns.push("*.log");
        }
        if self.exclude_cache {
            patterns.extend(["*/cache/*", "*/w3tc-config/*", "*/wp-rocket-config/*"]);
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_type() {
        assert_eq!(BackupType::Database.steps(), &[BackupStep::DatabaseDump]);
        assert_eq!(BackupType::Uploads.steps(), &[BackupStep::UploadsDir]);
        assert!(BackupType::Content.includes_database());
        assert!(BackupType::Full.includes_database());
        assert!(!BackupType::Uploads.includes_database());
    }

    #[test]
    fn test_parse_type() {
        assert_eq!("full".parse::<BackupType>().unwrap(), BackupType::Full);
        assert!("everything".parse::<BackupType>().is_err());
    }

    #[test]
    fn test_exclusion_patterns_follow_flags() {
        assert!(BackupOptions::default().exclusion_patterns().is_empty());
        let options = BackupOptions {
            exclude_logs: true,
            exclude_cache: true,
            compress_images: false,
        };
        let patterns = options.exclusion_patterns();
        assert_eq!(patterns.len(), 4);
        assert!(patterns.contains(&"*/cache/*"));
    }
}
