//! Unnecessary-file discovery
//!
//! Walks the configured roots and reports files matching the selected
//! cleanup patterns, plus backup-looking files older than the retention
//! window.

use crate::error::{ScanError, ScanResult};
use crate::format::format_bytes;
use crate::pattern::Pattern;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Files that are always reported regardless of the selected options
const SYSTEM_LITTER: [&str; 2] = [".DS_Store", "Thumbs.db"];

/// Default age after which backup-looking files are reported
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Number of sample files kept per breakdown category
const BREAKDOWN_SAMPLES: usize = 5;

/// Kind of file, inferred from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileCategory {
    #[serde(rename = "Log File")]
    LogFile,
    #[serde(rename = "Temporary File")]
    TemporaryFile,
    #[serde(rename = "Cache File")]
    CacheFile,
    #[serde(rename = "Backup File")]
    BackupFile,
    #[serde(rename = "Old File")]
    OldFile,
    #[serde(rename = "Original File")]
    OriginalFile,
    #[serde(rename = "Old Backup")]
    OldBackup,
    #[serde(rename = "Other")]
    Other,
}

impl FileCategory {
    /// Infer the category from a file name's extension
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match extension {
            "log" => Self::LogFile,
            "tmp" | "temp" => Self::TemporaryFile,
            "cache" => Self::CacheFile,
            "bak" | "backup" => Self::BackupFile,
            "old" => Self::OldFile,
            "orig" => Self::OriginalFile,
            _ => Self::Other,
        }
    }

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LogFile => "Log File",
            Self::TemporaryFile => "Temporary File",
            Self::CacheFile => "Cache File",
            Self::BackupFile => "Backup File",
            Self::OldFile => "Old File",
            Self::OriginalFile => "Original File",
            Self::OldBackup => "Old Backup",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Groups of cleanup patterns a caller can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOption {
    TempFiles,
    LogFiles,
    BackupFiles,
    CacheFiles,
}

impl ScanOption {
    /// Every option, used when the caller selects none
    pub const ALL: [ScanOption; 4] = [
        ScanOption::TempFiles,
        ScanOption::LogFiles,
        ScanOption::BackupFiles,
        ScanOption::CacheFiles,
    ];

    /// Glob patterns enabled by this option
    #[must_use]
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::TempFiles => &["*.tmp", "*.temp", "*~"],
            Self::LogFiles => &["*.log"],
            Self::BackupFiles => &["*.bak", "*.backup", "*.old", "*.orig"],
            Self::CacheFiles => &["*.cache"],
        }
    }
}

impl FromStr for ScanOption {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "temp_files" | "temp" => Ok(Self::TempFiles),
            "log_files" | "logs" => Ok(Self::LogFiles),
            "backup_files" | "backups" => Ok(Self::BackupFiles),
            "cache_files" | "cache" => Ok(Self::CacheFiles),
            _ => Err(ScanError::UnknownOption(s.to_string())),
        }
    }
}

/// A file reported by the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Inferred category
    #[serde(rename = "type")]
    pub category: FileCategory,
    /// Containing directory
    pub directory: PathBuf,
}

/// Recursive scanner over a set of root directories
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    roots: Vec<PathBuf>,
    patterns: Vec<Pattern>,
    age_rule: Option<Regex>,
    max_age: Duration,
}

impl DirectoryScanner {
    /// Create a scanner for the selected options
    ///
    /// An empty option list selects every option. The old-backup age rule
    /// is active only when backup files are selected.
    ///
    /// # Errors
    /// Returns an error if a built-in pattern fails to compile
    pub fn new(roots: Vec<PathBuf>, options: &[ScanOption]) -> ScanResult<Self> {
        let options: &[ScanOption] = if options.is_empty() {
            &ScanOption::ALL
        } else {
            options
        };

        let mut globs: Vec<&str> = Vec::new();
        for option in &ScanOption::ALL {
            if options.contains(option) {
                globs.extend_from_slice(option.patterns());
            }
        }
        globs.extend_from_slice(&SYSTEM_LITTER);

        let mut scanner = Self::with_patterns(roots, &globs)?;
        if options.contains(&ScanOption::BackupFiles) {
            scanner = scanner.with_age_rule()?;
        }
        Ok(scanner)
    }

    /// Create a scanner for explicit glob patterns, without the age rule
    ///
    /// # Errors
    /// Returns an error if a pattern fails to compile
    pub fn with_patterns<S: AsRef<str>>(roots: Vec<PathBuf>, patterns: &[S]) -> ScanResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::parse(p.as_ref()))
            .collect::<ScanResult<Vec<_>>>()?;

        Ok(Self {
            roots,
            patterns,
            age_rule: None,
            max_age: DEFAULT_MAX_AGE,
        })
    }

    /// Report backup-looking names older than the maximum age
    ///
    /// # Errors
    /// Returns an error if the name pattern fails to compile
    pub fn with_age_rule(mut self) -> ScanResult<Self> {
        let source = "(?i)backup|bak|old";
        let regex = Regex::new(source).map_err(|e| ScanError::Pattern {
            pattern: source.to_string(),
            source: e,
        })?;
        self.age_rule = Some(regex);
        Ok(self)
    }

    /// Set the age after which backup-looking files are reported
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Roots this scanner walks
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lazily walk every root; each call starts a fresh walk
    pub fn iter(&self) -> ScanIter<'_> {
        let cutoff = SystemTime::now()
            .checked_sub(self.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        ScanIter {
            scanner: self,
            roots: self.roots.iter(),
            walk: None,
            seen: HashSet::new(),
            cutoff,
        }
    }

    /// Walk every root and collect the matches
    pub fn scan(&self) -> Vec<FileEntry> {
        self.iter().collect()
    }

    /// Walk every root and summarise the matches
    pub fn report(&self, preview_limit: usize) -> ScanReport {
        ScanReport::from_entries(self.scan(), preview_limit)
    }

    fn classify(
        &self,
        name: &str,
        modified: SystemTime,
        cutoff: SystemTime,
    ) -> Option<FileCategory> {
        let glob_match = self.patterns.iter().any(|p| p.matches_name(name));

        let aged_backup = self
            .age_rule
            .as_ref()
            .is_some_and(|rule| rule.is_match(name) && modified < cutoff);

        if aged_backup {
            Some(FileCategory::OldBackup)
        } else if glob_match {
            Some(FileCategory::from_file_name(name))
        } else {
            None
        }
    }
}

/// Lazy iterator over scan matches, deduplicated by path
pub struct ScanIter<'a> {
    scanner: &'a DirectoryScanner,
    roots: std::slice::Iter<'a, PathBuf>,
    walk: Option<walkdir::IntoIter>,
    seen: HashSet<PathBuf>,
    cutoff: SystemTime,
}

impl Iterator for ScanIter<'_> {
    type Item = FileEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(walk) = self.walk.as_mut() else {
                let root = self.roots.next()?;
                // Missing roots are skipped silently
                if root.is_dir() {
                    self.walk = Some(WalkDir::new(root).follow_links(false).into_iter());
                }
                continue;
            };

            let Some(entry) = walk.next() else {
                self.walk = None;
                continue;
            };

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let name = entry.file_name().to_string_lossy().to_string();

            let Some(category) = self.scanner.classify(&name, modified, self.cutoff) else {
                continue;
            };

            let path = entry.path().to_path_buf();
            if !self.seen.insert(path.clone()) {
                continue;
            }

            return Some(FileEntry {
                directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                path,
                name,
                size: metadata.len(),
                modified: DateTime::<Utc>::from(modified),
                category,
            });
        }
    }
}

/// Sample file kept in a breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownSample {
    pub name: String,
    pub size: String,
    pub modified: String,
}

/// Per-category totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileBreakdown {
    pub count: usize,
    pub size: u64,
    pub size_formatted: String,
    pub files: Vec<BreakdownSample>,
}

/// Summary of a scan, used as the cleaner's preview payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// First matches, up to the preview limit
    pub files: Vec<FileEntry>,
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub message: String,
    pub file_breakdown: BTreeMap<FileCategory, FileBreakdown>,
    /// Every matched path, for a follow-up clean
    #[serde(skip)]
    pub all_paths: Vec<PathBuf>,
}

impl ScanReport {
    /// Summarise a list of matches
    #[must_use]
    pub fn from_entries(entries: Vec<FileEntry>, preview_limit: usize) -> Self {
        let total_files = entries.len();
        let total_size: u64 = entries.iter().map(|e| e.size).sum();

        let mut file_breakdown: BTreeMap<FileCategory, FileBreakdown> = BTreeMap::new();
        for entry in &entries {
            let group = file_breakdown.entry(entry.category).or_default();
            group.count += 1;
            group.size += entry.size;
            if group.files.len() < BREAKDOWN_SAMPLES {
                group.files.push(BreakdownSample {
                    name: entry.name.clone(),
                    size: format_bytes(entry.size),
                    modified: entry.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                });
            }
        }
        for group in file_breakdown.values_mut() {
            group.size_formatted = format_bytes(group.size);
        }

        let message = if total_files > 0 {
            format!(
                "Found {total_files} files that can be cleaned, freeing up {} of space.",
                format_bytes(total_size)
            )
        } else {
            "No unnecessary files found to clean.".to_string()
        };

        let all_paths = entries.iter().map(|e| e.path.clone()).collect();
        let files = entries.into_iter().take(preview_limit).collect();

        Self {
            files,
            total_files,
            total_size,
            total_size_formatted: format_bytes(total_size),
            message,
            file_breakdown,
            all_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_extension() {
        assert_eq!(FileCategory::from_file_name("a.log"), FileCategory::LogFile);
        assert_eq!(FileCategory::from_file_name("a.temp"), FileCategory::TemporaryFile);
        assert_eq!(FileCategory::from_file_name("a.backup"), FileCategory::BackupFile);
        assert_eq!(FileCategory::from_file_name("a.orig"), FileCategory::OriginalFile);
        assert_eq!(FileCategory::from_file_name("Thumbs.db"), FileCategory::Other);
        assert_eq!(FileCategory::from_file_name("noext"), FileCategory::Other);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&FileCategory::LogFile).unwrap();
        assert_eq!(json, "\"Log File\"");
    }

    #[test]
    fn test_scan_option_parse() {
        assert_eq!("log_files".parse::<ScanOption>().unwrap(), ScanOption::LogFiles);
        assert_eq!("temp-files".parse::<ScanOption>().unwrap(), ScanOption::TempFiles);
        assert!("everything".parse::<ScanOption>().is_err());
    }

    #[test]
    fn test_report_breakdown_keeps_five_samples() {
        let entries: Vec<FileEntry> = (0..7)
            .map(|i| FileEntry {
                path: PathBuf::from(format!("/tmp/x/{i}.log")),
                name: format!("{i}.log"),
                size: 10,
                modified: Utc::now(),
                category: FileCategory::LogFile,
                directory: PathBuf::from("/tmp/x"),
            })
            .collect();

        let report = ScanReport::from_entries(entries, 3);
        assert_eq!(report.total_files, 7);
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.all_paths.len(), 7);
        assert_eq!(report.total_size, 70);

        let logs = &report.file_breakdown[&FileCategory::LogFile];
        assert_eq!(logs.count, 7);
        assert_eq!(logs.files.len(), 5);
        assert_eq!(logs.size_formatted, "70 B");
    }

    #[test]
    fn test_empty_report_message() {
        let report = ScanReport::from_entries(Vec::new(), 50);
        assert_eq!(report.message, "No unnecessary files found to clean.");
    }
}
