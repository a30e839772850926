//! Plugin inventory
//!
//! Lists every installed plugin with its size, activation state, flagged
//! code constructs and the newest modification time of its files. A
//! plugin is a `.php` file carrying a `Plugin Name:` header, either
//! directly in the plugins directory or one level down in its own
//! directory.

use super::{MaintenanceResult, SiteTables};
use crate::config::SiteConfig;
use crate::db::Database;
use chrono::{DateTime, Utc};
use reia_scanner::{format_bytes, CodeAuditor, CodeIssue};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Bytes of a file searched for header fields
const HEADER_BYTES: u64 = 8 * 1024;

/// One installed plugin
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    /// Main file relative to the plugins directory, e.g. `hello/hello.php`
    pub file: String,
    pub active: bool,
    pub size_bytes: u64,
    pub size: String,
    pub security_issues: usize,
    pub security_details: Vec<String>,
    /// Newest modification time among the plugin's files
    pub last_modified: Option<DateTime<Utc>>,
}

/// Inventory of all plugins, largest first
#[derive(Debug, Clone, Serialize)]
pub struct PluginReport {
    pub plugins: Vec<PluginInfo>,
    pub total_plugins: usize,
    pub active_plugins: usize,
    pub inactive_plugins: usize,
    pub total_size_bytes: u64,
    pub total_size: String,
}

/// Header fields of a plugin's main file
#[derive(Debug, Default, PartialEq, Eq)]
struct PluginHeader {
    name: String,
    version: Option<String>,
    author: Option<String>,
}

/// A plugin found on disk, before inspection
struct FoundPlugin {
    file: String,
    /// Directory for directory plugins, the main file for single-file ones
    root: PathBuf,
    header: PluginHeader,
}

/// Value of a `Key: value` line in a file header comment
fn header_field(header: &str, key: &str) -> Option<String> {
    header.lines().find_map(|line| {
        let line = line.trim_start_matches([' ', '\t', '/', '*', '#', '@']);
        let (name, value) = line.split_once(':')?;
        if !name.eq_ignore_ascii_case(key) {
            return None;
        }
        let value = value
            .trim()
            .trim_end_matches("*/")
            .trim_end_matches("?>")
            .trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn read_header(path: &Path) -> Option<PluginHeader> {
    if path.extension().and_then(|e| e.to_str()) != Some("php") {
        return None;
    }
    let mut bytes = Vec::new();
    if let Err(e) = File::open(path).and_then(|f| f.take(HEADER_BYTES).read_to_end(&mut bytes)) {
        tracing::debug!(path = %path.display(), error = %e, "could not read plugin header");
        return None;
    }
    let header = String::from_utf8_lossy(&bytes);
    Some(PluginHeader {
        name: header_field(&header, "Plugin Name")?,
        version: header_field(&header, "Version"),
        author: header_field(&header, "Author"),
    })
}

/// Strings of a PHP-serialized value (`s:<len>:"...";`), in order
///
/// Covers both the values of a list and the keys of a map.
pub(crate) fn serialized_strings(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find("s:") {
        let after = &rest[start + 2..];
        let Some((len, tail)) = after.split_once(":\"") else {
            break;
        };
        let Ok(len) = len.parse::<usize>() else {
            rest = after;
            continue;
        };
        let Some(text) = tail.get(..len) else {
            break;
        };
        out.push(text.to_string());
        rest = &tail[len..];
    }
    out
}

fn sorted_entries(dir: &Path) -> Vec<fs::DirEntry> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<_> = entries
        .flatten()
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);
    entries
}

/// Find installed plugins; a missing directory has none
fn discover(plugins_dir: &Path) -> Vec<FoundPlugin> {
    let mut found = Vec::new();
    for entry in sorted_entries(plugins_dir) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let main = sorted_entries(&path).into_iter().find_map(|inner| {
                let header = read_header(&inner.path())?;
                Some((inner.file_name().to_string_lossy().to_string(), header))
            });
            if let Some((main, header)) = main {
                found.push(FoundPlugin {
                    file: format!("{name}/{main}"),
                    root: path,
                    header,
                });
            }
        } else if file_type.is_file() {
            if let Some(header) = read_header(&path) {
                found.push(FoundPlugin {
                    file: name,
                    root: path,
                    header,
                });
            }
        }
    }
    found
}

/// Total size and newest modification time of the files under `root`
fn tree_stats(root: &Path) -> (u64, Option<SystemTime>) {
    let mut size = 0;
    let mut latest = None;
    for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        size += meta.len();
        if let Ok(modified) = meta.modified() {
            latest = latest.max(Some(modified));
        }
    }
    (size, latest)
}

/// Analyzes the plugins of one site
pub struct PluginAnalyzer<'a> {
    config: &'a SiteConfig,
    db: Option<&'a Database>,
}

impl<'a> PluginAnalyzer<'a> {
    /// Without a database every plugin is reported inactive
    #[must_use]
    pub fn new(config: &'a SiteConfig, db: Option<&'a Database>) -> Self {
        Self { config, db }
    }

    /// Plugin files listed in `active_plugins` or network-activated in
    /// `active_sitewide_plugins`
    fn active_files(&self) -> MaintenanceResult<HashSet<String>> {
        let Some(db) = self.db else {
            return Ok(HashSet::new());
        };
        let tables = SiteTables::new(db, self.config.table_prefix());

        let mut active: HashSet<String> = tables
            .option("active_plugins")?
            .map(|v| serialized_strings(&v))
            .unwrap_or_default()
            .into_iter()
            .collect();
        let network = tables.text(
            "sitemeta",
            "SELECT meta_value FROM {t} WHERE meta_key = ?1",
            ["active_sitewide_plugins"],
        )?;
        active.extend(network.map(|v| serialized_strings(&v)).unwrap_or_default());
        Ok(active)
    }

    fn audit(auditor: &CodeAuditor, root: &Path) -> Vec<CodeIssue> {
        if root.is_dir() {
            return auditor.audit_directory(root);
        }
        match fs::read_to_string(root) {
            Ok(content) => auditor.audit_source(root, &content),
            Err(_) => Vec::new(),
        }
    }

    /// Build the inventory
    ///
    /// # Errors
    /// Returns an error if the activation options cannot be queried
    pub fn analyze(&self) -> MaintenanceResult<PluginReport> {
        let active = self.active_files()?;
        let auditor = CodeAuditor::new()?;

        let mut plugins: Vec<PluginInfo> = discover(&self.config.content_dir().join("plugins"))
            .into_iter()
            .map(|found| {
                let (size_bytes, latest) = tree_stats(&found.root);
                let details: Vec<String> = Self::audit(&auditor, &found.root)
                    .into_iter()
                    .map(|issue| issue.message)
                    .collect();
                PluginInfo {
                    name: found.header.name,
                    version: found.header.version,
                    author: found.header.author,
                    active: active.contains(&found.file),
                    file: found.file,
                    size_bytes,
                    size: format_bytes(size_bytes),
                    security_issues: details.len(),
                    security_details: details,
                    last_modified: latest.map(DateTime::<Utc>::from),
                }
            })
            .collect();
        plugins.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.file.cmp(&b.file)));

        let active_plugins = plugins.iter().filter(|p| p.active).count();
        let total_size_bytes = plugins.iter().map(|p| p.size_bytes).sum();
        Ok(PluginReport {
            total_plugins: plugins.len(),
            active_plugins,
            inactive_plugins: plugins.len() - active_plugins,
            total_size_bytes,
            total_size: format_bytes(total_size_bytes),
            plugins,
        })
    }
}
