//! Glob and prefix patterns for file matching and exclusions
//!
//! Globs follow shell `fnmatch` rules without path awareness: `*` also
//! matches `/`, so `*/cache/*` catches a cache directory at any depth.
//! Patterns without wildcards are literals: an exact file name when
//! matching names, a path prefix when used as an exclusion.

use crate::error::{ScanError, ScanResult};
use regex::Regex;
use std::path::{Path, PathBuf};

/// A single file-name or path pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal text
    Literal(String),
    /// Wildcard pattern compiled to an anchored regex
    Glob {
        source: String,
        regex: Regex,
        /// True when the glob has no `/` and applies to the file name only
        name_only: bool,
    },
}

impl Pattern {
    /// Parse a pattern, compiling it when it contains wildcards
    ///
    /// # Errors
    /// Returns an error if the translated regex fails to compile
    pub fn parse(source: &str) -> ScanResult<Self> {
        if !source.contains(['*', '?']) {
            return Ok(Self::Literal(source.to_string()));
        }

        let regex = Regex::new(&glob_to_regex(source)).map_err(|e| ScanError::Pattern {
            pattern: source.to_string(),
            source: e,
        })?;

        Ok(Self::Glob {
            source: source.to_string(),
            regex,
            name_only: !source.contains('/'),
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Glob { source: s, .. } => s,
        }
    }

    /// Match against a bare file name (`fnmatch(pattern, name)`)
    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == name,
            Self::Glob { regex, .. } => regex.is_match(name),
        }
    }

    /// Match against a `/`-separated relative path as an exclusion
    ///
    /// Directories should be passed with a trailing `/` so that
    /// `dir/*`-style globs prune them.
    pub fn matches_path(&self, relative: &str) -> bool {
        match self {
            Self::Literal(prefix) => relative.starts_with(prefix.as_str()),
            Self::Glob {
                regex, name_only, ..
            } => {
                if *name_only {
                    let name = relative.trim_end_matches('/');
                    let name = name.rsplit('/').next().unwrap_or(name);
                    regex.is_match(name)
                } else {
                    regex.is_match(relative)
                }
            }
        }
    }
}

/// Translate a shell glob into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Ordered set of exclusions applied while walking a tree
///
/// Holds textual patterns plus absolute directories (such as the backup
/// directory itself) that must never be descended into.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<Pattern>,
    paths: Vec<PathBuf>,
}

impl ExclusionSet {
    /// Create an empty exclusion set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from textual patterns
    ///
    /// # Errors
    /// Returns an error if any glob fails to compile
    pub fn from_patterns<I, S>(patterns: I) -> ScanResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for pattern in patterns {
            set.push_pattern(pattern.as_ref())?;
        }
        Ok(set)
    }

    /// Append a textual pattern
    ///
    /// # Errors
    /// Returns an error if the glob fails to compile
    pub fn push_pattern(&mut self, pattern: &str) -> ScanResult<()> {
        self.patterns.push(Pattern::parse(pattern)?);
        Ok(())
    }

    /// Exclude an absolute path and everything below it
    pub fn exclude_path(&mut self, path: &Path) {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.paths.push(path);
    }

    /// Textual patterns in insertion order
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Whether an on-disk path falls under an excluded directory
    pub fn is_excluded_path(&self, path: &Path) -> bool {
        self.paths.iter().any(|excluded| path.starts_with(excluded))
    }

    /// Whether a relative path matches any textual pattern
    pub fn is_excluded(&self, relative: &str, is_dir: bool) -> bool {
        let candidate;
        let relative = if is_dir && !relative.ends_with('/') {
            candidate = format!("{relative}/");
            candidate.as_str()
        } else {
            relative
        };
        self.patterns.iter().any(|p| p.matches_path(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_matches_extension() {
        let pattern = Pattern::parse("*.log").unwrap();
        assert!(pattern.matches_name("debug.log"));
        assert!(!pattern.matches_name("debug.log.1"));
        assert!(!pattern.matches_name("log"));
    }

    #[test]
    fn test_glob_question_mark_and_tilde() {
        assert!(Pattern::parse("*~").unwrap().matches_name("index.php~"));
        assert!(Pattern::parse("file.?").unwrap().matches_name("file.a"));
        assert!(!Pattern::parse("file.?").unwrap().matches_name("file.ab"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let pattern = Pattern::parse("*.(old)").unwrap();
        assert!(pattern.matches_name("x.(old)"));
        assert!(!pattern.matches_name("x.old"));
    }

    #[test]
    fn test_literal_matches_exact_name() {
        let pattern = Pattern::parse(".DS_Store").unwrap();
        assert!(pattern.matches_name(".DS_Store"));
        assert!(!pattern.matches_name("x.DS_Store"));
    }

    #[test]
    fn test_literal_is_prefix_exclusion() {
        let set = ExclusionSet::from_patterns(["wp-content/reia-backups"]).unwrap();
        assert!(set.is_excluded("wp-content/reia-backups", true));
        assert!(set.is_excluded("wp-content/reia-backups/a.zip", false));
        assert!(!set.is_excluded("wp-content/uploads/a.jpg", false));
    }

    #[test]
    fn test_cache_glob_prunes_directory_and_files() {
        let set = ExclusionSet::from_patterns(["*/cache/*"]).unwrap();
        assert!(set.is_excluded("wp-content/cache", true));
        assert!(set.is_excluded("wp-content/cache/x.tmp", false));
        assert!(!set.is_excluded("wp-content/cached.txt", false));
        assert!(!set.is_excluded("cache", true));
    }

    #[test]
    fn test_name_glob_applies_at_any_depth() {
        let set = ExclusionSet::from_patterns(["*.log"]).unwrap();
        assert!(set.is_excluded("debug.log", false));
        assert!(set.is_excluded("wp-content/plugins/x/error.log", false));
        assert!(!set.is_excluded("wp-content/log/readme.txt", false));
    }

    #[test]
    fn test_excluded_path_covers_subtree() {
        let mut set = ExclusionSet::new();
        set.exclude_path(Path::new("/nonexistent/site/wp-content/reia-backups"));
        assert!(set.is_excluded_path(Path::new(
            "/nonexistent/site/wp-content/reia-backups/x.zip"
        )));
        assert!(!set.is_excluded_path(Path::new("/nonexistent/site/wp-content/uploads")));
    }
}
