//! REIA Scanner - filesystem side of site maintenance
//!
//! This crate walks the site's directories: it finds cleanable files,
//! applies deletion safety rules, matches glob exclusions and runs the
//! file-level security checks. It never touches the database.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod cleaner;
pub mod error;
pub mod files;
pub mod format;
pub mod pattern;
pub mod security;

pub use cleaner::{CleanReport, FileCleaner, SafetyRules};
pub use error::{ScanError, ScanResult};
pub use files::{DirectoryScanner, FileBreakdown, FileCategory, FileEntry, ScanOption, ScanReport};
pub use format::format_bytes;
pub use pattern::{ExclusionSet, Pattern};
pub use security::{CheckStatus, CodeAuditor, CodeIssue, ConfigFlags, SecurityCheck};
