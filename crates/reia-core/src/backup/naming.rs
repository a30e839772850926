//! Backup file names
//!
//! Names follow `reia-backup-<type>-<YYYY-MM-DD_HH-MM-SS>[-N].zip`. The
//! name is the only key callers may pass in, so every operation taking a
//! file name goes through [`validate_filename`] first.

use super::error::BackupError;
use super::types::BackupType;
use chrono::{DateTime, NaiveDateTime, TimeZone};

const PREFIX: &str = "reia-backup-";
const EXTENSION: &str = ".zip";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;

/// Fields encoded in a backup file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName {
    pub backup_type: BackupType,
    pub timestamp: NaiveDateTime,
    /// Collision counter, if any
    pub sequence: Option<u32>,
}

/// Build the file name for a backup taken at `at`
#[must_use]
pub fn backup_filename<Tz: TimeZone>(
    backup_type: BackupType,
    at: &DateTime<Tz>,
    sequence: Option<u32>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format(TIMESTAMP_FORMAT);
    match sequence {
        Some(n) => format!("{PREFIX}{backup_type}-{stamp}-{n}{EXTENSION}"),
        None => format!("{PREFIX}{backup_type}-{stamp}{EXTENSION}"),
    }
}

/// Parse a file name, returning `None` unless it follows the pattern exactly
#[must_use]
pub fn parse_filename(name: &str) -> Option<ParsedName> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    let (kind, rest) = stem.split_once('-')?;
    let backup_type = kind.parse::<BackupType>().ok()?;

    let stamp = rest.get(..TIMESTAMP_LEN)?;
    let shape_ok = stamp.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 | 13 | 16 => b == b'-',
        10 => b == b'_',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

    let suffix = rest.get(TIMESTAMP_LEN..)?;
    let sequence = if suffix.is_empty() {
        None
    } else {
        let digits = suffix.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(digits.parse().ok()?)
    };

    Some(ParsedName {
        backup_type,
        timestamp,
        sequence,
    })
}

/// Reject any name that is not a backup file name
///
/// # Errors
/// Returns `InvalidFilename` when the name does not follow the pattern
pub fn validate_filename(name: &str) -> Result<ParsedName, BackupError> {
    parse_filename(name).ok_or_else(|| BackupError::InvalidFilename(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_accepts_well_formed_names() {
        let parsed = validate_filename("reia-backup-content-2024-01-15_10-30-00.zip").unwrap();
        assert_eq!(parsed.backup_type, BackupType::Content);
        assert_eq!(parsed.timestamp.to_string(), "2024-01-15 10:30:00");
        assert_eq!(parsed.sequence, None);

        let parsed = validate_filename("reia-backup-full-2024-01-15_10-30-00-2.zip").unwrap();
        assert_eq!(parsed.sequence, Some(2));
    }

    #[test]
    fn test_rejects_foreign_names() {
        for name in [
            "../../etc/passwd.zip",
            "reia-backup-evil.zip",
            "reia-backup-.zip",
            "reia-backup-content-2024-01-15_10-30-00.zip/../x",
            "reia-backup-content/../../2024-01-15_10-30-00.zip",
            "reia-backup-content-2024-13-15_10-30-00.zip",
            "reia-backup-content-2024-01-15_10-30-00.tar",
            "reia-backup-content-2024-01-15_10-30-00-.zip",
            "reia-backup-other-2024-01-15_10-30-00.zip",
            "",
        ] {
            assert!(
                matches!(validate_filename(name), Err(BackupError::InvalidFilename(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_generated_names_validate() {
        let now = Utc::now();
        for backup_type in BackupType::ALL {
            let name = backup_filename(backup_type, &now, None);
            assert_eq!(parse_filename(&name).unwrap().backup_type, backup_type);
            let name = backup_filename(backup_type, &now, Some(3));
            assert_eq!(parse_filename(&name).unwrap().sequence, Some(3));
        }
    }
}
