//! Scanner integration tests
//!
//! Runs the directory scanner against fixture trees on disk.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use reia_scanner::{DirectoryScanner, FileCategory, ScanOption};
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Create a fixture tree with ten files, three of them logs
fn create_test_fixture() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let base = temp_dir.path();

    fs::create_dir_all(base.join("plugins/shop/logs")).expect("Failed to create plugin dir");
    fs::create_dir_all(base.join("uploads/2024/01")).expect("Failed to create uploads dir");

    let files = [
        "debug.log",
        "plugins/shop/logs/error.log",
        "plugins/shop/logs/access.log",
        "plugins/shop/shop.php",
        "plugins/shop/readme.txt",
        "uploads/2024/01/photo.jpg",
        "uploads/2024/01/photo-150x150.jpg",
        "uploads/2024/01/notes.md",
        "index.php",
        "style.css",
    ];
    for file in files {
        fs::write(base.join(file), file.as_bytes()).expect("Failed to write fixture file");
    }

    temp_dir
}

fn set_age(path: &Path, age: Duration) {
    let file = File::options().write(true).open(path).expect("Failed to open file");
    file.set_modified(SystemTime::now() - age)
        .expect("Failed to set modification time");
}

#[test]
fn test_log_scan_finds_exactly_the_logs() {
    let fixture = create_test_fixture();
    let scanner = DirectoryScanner::new(vec![fixture.path().to_path_buf()], &[ScanOption::LogFiles])
        .expect("Failed to build scanner");

    let entries = scanner.scan();

    assert_eq!(entries.len(), 3);
    for entry in &entries {
        assert_eq!(entry.category, FileCategory::LogFile);
        assert_eq!(entry.category.label(), "Log File");
        assert!(entry.path.starts_with(fixture.path()));
        assert!(entry.name.ends_with(".log"));
    }
}

#[test]
fn test_missing_root_is_skipped() {
    let fixture = create_test_fixture();
    let roots = vec![
        PathBuf::from("/definitely/not/here"),
        fixture.path().to_path_buf(),
    ];
    let scanner = DirectoryScanner::new(roots, &[ScanOption::LogFiles]).unwrap();

    assert_eq!(scanner.scan().len(), 3);
}

#[test]
fn test_overlapping_roots_report_each_file_once() {
    let fixture = create_test_fixture();
    let roots = vec![
        fixture.path().to_path_buf(),
        fixture.path().join("plugins"),
    ];
    let scanner = DirectoryScanner::new(roots, &[ScanOption::LogFiles]).unwrap();

    assert_eq!(scanner.scan().len(), 3);
}

#[test]
fn test_scan_is_restartable() {
    let fixture = create_test_fixture();
    let scanner =
        DirectoryScanner::new(vec![fixture.path().to_path_buf()], &[ScanOption::LogFiles]).unwrap();

    let first: Vec<_> = scanner.iter().map(|e| e.path).collect();
    fs::write(fixture.path().join("late.log"), "late").unwrap();
    let second: Vec<_> = scanner.iter().map(|e| e.path).collect();

    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 4);
}

#[test]
fn test_old_backup_reported_once() {
    let fixture = create_test_fixture();
    let stale = fixture.path().join("site.bak");
    let fresh = fixture.path().join("fresh.bak");
    let stale_named = fixture.path().join("backup-notes.txt");
    fs::write(&stale, "old").unwrap();
    fs::write(&fresh, "new").unwrap();
    fs::write(&stale_named, "old").unwrap();
    set_age(&stale, 40 * DAY);
    set_age(&stale_named, 40 * DAY);

    let scanner =
        DirectoryScanner::new(vec![fixture.path().to_path_buf()], &[ScanOption::BackupFiles])
            .unwrap();
    let entries = scanner.scan();

    let category_of = |name: &str| {
        entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.category)
            .collect::<Vec<_>>()
    };

    assert_eq!(category_of("site.bak"), vec![FileCategory::OldBackup]);
    assert_eq!(category_of("fresh.bak"), vec![FileCategory::BackupFile]);
    assert_eq!(category_of("backup-notes.txt"), vec![FileCategory::OldBackup]);
    assert_eq!(entries.len(), 3);
}

#[test]
fn test_age_rule_needs_backup_option() {
    let fixture = create_test_fixture();
    let stale = fixture.path().join("backup-notes.txt");
    fs::write(&stale, "old").unwrap();
    set_age(&stale, 40 * DAY);

    let scanner =
        DirectoryScanner::new(vec![fixture.path().to_path_buf()], &[ScanOption::LogFiles]).unwrap();

    assert!(scanner.scan().iter().all(|e| e.name != "backup-notes.txt"));
}

#[test]
fn test_empty_options_select_everything() {
    let fixture = create_test_fixture();
    fs::write(fixture.path().join("a.tmp"), "t").unwrap();
    fs::write(fixture.path().join("b.cache"), "c").unwrap();
    fs::write(fixture.path().join(".DS_Store"), "d").unwrap();

    let scanner = DirectoryScanner::new(vec![fixture.path().to_path_buf()], &[]).unwrap();
    let report = scanner.report(50);

    assert_eq!(report.total_files, 6);
    assert_eq!(report.file_breakdown[&FileCategory::LogFile].count, 3);
    assert_eq!(report.file_breakdown[&FileCategory::TemporaryFile].count, 1);
    assert_eq!(report.file_breakdown[&FileCategory::CacheFile].count, 1);
    assert_eq!(report.file_breakdown[&FileCategory::Other].count, 1);
}
