//! CLI integration tests using assert_cmd
//!
//! These tests run the reia binary against a temporary site.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command instance for the reia binary
fn reia_cmd() -> Command {
    Command::cargo_bin("reia").expect("Failed to find reia binary")
}

/// Site with content, a configuration file and a small database
fn create_site() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();

    fs::create_dir_all(root.join("wp-content/plugins/hello")).unwrap();
    fs::create_dir_all(root.join("wp-admin")).unwrap();
    fs::write(root.join("wp-config.php"), "<?php\ndefine('WP_DEBUG', true);\n").unwrap();
    fs::write(root.join("wp-content/plugins/hello/hello.php"), "<?php echo 'hi';").unwrap();
    fs::write(root.join("wp-content/debug.log"), "notice\n").unwrap();

    let db_path = root.join("site.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        r"
        CREATE TABLE wp_options (
            option_id INTEGER PRIMARY KEY,
            option_name TEXT,
            option_value TEXT,
            autoload TEXT
        );
        CREATE TABLE wp_posts (ID INTEGER PRIMARY KEY, post_type TEXT, post_status TEXT);
        INSERT INTO wp_options (option_name, option_value, autoload)
            VALUES ('siteurl', 'https://example.test', 'yes'),
                   ('_transient_feed', 'cached', 'no');
        INSERT INTO wp_posts VALUES (1, 'post', 'publish'), (2, 'revision', 'inherit');
        ",
    )
    .unwrap();

    (temp, db_path)
}

fn site_cmd(root: &Path, db: Option<&Path>) -> Command {
    let mut cmd = reia_cmd();
    cmd.arg("--site").arg(root);
    if let Some(db) = db {
        cmd.arg("--database").arg(db);
    }
    cmd
}

fn backup_names(root: &Path) -> Vec<String> {
    let dir = root.join("wp-content/reia-backups");
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".zip"))
        .collect()
}

// =============================================================================
// Help
// =============================================================================

#[test]
fn test_help_command() {
    reia_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("REIA - site maintenance toolkit"));
}

#[test]
fn test_version_command() {
    reia_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reia"));
}

#[test]
fn test_backup_help() {
    reia_cmd()
        .arg("backup")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Create, list and prune backups"));
}

// =============================================================================
// Backups
// =============================================================================

#[test]
fn test_backup_list_empty() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));
}

#[test]
fn test_backup_create_and_list() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "database", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"))
        .stdout(predicate::str::contains("\"files_count\": 1"));

    let names = backup_names(temp.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("reia-backup-database-"));

    site_cmd(temp.path(), None)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(names[0].as_str()));
}

#[test]
fn test_backup_create_without_database_fails() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["backup", "create", "--type", "content"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database configured for this site"));

    assert!(backup_names(temp.path()).is_empty());
}

#[test]
fn test_backup_create_empty_fails() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "uploads"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No files were added to the backup."));

    assert!(backup_names(temp.path()).is_empty());
}

#[test]
fn test_backup_create_unknown_type() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown backup type: everything"));
}

#[test]
fn test_backup_estimate_json() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "estimate", "--type", "content", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"estimated_size\""))
        .stdout(predicate::str::contains("\"wp_content\""));

    assert!(backup_names(temp.path()).is_empty());
}

#[test]
fn test_backup_delete_rejects_bad_names() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["backup", "delete", "reia-backup-evil.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backup filename"));

    site_cmd(temp.path(), None)
        .args(["backup", "delete", "../wp-config.php"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backup filename"));

    assert!(temp.path().join("wp-config.php").exists());
}

#[test]
fn test_backup_delete_dry_run_then_delete() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "database"])
        .assert()
        .success();
    let name = backup_names(temp.path()).remove(0);

    site_cmd(temp.path(), None)
        .args(["backup", "delete", &name, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would delete backup"));
    assert_eq!(backup_names(temp.path()).len(), 1);

    site_cmd(temp.path(), None)
        .args(["backup", "delete", &name])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup deleted successfully."));
    assert!(backup_names(temp.path()).is_empty());
}

#[test]
fn test_backup_prune_dry_run_with_nothing_old() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "database"])
        .assert()
        .success();

    site_cmd(temp.path(), None)
        .args(["backup", "prune", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No old backups found to clean up"));
    assert_eq!(backup_names(temp.path()).len(), 1);
}

#[test]
fn test_backup_export() {
    let (temp, db) = create_site();
    let out = TempDir::new().unwrap();

    site_cmd(temp.path(), Some(&db))
        .args(["backup", "create", "--type", "database"])
        .assert()
        .success();
    let name = backup_names(temp.path()).remove(0);

    site_cmd(temp.path(), None)
        .args(["backup", "export", &name])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported"));

    let exported = fs::File::open(out.path().join(&name)).unwrap();
    let archive = zip::ZipArchive::new(exported).unwrap();
    assert_eq!(archive.len(), 1);
}

// =============================================================================
// Maintenance utilities
// =============================================================================

#[test]
fn test_files_clean_dry_run_keeps_files() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["files", "clean", "--option", "logs", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 files that can be cleaned"));
    assert!(temp.path().join("wp-content/debug.log").exists());

    site_cmd(temp.path(), None)
        .args(["files", "clean", "--option", "logs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully cleaned 1 files"));
    assert!(!temp.path().join("wp-content/debug.log").exists());
}

#[test]
fn test_files_scan_unknown_option() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["files", "scan", "--option", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown scan option: bogus"));
}

#[test]
fn test_db_optimize_preview_and_run() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["db", "optimize", "--option", "revisions", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"will_delete_count\": 1"));

    site_cmd(temp.path(), Some(&db))
        .args(["db", "optimize", "--option", "revisions", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted_count\": 1"));

    let conn = rusqlite::Connection::open(&db).unwrap();
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM wp_posts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(left, 1);
}

#[test]
fn test_db_requires_database() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["db", "autoload", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database configured"));
}

#[test]
fn test_missing_database_file() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), Some(&temp.path().join("missing.db")))
        .args(["backup", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database file does not exist"));
}

#[test]
fn test_cache_clear_transients() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["cache", "clear", "--option", "transients", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"transients\": 1"));
}

#[test]
fn test_security_scan_json() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["security", "scan", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\""))
        .stdout(predicate::str::contains("table_prefix"));
}

#[test]
fn test_performance_analyze_reports_debug_mode() {
    let (temp, db) = create_site();

    site_cmd(temp.path(), Some(&db))
        .args(["performance", "analyze"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Performance score:"))
        .stdout(predicate::str::contains("Debug mode enabled"));
}

// =============================================================================
// Plugins
// =============================================================================

#[test]
fn test_plugins_analyze_marks_active_plugins() {
    let (temp, db) = create_site();
    let plugins = temp.path().join("wp-content/plugins");
    fs::create_dir_all(plugins.join("forms")).unwrap();
    fs::write(
        plugins.join("forms/forms.php"),
        "<?php\n/*\nPlugin Name: Forms\nVersion: 3.0\n*/\necho $_GET['q'];",
    )
    .unwrap();
    fs::write(plugins.join("dolly.php"), "<?php\n/* Plugin Name: Dolly */").unwrap();
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute(
            "INSERT INTO wp_options (option_name, option_value, autoload) VALUES (?1, ?2, 'yes')",
            ["active_plugins", r#"a:1:{i:0;s:15:"forms/forms.php";}"#],
        )
        .unwrap();

    site_cmd(temp.path(), Some(&db))
        .args(["plugins", "analyze"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 plugins (1 active, 1 inactive)"))
        .stdout(predicate::str::contains("Forms 3.0 [active]"))
        .stdout(predicate::str::contains("Dolly - [inactive]"))
        .stdout(predicate::str::contains("! Unescaped user input output in forms.php"));
}

#[test]
fn test_plugins_analyze_json_without_database() {
    let (temp, _db) = create_site();

    site_cmd(temp.path(), None)
        .args(["plugins", "analyze", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_plugins\": 0"))
        .stdout(predicate::str::contains("\"plugins\": []"));
}
