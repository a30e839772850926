//! History tests
//!
//! Mutating operations leave exactly one event on the history target;
//! previews and dry runs leave none.

use reia_core::backup::{BackupCatalog, BackupOptions, BackupType};
use reia_core::history::HISTORY_TARGET;
use reia_core::maintenance::SiteFileCleaner;
use reia_core::{BackupManager, Database, Limits, SiteConfig};
use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const OLD: &str = "reia-backup-content-2024-01-15_10-30-00.zip";
const OLDER: &str = "reia-backup-database-2024-01-14_09-00-00.zip";

// =============================================================================
// Event capture
// =============================================================================

/// `(utility, action)` of every history event seen
#[derive(Clone, Default)]
struct HistoryLog(Arc<Mutex<Vec<(String, String)>>>);

#[derive(Default)]
struct EventFields {
    utility: String,
    action: String,
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "utility" => self.utility = value.to_string(),
            "action" => self.action = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl<S: Subscriber> Layer<S> for HistoryLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != HISTORY_TARGET {
            return;
        }
        let mut fields = EventFields::default();
        event.record(&mut fields);
        self.0.lock().unwrap().push((fields.utility, fields.action));
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<(String, String)>) {
    let log = HistoryLog::default();
    let subscriber = tracing_subscriber::registry().with(log.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    let events = log.0.lock().unwrap().clone();
    (out, events)
}

fn event(utility: &str, action: &str) -> (String, String) {
    (utility.to_string(), action.to_string())
}

fn write_aged(path: &Path, days: u64) {
    fs::write(path, "zip").unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
        .unwrap();
}

// =============================================================================
// Backup catalog
// =============================================================================

#[test]
fn test_delete_records_one_event() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(OLD), "zip").unwrap();
    let catalog = BackupCatalog::new(temp.path(), Limits::default());

    let (preview, events) = capture(|| catalog.preview_delete(OLD));
    assert!(preview.unwrap().dry_run);
    assert!(events.is_empty());

    let (report, events) = capture(|| catalog.delete(OLD));
    assert_eq!(report.unwrap().backup_file, OLD);
    assert_eq!(events, vec![event("backup", "delete")]);
}

#[test]
fn test_rejected_delete_records_nothing() {
    let temp = TempDir::new().unwrap();
    let catalog = BackupCatalog::new(temp.path(), Limits::default());

    let (result, events) = capture(|| catalog.delete("../../etc/passwd.zip"));
    assert!(result.is_err());
    assert!(events.is_empty());
}

#[test]
fn test_prune_records_one_event_for_many_files() {
    let temp = TempDir::new().unwrap();
    write_aged(&temp.path().join(OLD), 40);
    write_aged(&temp.path().join(OLDER), 45);
    let catalog = BackupCatalog::new(temp.path(), Limits::default());

    let (preview, events) = capture(|| catalog.preview_prune(30));
    assert_eq!(preview.unwrap().total_deleted, 2);
    assert!(events.is_empty());
    assert!(temp.path().join(OLD).exists());

    let (report, events) = capture(|| catalog.prune_older_than(30));
    assert_eq!(report.unwrap().total_deleted, 2);
    assert_eq!(events, vec![event("backup", "prune")]);
}

// =============================================================================
// Backup creation
// =============================================================================

#[test]
fn test_create_records_only_on_success() {
    let temp = TempDir::new().unwrap();
    let config = SiteConfig::for_site(temp.path());
    let db = Database::in_memory().unwrap();
    db.connection()
        .execute_batch("CREATE TABLE wp_posts (ID INTEGER, post_title TEXT);")
        .unwrap();

    let options = BackupOptions::default();

    let without_db = BackupManager::new(&config, None);
    let (failed, events) = capture(|| without_db.create(BackupType::Database, &options));
    assert!(!failed.success);
    assert!(events.is_empty());

    let manager = BackupManager::new(&config, Some(&db));
    let (created, events) = capture(|| manager.create(BackupType::Database, &options));
    assert!(created.success);
    assert_eq!(events, vec![event("backup", "create")]);
}

// =============================================================================
// File cleaner
// =============================================================================

#[test]
fn test_file_preview_records_nothing() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("wp-content")).unwrap();
    fs::write(temp.path().join("wp-content/debug.log"), "notice").unwrap();
    let config = SiteConfig::for_site(temp.path());
    let cleaner = SiteFileCleaner::new(&config);

    let (preview, events) = capture(|| cleaner.preview(&[]));
    assert_eq!(preview.unwrap().total_files, 1);
    assert!(events.is_empty());

    let (report, events) = capture(|| cleaner.clean(&[], &[]));
    assert_eq!(report.unwrap().total_cleaned, 1);
    assert_eq!(events, vec![event("file cleaner", "clean")]);
}
