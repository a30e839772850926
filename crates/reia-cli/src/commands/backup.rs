//! Backup CLI commands
//!
//! Handles: reia backup list/create/estimate/delete/prune/export

use clap::Subcommand;
use reia_core::backup::{BackupManager, BackupOptions, BackupType};
use std::fs;
use std::path::PathBuf;

use super::{print_json, CommandResult, Site};

/// Backup commands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// List backups, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a backup
    Create {
        /// Backup type (content, database, uploads, full)
        #[arg(short = 't', long = "type", default_value = "full")]
        backup_type: String,
        /// Leave out *.log files
        #[arg(long)]
        exclude_logs: bool,
        /// Leave out cache directories
        #[arg(long)]
        exclude_cache: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Estimate the size of a backup without creating it
    Estimate {
        /// Backup type (content, database, uploads, full)
        #[arg(short = 't', long = "type", default_value = "full")]
        backup_type: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one backup
    Delete {
        /// Backup file name
        filename: String,
        /// Preview without deleting
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete backups older than the retention window
    Prune {
        /// Age in days (defaults to the configured retention)
        #[arg(long)]
        days: Option<u64>,
        /// Preview without deleting
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a backup out of the backup directory
    Export {
        /// Backup file name
        filename: String,
        /// Destination file or directory
        destination: PathBuf,
    },
}

/// Execute backup command
pub fn execute(cmd: BackupCommands, site: &Site) -> CommandResult {
    let manager = BackupManager::new(&site.config, site.table_source());

    match cmd {
        BackupCommands::List { json } => execute_list(&manager, json),
        BackupCommands::Create {
            backup_type,
            exclude_logs,
            exclude_cache,
            json,
        } => {
            let options = BackupOptions {
                exclude_logs,
                exclude_cache,
                ..BackupOptions::default()
            };
            execute_create(&manager, &backup_type, &options, json)
        }
        BackupCommands::Estimate { backup_type, json } => {
            execute_estimate(&manager, &backup_type, json)
        }
        BackupCommands::Delete {
            filename,
            dry_run,
            json,
        } => execute_delete(&manager, &filename, dry_run, json),
        BackupCommands::Prune {
            days,
            dry_run,
            json,
        } => execute_prune(&manager, days, dry_run, json),
        BackupCommands::Export {
            filename,
            destination,
        } => execute_export(&manager, &filename, destination),
    }
}

fn execute_list(manager: &BackupManager<'_>, json: bool) -> CommandResult {
    let records = manager.catalog().list()?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    println!("Backups in {}:", manager.catalog().dir().display());
    for record in &records {
        println!(
            "  {} ({}, {}, created {})",
            record.filename,
            record.backup_type,
            record.size,
            record.created_display()
        );
    }
    Ok(())
}

fn execute_create(
    manager: &BackupManager<'_>,
    backup_type: &str,
    options: &BackupOptions,
    json: bool,
) -> CommandResult {
    let result = manager.create_named(backup_type, options);

    if json {
        print_json(&result)?;
    } else if result.success {
        println!("{}", result.message);
        if let (Some(size), Some(files)) = (&result.size, result.files_count) {
            println!("Size: {size}, files: {files}");
        }
    }

    if result.success {
        Ok(())
    } else {
        Err(result.message.into())
    }
}

fn execute_estimate(manager: &BackupManager<'_>, backup_type: &str, json: bool) -> CommandResult {
    let backup_type: BackupType = backup_type
        .parse()
        .map_err(|_| format!("Unknown backup type: {backup_type}"))?;
    let estimate = manager.estimate(backup_type)?;

    if json {
        return print_json(&estimate);
    }

    println!("Estimated {} backup", estimate.backup_type);
    println!("  Size: {}", estimate.estimated_size_formatted);
    println!("  Files: {}", estimate.estimated_files);
    println!("  Time: {}", estimate.estimated_time);
    for (part, size) in &estimate.breakdown {
        println!("  {part}: {}", size.formatted);
    }
    if let Some(warning) = &estimate.warning {
        println!("\nWarning: {warning}");
    }
    for recommendation in &estimate.recommendations {
        println!("\n{recommendation}");
    }
    Ok(())
}

fn execute_delete(
    manager: &BackupManager<'_>,
    filename: &str,
    dry_run: bool,
    json: bool,
) -> CommandResult {
    let catalog = manager.catalog();

    if dry_run {
        let preview = catalog.preview_delete(filename)?;
        if json {
            return print_json(&preview);
        }
        println!("{}", preview.message);
        println!("\nDry run - no changes made.");
        return Ok(());
    }

    let report = catalog.delete(filename)?;
    if json {
        print_json(&report)
    } else {
        println!("{} ({})", report.message, report.backup_file);
        Ok(())
    }
}

fn execute_prune(
    manager: &BackupManager<'_>,
    days: Option<u64>,
    dry_run: bool,
    json: bool,
) -> CommandResult {
    let catalog = manager.catalog();
    let days = days.unwrap_or(catalog.limits().retention_days);

    let report = if dry_run {
        catalog.preview_prune(days)?
    } else {
        catalog.prune_older_than(days)?
    };

    if json {
        return print_json(&report);
    }

    println!("{}", report.message);
    if !report.deleted_backups.is_empty() {
        let verb = if dry_run { "Would delete" } else { "Deleted" };
        println!("\n{verb}:");
        for name in &report.deleted_backups {
            println!("  {name}");
        }
    }
    if dry_run {
        println!("\nDry run - no changes made.");
    }
    Ok(())
}

fn execute_export(
    manager: &BackupManager<'_>,
    filename: &str,
    destination: PathBuf,
) -> CommandResult {
    let source = manager.catalog().resolve(filename)?;
    let target = if destination.is_dir() {
        destination.join(filename)
    } else {
        destination
    };

    let bytes = fs::copy(&source, &target)?;
    tracing::info!(file = %filename, target = %target.display(), bytes, "backup exported");
    println!("Exported {filename} to {}", target.display());
    Ok(())
}
