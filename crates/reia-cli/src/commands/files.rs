//! File cleaner CLI commands
//!
//! Handles: reia files scan/clean

use clap::Subcommand;
use reia_core::maintenance::SiteFileCleaner;
use reia_scanner::ScanOption;
use std::path::PathBuf;

use super::{parse_options, print_json, CommandResult, Site};

/// File cleaner commands
#[derive(Subcommand)]
pub enum FilesCommands {
    /// List files that can be cleaned
    Scan {
        /// Groups to look for: temp, logs, backups, cache (default: all)
        #[arg(long = "option", value_name = "GROUP", value_delimiter = ',')]
        options: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete cleanable files
    Clean {
        /// Groups to clean: temp, logs, backups, cache (default: all)
        #[arg(long = "option", value_name = "GROUP", value_delimiter = ',')]
        options: Vec<String>,
        /// Delete only these files instead of a fresh scan's results
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
        /// Preview without deleting
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute file cleaner command
pub fn execute(cmd: FilesCommands, site: &Site) -> CommandResult {
    let cleaner = SiteFileCleaner::new(&site.config);

    match cmd {
        FilesCommands::Scan { options, json } => {
            let options = parse_options(&options, &ScanOption::ALL)?;
            execute_scan(&cleaner, &options, json)
        }
        FilesCommands::Clean {
            options,
            paths,
            dry_run,
            json,
        } => {
            let options = parse_options(&options, &ScanOption::ALL)?;
            if dry_run {
                return execute_scan(&cleaner, &options, json);
            }

            let report = cleaner.clean(&options, &paths)?;
            if json {
                return print_json(&report);
            }
            println!("{}", report.message);
            if !report.skipped.is_empty() {
                println!("\nSkipped:");
                for skipped in &report.skipped {
                    println!("  {} ({})", skipped.path.display(), skipped.reason);
                }
            }
            Ok(())
        }
    }
}

fn execute_scan(
    cleaner: &SiteFileCleaner<'_>,
    options: &[ScanOption],
    json: bool,
) -> CommandResult {
    let report = cleaner.preview(options)?;

    if json {
        return print_json(&report);
    }

    println!("{}", report.message);
    if report.total_files == 0 {
        return Ok(());
    }

    println!();
    for (category, group) in &report.file_breakdown {
        println!("  {category}: {} files ({})", group.count, group.size_formatted);
    }
    println!("\nFiles:");
    for entry in &report.files {
        println!("  {}", entry.path.display());
    }
    if report.files.len() < report.total_files {
        println!("  ... and {} more", report.total_files - report.files.len());
    }
    Ok(())
}
