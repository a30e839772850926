//! Database and cache CLI commands
//!
//! Handles: reia db optimize, reia db autoload stats/fix, reia cache clear

use clap::Subcommand;
use reia_core::maintenance::{
    AutoloadInspector, CacheCleaner, CacheOption, DatabaseOptimizer, OptimizeOption,
};

use super::{parse_options, print_json, CommandResult, Site};

/// Database commands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Clean up and compact the database
    Optimize {
        /// Steps: autoload, revisions, spam, trash, orphaned, optimize (default: all)
        #[arg(long = "option", value_name = "STEP", value_delimiter = ',')]
        options: Vec<String>,
        /// Preview without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or fix autoloaded options
    Autoload {
        #[command(subcommand)]
        action: AutoloadCommands,
    },
}

/// Autoload commands
#[derive(Subcommand)]
pub enum AutoloadCommands {
    /// Show the autoload footprint
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop autoloading large options
    Fix {
        /// Preview without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Cache commands
#[derive(Subcommand)]
pub enum CacheCommands {
    /// Delete cached rows
    Clear {
        /// Groups: transients, expired (default: all)
        #[arg(long = "option", value_name = "GROUP", value_delimiter = ',')]
        options: Vec<String>,
        /// Preview without deleting
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute database command
pub fn execute(cmd: DbCommands, site: &Site) -> CommandResult {
    let db = site.require_database()?;
    let prefix = site.config.table_prefix();
    let threshold = site.config.limits.large_option_bytes;

    match cmd {
        DbCommands::Optimize {
            options,
            dry_run,
            json,
        } => {
            let options = parse_options(&options, &OptimizeOption::ALL)?;
            let optimizer = DatabaseOptimizer::new(db, prefix, threshold);

            if dry_run {
                let preview = optimizer.preview(&options)?;
                if json {
                    return print_json(&preview);
                }
                println!("{}", preview.message);
                if let Some(autoload) = &preview.autoload {
                    println!(
                        "  Autoload: {} options ({})",
                        autoload.will_fix_count, autoload.total_savings
                    );
                }
                for (label, count) in [
                    ("Revisions", &preview.revisions),
                    ("Spam comments", &preview.spam),
                    ("Trashed posts", &preview.trash),
                ] {
                    if let Some(count) = count {
                        println!("  {label}: {}", count.will_delete_count);
                    }
                }
                if let Some(orphaned) = &preview.orphaned {
                    println!(
                        "  Orphaned metadata: {} post, {} user",
                        orphaned.postmeta_count, orphaned.usermeta_count
                    );
                }
                if let Some(overhead) = &preview.optimize {
                    println!("  Reclaimable space: {}", overhead.total_overhead);
                }
                println!("\nDry run - no changes made.");
                return Ok(());
            }

            let report = optimizer.run(&options)?;
            if json {
                return print_json(&report);
            }
            println!("Database optimized.");
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        DbCommands::Autoload { action } => {
            let inspector = AutoloadInspector::new(db, prefix, threshold);
            match action {
                AutoloadCommands::Stats { json } => {
                    let stats = inspector.stats()?;
                    if json {
                        return print_json(&stats);
                    }
                    println!("Autoload size: {} MB ({} options)", stats.size_mb, stats.count);
                    println!(
                        "Large options: {} (potential savings {} MB)",
                        stats.large_options_count, stats.potential_savings_mb
                    );
                    Ok(())
                }
                AutoloadCommands::Fix { dry_run: true, json } => {
                    let large = inspector.large_options()?;
                    if json {
                        return print_json(&large);
                    }
                    println!("Would stop autoloading {} options:", large.len());
                    for option in &large {
                        println!("  {} ({})", option.name, option.size);
                    }
                    println!("\nDry run - no changes made.");
                    Ok(())
                }
                AutoloadCommands::Fix { dry_run: false, json } => {
                    let report = inspector.fix()?;
                    if json {
                        return print_json(&report);
                    }
                    println!(
                        "Optimized {} autoloaded options: {} MB -> {} MB ({}% smaller)",
                        report.fixed_count,
                        report.old_size_mb,
                        report.new_size_mb,
                        report.performance_improvement
                    );
                    Ok(())
                }
            }
        }
    }
}

/// Execute cache command
pub fn execute_cache(cmd: CacheCommands, site: &Site) -> CommandResult {
    let db = site.require_database()?;
    let cleaner = CacheCleaner::new(db, site.config.table_prefix());

    match cmd {
        CacheCommands::Clear {
            options,
            dry_run,
            json,
        } => {
            let options = parse_options(&options, &CacheOption::ALL)?;

            if dry_run {
                let preview = cleaner.preview(&options)?;
                if json {
                    return print_json(&preview);
                }
                println!("{}", preview.message);
                if let Some(count) = preview.transients {
                    println!("  Transients: {count}");
                }
                if let Some(count) = preview.expired_transients {
                    println!("  Expired transients: {count}");
                }
                println!("\nDry run - no changes made.");
                return Ok(());
            }

            let report = cleaner.run(&options)?;
            if json {
                return print_json(&report);
            }
            println!("Cache cleared.");
            if let Some(count) = report.expired_transients {
                println!("  Expired transient rows deleted: {count}");
            }
            if let Some(count) = report.transients {
                println!("  Transient rows deleted: {count}");
            }
            Ok(())
        }
    }
}
