//! REIA CLI - site maintenance from the command line
//!
//! Provides `reia backup`, `reia files`, `reia db`, `reia cache`,
//! `reia security`, `reia performance` and `reia plugins`.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::backup::BackupCommands;
use commands::database::{CacheCommands, DbCommands};
use commands::files::FilesCommands;
use commands::performance::PerformanceCommands;
use commands::plugins::PluginCommands;
use commands::security::SecurityCommands;
use commands::{CommandResult, Site};

#[derive(Parser)]
#[command(name = "reia")]
#[command(about = "REIA - site maintenance toolkit")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(short, long, global = true, default_value = ".")]
    site: PathBuf,

    /// Configuration file (defaults to reia.json in the site root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configuration)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Log level; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list and prune backups
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },
    /// Find and delete leftover files
    Files {
        #[command(subcommand)]
        action: FilesCommands,
    },
    /// Clean up the database
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
    /// Clear cached data
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
    /// Audit site security
    Security {
        #[command(subcommand)]
        action: SecurityCommands,
    },
    /// Analyze and improve performance
    Performance {
        #[command(subcommand)]
        action: PerformanceCommands,
    },
    /// Inspect installed plugins
    Plugins {
        #[command(subcommand)]
        action: PluginCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CommandResult {
    let site = Site::load(&cli.site, cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Backup { action } => commands::backup::execute(action, &site),
        Commands::Files { action } => commands::files::execute(action, &site),
        Commands::Db { action } => commands::database::execute(action, &site),
        Commands::Cache { action } => commands::database::execute_cache(action, &site),
        Commands::Security { action } => commands::security::execute(action, &site),
        Commands::Performance { action } => commands::performance::execute(action, &site),
        Commands::Plugins { action } => commands::plugins::execute(action, &site),
    }
}
