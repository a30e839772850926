//! Plugin CLI commands
//!
//! Handles: reia plugins analyze

use clap::Subcommand;
use reia_core::maintenance::PluginAnalyzer;

use super::{print_json, CommandResult, Site};

/// Plugin commands
#[derive(Subcommand)]
pub enum PluginCommands {
    /// List installed plugins with size, state and flagged code
    Analyze {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute plugin command
pub fn execute(cmd: PluginCommands, site: &Site) -> CommandResult {
    match cmd {
        PluginCommands::Analyze { json } => {
            let report = PluginAnalyzer::new(&site.config, site.database.as_ref()).analyze()?;
            if json {
                return print_json(&report);
            }

            if report.plugins.is_empty() {
                println!("No plugins installed.");
                return Ok(());
            }

            println!(
                "{} plugins ({} active, {} inactive), {} total\n",
                report.total_plugins,
                report.active_plugins,
                report.inactive_plugins,
                report.total_size
            );
            for plugin in &report.plugins {
                let state = if plugin.active { "active" } else { "inactive" };
                let version = plugin.version.as_deref().unwrap_or("-");
                println!(
                    "  {} {version} [{state}] {} ({})",
                    plugin.name, plugin.size, plugin.file
                );
                for detail in &plugin.security_details {
                    println!("      ! {detail}");
                }
            }
            Ok(())
        }
    }
}
