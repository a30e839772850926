//! Performance CLI commands
//!
//! Handles: reia performance analyze/optimize

use clap::Subcommand;
use reia_core::maintenance::{PerfStatus, PerformanceAnalyzer};

use super::{print_json, CommandResult, Site};

/// Performance commands
#[derive(Subcommand)]
pub enum PerformanceCommands {
    /// Report performance checks and a score
    Analyze {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reclaim database space and delete expired transients
    Optimize {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute performance command
pub fn execute(cmd: PerformanceCommands, site: &Site) -> CommandResult {
    let analyzer = PerformanceAnalyzer::new(&site.config, site.database.as_ref());

    match cmd {
        PerformanceCommands::Analyze { json } => {
            let report = analyzer.analyze()?;
            if json {
                return print_json(&report);
            }

            println!("Performance score: {}/100\n", report.overall_score);
            for check in &report.checks {
                let marker = match check.status {
                    PerfStatus::Good => "ok",
                    PerfStatus::Warning => "warn",
                    PerfStatus::Info => "info",
                };
                println!("  [{marker}] {}: {}", check.name, check.message);
            }
            if report.warnings() > 0 {
                println!("\nRun 'reia performance optimize' to apply quick fixes.");
            }
            Ok(())
        }
        PerformanceCommands::Optimize { json } => {
            let report = analyzer.optimize()?;
            if json {
                print_json(&report)
            } else {
                println!("{}", report.message);
                Ok(())
            }
        }
    }
}
