//! Security audit CLI commands
//!
//! Handles: reia security scan

use clap::Subcommand;
use reia_core::SecurityAudit;
use reia_scanner::CheckStatus;

use super::{print_json, CommandResult, Site};

/// Security commands
#[derive(Subcommand)]
pub enum SecurityCommands {
    /// Run every security check
    Scan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute security command
pub fn execute(cmd: SecurityCommands, site: &Site) -> CommandResult {
    match cmd {
        SecurityCommands::Scan { json } => {
            let report = SecurityAudit::new(&site.config, site.database.as_ref()).run()?;
            if json {
                return print_json(&report);
            }

            println!("Security score: {}/100\n", report.score);
            for check in report.checks() {
                let marker = match check.status {
                    CheckStatus::Pass => "ok",
                    CheckStatus::Warning => "warn",
                    CheckStatus::Fail => "FAIL",
                    CheckStatus::Info => "info",
                };
                println!("  [{marker}] {}: {}", check.name, check.message);
                if let Some(recommendation) = &check.recommendation {
                    println!("         {recommendation}");
                }
            }
            if !report.code_issues.is_empty() {
                println!("\nCode issues:");
                for issue in &report.code_issues {
                    println!("  {}", issue.message);
                }
            }
            Ok(())
        }
    }
}
