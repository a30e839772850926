//! CLI command handlers
//!
//! Each utility has its own module. Handlers print human-readable output
//! by default and the raw payload with `--json`.

pub mod backup;
pub mod database;
pub mod files;
pub mod performance;
pub mod plugins;
pub mod security;

use anyhow::{bail, Context};
use reia_core::{Database, SiteConfig, TableSource};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result type shared by the command handlers
pub type CommandResult = Result<(), Box<dyn Error>>;

/// Site configuration plus its open database, if any
pub struct Site {
    pub config: SiteConfig,
    pub database: Option<Database>,
}

impl Site {
    /// Resolve the configuration and open the database
    ///
    /// `database` overrides the path from the configuration file.
    pub fn load(
        site_root: &Path,
        config_path: Option<&Path>,
        database: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) => SiteConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => SiteConfig::discover(site_root)?,
        };
        if database.is_some() {
            config.database = database;
        }

        let database = match &config.database {
            Some(path) => {
                if !path.is_file() {
                    bail!("Database file does not exist: {}", path.display());
                }
                let db = Database::open(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?;
                Some(db)
            }
            None => None,
        };

        tracing::debug!(
            site = %config.site_root.display(),
            has_database = database.is_some(),
            "site loaded"
        );
        Ok(Self { config, database })
    }

    /// The open database, or an error for commands that need one
    pub fn require_database(&self) -> Result<&Database, Box<dyn Error>> {
        self.database
            .as_ref()
            .ok_or_else(|| "No database configured for this site (use --database)".into())
    }

    /// The database as a dump source
    pub fn table_source(&self) -> Option<&dyn TableSource> {
        self.database.as_ref().map(|db| db as &dyn TableSource)
    }
}

/// Parse option names; none selected means every option
pub fn parse_options<T>(values: &[String], all: &[T]) -> Result<Vec<T>, T::Err>
where
    T: FromStr + Copy,
{
    if values.is_empty() {
        return Ok(all.to_vec());
    }
    values.iter().map(|v| v.parse()).collect()
}

/// Print a payload as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
