//! SQL dump generation
//!
//! Produces a plain-text dump of every table under the site's prefix:
//! `DROP TABLE IF EXISTS`, the stored `CREATE TABLE` statement, then one
//! `INSERT` per row.
//!
//! The output is SQLite dialect. Non-null values are emitted as quoted
//! strings with embedded quotes doubled and backslashes left as-is. Blobs
//! become hex literals (`X'FF00FE'`), and text that is not valid UTF-8 or
//! contains NUL is written as `CAST(X'..' AS TEXT)` so every byte survives
//! a re-import.

use crate::db::{DatabaseError, SqlValue, TableSource};
use chrono::Utc;
use std::fmt::Write as _;
use thiserror::Error;

/// Name of the dump inside backup archives
pub const DUMP_FILE_NAME: &str = "database.sql";

/// Errors that abort a whole dump
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No tables found in database")]
    NoTables,
}

/// A finished dump
#[derive(Debug, Clone)]
pub struct SqlDump {
    /// The SQL text
    pub sql: String,
    /// Tables whose structure was written
    pub tables: Vec<String>,
    /// Tables whose rows could not be read (recorded inline as comments)
    pub failed_tables: Vec<String>,
    /// Number of `INSERT` statements written
    pub rows: usize,
}

impl SqlDump {
    /// Whether any table made it into the dump
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Dumps the tables of one site
pub struct DatabaseDumper<'a> {
    source: &'a dyn TableSource,
    prefix: String,
}

/// Quote an identifier with backticks
fn backtick(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string as a SQL string literal
fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}

/// Render one value for an `INSERT` statement
fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => quote_text(&i.to_string()),
        SqlValue::Real(f) => quote_text(&f.to_string()),
        SqlValue::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.contains('\0') => quote_text(text),
            _ => format!("CAST({} AS TEXT)", hex_literal(bytes)),
        },
        SqlValue::Blob(bytes) => hex_literal(bytes),
    }
}

impl<'a> DatabaseDumper<'a> {
    /// Create a dumper for tables starting with `prefix`
    #[must_use]
    pub fn new(source: &'a dyn TableSource, prefix: impl Into<String>) -> Self {
        Self {
            source,
            prefix: prefix.into(),
        }
    }

    /// Generate the dump
    ///
    /// Tables outside the prefix are skipped, as are tables without a
    /// retrievable `CREATE TABLE` statement. A failure to read one table's
    /// rows is written into the dump as a comment and does not abort.
    ///
    /// # Errors
    /// Returns an error if the table list cannot be read or is empty
    pub fn dump(&self) -> Result<SqlDump, DumpError> {
        let all_tables = self.source.list_tables()?;
        if all_tables.is_empty() {
            return Err(DumpError::NoTables);
        }

        let mut dump = SqlDump {
            sql: String::new(),
            tables: Vec::new(),
            failed_tables: Vec::new(),
            rows: 0,
        };
        let _ = writeln!(
            dump.sql,
            "-- REIA database dump\n-- Generated: {}\n-- Table prefix: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            self.prefix
        );

        for table in all_tables.iter().filter(|t| t.starts_with(&self.prefix)) {
            let create = match self.source.create_statement(table) {
                Ok(Some(create)) => create,
                Ok(None) => {
                    tracing::debug!(table, "no CREATE statement, skipping table");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(table, error = %e, "could not read table structure");
                    continue;
                }
            };

            let name = backtick(table);
            let _ = write!(
                dump.sql,
                "\n\n-- Table structure for table {name}\nDROP TABLE IF EXISTS {name};\n{};\n",
                create.trim_end_matches(';')
            );
            dump.tables.push(table.clone());

            let rows = match self.source.fetch_rows(table) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(table, error = %e, "could not read table data");
                    let _ = writeln!(
                        dump.sql,
                        "\n-- Error retrieving data for table {name}: {}",
                        e.to_string().replace('\n', " ")
                    );
                    dump.failed_tables.push(table.clone());
                    continue;
                }
            };

            if rows.is_empty() {
                continue;
            }

            let _ = writeln!(dump.sql, "\n-- Dumping data for table {name}");
            for row in &rows {
                let values: Vec<String> = row.iter().map(render_value).collect();
                let _ = writeln!(dump.sql, "INSERT INTO {name} VALUES ({});", values.join(", "));
            }
            dump.rows += rows.len();
        }

        Ok(dump)
    }
}
