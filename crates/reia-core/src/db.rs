//! Database connection and table access
//!
//! [`TableSource`] is the narrow view of the database the dumper and the
//! estimator need. It is implemented for `rusqlite::Connection`; other
//! clients can implement it to plug into the same backup pipeline.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database query failed: {0}")]
    Query(String),
}

/// A single column value, kept byte-exact
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    /// Text as stored; SQLite does not guarantee valid UTF-8
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Text value from a string
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text(value.as_bytes().to_vec())
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(t) => Self::Text(t.to_vec()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

/// One row of values
pub type Row = Vec<SqlValue>;

/// Read access to tables, as needed for dumps and size estimates
pub trait TableSource {
    /// Names of every table in the database
    ///
    /// # Errors
    /// Returns an error if the table list cannot be read
    fn list_tables(&self) -> Result<Vec<String>, DatabaseError>;

    /// The `CREATE TABLE` statement for a table, if available
    ///
    /// # Errors
    /// Returns an error if the catalogue query fails
    fn create_statement(&self, table: &str) -> Result<Option<String>, DatabaseError>;

    /// Every row of a table
    ///
    /// # Errors
    /// Returns an error if the rows cannot be read
    fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, DatabaseError>;

    /// Approximate on-disk size of the database in bytes
    ///
    /// # Errors
    /// Returns an error if the size cannot be determined
    fn size_bytes(&self) -> Result<u64, DatabaseError>;
}

/// Quote an identifier for SQLite statements
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl TableSource for Connection {
    fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.prepare(
            r"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            ",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn create_statement(&self, table: &str) -> Result<Option<String>, DatabaseError> {
        let sql: Option<Option<String>> = self
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sql.flatten())
    }

    fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, DatabaseError> {
        let mut stmt = self.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns);
            for i in 0..columns {
                values.push(SqlValue::from(row.get_ref(i)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn size_bytes(&self) -> Result<u64, DatabaseError> {
        let page_count: i64 = self.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count * page_size).max(0) as u64)
    }
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open an existing database at the given path
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    ///
    /// # Errors
    /// Returns an error if the database cannot be created
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Get a reference to the connection
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether a table exists
    ///
    /// # Errors
    /// Returns an error if the catalogue query fails
    pub fn table_exists(&self, table: &str) -> Result<bool, DatabaseError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Bytes held by free pages, reclaimable with `VACUUM`
    ///
    /// # Errors
    /// Returns an error if the pragmas cannot be read
    pub fn free_bytes(&self) -> Result<u64, DatabaseError> {
        let free_pages: i64 = self
            .conn
            .query_row("PRAGMA freelist_count", [], |row| row.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((free_pages * page_size).max(0) as u64)
    }
}

impl TableSource for Database {
    fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.conn.list_tables()
    }

    fn create_statement(&self, table: &str) -> Result<Option<String>, DatabaseError> {
        self.conn.create_statement(table)
    }

    fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, DatabaseError> {
        self.conn.fetch_rows(table)
    }

    fn size_bytes(&self) -> Result<u64, DatabaseError> {
        self.conn.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Database {
        let db = Database::in_memory().unwrap();
        db.connection()
            .execute_batch(
                r"
                CREATE TABLE wp_posts (ID INTEGER PRIMARY KEY, title TEXT, score REAL);
                INSERT INTO wp_posts VALUES (1, 'Hello', 1.5), (2, NULL, NULL);
                CREATE TABLE other (x INTEGER);
                ",
            )
            .unwrap();
        db
    }

    #[test]
    fn test_list_tables_sorted() {
        let db = sample();
        assert_eq!(db.list_tables().unwrap(), vec!["other", "wp_posts"]);
    }

    #[test]
    fn test_create_statement() {
        let db = sample();
        let sql = db.create_statement("wp_posts").unwrap().unwrap();
        assert!(sql.starts_with("CREATE TABLE wp_posts"));
        assert!(db.create_statement("missing").unwrap().is_none());
    }

    #[test]
    fn test_fetch_rows_keeps_value_types() {
        let db = sample();
        let rows = db.fetch_rows("wp_posts").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![SqlValue::Integer(1), SqlValue::text("Hello"), SqlValue::Real(1.5)],
                vec![SqlValue::Integer(2), SqlValue::Null, SqlValue::Null],
            ]
        );
    }

    #[test]
    fn test_fetch_rows_keeps_blob_bytes() {
        let db = Database::in_memory().unwrap();
        db.connection()
            .execute_batch("CREATE TABLE wp_meta (v BLOB); INSERT INTO wp_meta VALUES (x'FF00FE');")
            .unwrap();
        let rows = db.fetch_rows("wp_meta").unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Blob(vec![0xFF, 0x00, 0xFE])]]);
    }

    #[test]
    fn test_fetch_rows_missing_table_errors() {
        let db = sample();
        assert!(db.fetch_rows("missing").is_err());
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_table_exists_and_size() {
        let db = sample();
        assert!(db.table_exists("wp_posts").unwrap());
        assert!(!db.table_exists("wp_users").unwrap());
        assert!(db.size_bytes().unwrap() > 0);
    }
}
