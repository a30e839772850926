//! Error types for the REIA scanner

use thiserror::Error;

/// Result type for scanner operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur during scanning
#[derive(Error, Debug)]
pub enum ScanError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed part way
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A glob or check pattern did not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown scan option name
    #[error("Unknown scan option: {0}")]
    UnknownOption(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
