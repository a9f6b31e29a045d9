//! Error types for tableprov.

use thiserror::Error;

/// Result type alias for tableprov operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for tableprov.
///
/// Component crates keep their own narrow error enums and convert into this
/// one at the CLI boundary, where `code()` picks the reported error class.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("index file unreadable: {0}")]
    IndexRead(String),

    // Table source errors (20-29)
    #[error("no source available for {0}")]
    NoSource(String),

    #[error("copy to working file failed: {0}")]
    Copy(String),

    #[error("read failed: {0}")]
    Read(String),

    // Validation errors (30-39)
    #[error("validation failed: {0}")]
    Validation(String),

    // Liveness (40-49)
    #[error("liveness check failed: {0}")]
    Liveness(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::IndexRead(_) => 11,
            Error::NoSource(_) => 20,
            Error::Copy(_) => 21,
            Error::Read(_) => 22,
            Error::Validation(_) => 30,
            Error::Liveness(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
