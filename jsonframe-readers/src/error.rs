//! Error types for the JSON ingestion engine

use thiserror::Error;

/// Error type for JSON reads and writes
///
/// Every parse or schema error is fatal to the enclosing read call; no
/// partial tables are ever returned. Offsets and record indices are carried
/// so the offending input can be located.
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] jsonframe_core::error::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input source does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Input kind cannot be turned into bytes (e.g. unknown URI scheme)
    #[error("Unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// Input kind is invalid for the requested mode (e.g. directory input
    /// in whole-document mode)
    #[error("Invalid input kind: {0}")]
    InvalidInputKind(String),

    /// A record was cut off before its end (unterminated string at EOF)
    #[error("Truncated record at byte offset {offset}")]
    TruncatedRecord {
        /// Byte offset of the start of the truncated record
        offset: usize,
    },

    /// A quoted string literal was never closed
    #[error("Unterminated string at byte offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote within the record
        offset: usize,
    },

    /// Structurally unparseable JSON
    #[error("Unexpected token at byte offset {offset}: {found}")]
    UnexpectedToken {
        /// Byte offset within the record
        offset: usize,
        /// Description of what was found
        found: String,
    },

    /// A field mixed types with no common supertype
    #[error("Schema conflict for field '{field}': {detail}")]
    SchemaConflict {
        /// Field name
        field: String,
        /// Conflicting type description
        detail: String,
    },

    /// A value could not be coerced to the fixed column type
    #[error("Cannot coerce value in field '{field}' at record {record}: {detail}")]
    TypeCoercion {
        /// Field name
        field: String,
        /// Record index (row) of the offending value
        record: usize,
        /// What failed
        detail: String,
    },

    /// Explicit engine/mode mismatch
    #[error("Engine not supported: {0}")]
    EngineNotSupported(String),

    /// Compression codec error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Malformed document for the requested orient
    #[error("Format error: {0}")]
    Format(String),
}

/// Result type for JSON reads and writes
pub type Result<T> = std::result::Result<T, Error>;
