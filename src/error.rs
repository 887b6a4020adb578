//! Error types for the mandate reconciler.
//!
//! Three layers, matching how far a failure is allowed to travel:
//! [`ParseError`] stays on its line, [`StoreError`] is contained per batch
//! or per record by the engine, and [`EngineError`] aborts the run.

use thiserror::Error;

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for store gateway operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that abort a reconciliation run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying delimited reader failure (not a per-line parse failure)
    #[error("CSV reader error: {0}")]
    Csv(#[from] csv::Error),

    /// Input file has no header line
    #[error("Input has no header line")]
    MissingHeader,

    /// Header does not describe the positional layout the parser decodes
    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    /// Store unreachable while classifying a batch; no safe classification is possible
    #[error("Classification lookup failed: {0}")]
    ClassificationLookup(#[source] StoreError),

    /// Store snapshot could not be loaded or saved
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Configuration rejected before the run started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single malformed line. Logged, counted and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A value failed to parse in its expected type
    #[error("line {line}: malformed {field} value {value:?}: {reason}")]
    MalformedField {
        line: u64,
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Line does not carry the expected number of fields
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCountMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A field required for classification is absent
    #[error("line {line}: required field {field} is empty")]
    MissingRequiredField { line: u64, field: &'static str },

    /// Line is not valid UTF-8
    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 { line: u64 },
}

/// Errors reported by a store gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached at all
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique key would be violated
    #[error("duplicate key {key} in {collection}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    /// Replace target does not exist
    #[error("no {collection} document with key {key}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    /// Atomic transaction could not be committed; nothing was applied
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// A single document write was rejected
    #[error("write rejected for {key}: {reason}")]
    WriteRejected { key: String, reason: String },
}

impl ParseError {
    /// Source line number the failure refers to (1-indexed, header is line 1).
    pub fn line(&self) -> u64 {
        match self {
            ParseError::MalformedField { line, .. }
            | ParseError::FieldCountMismatch { line, .. }
            | ParseError::MissingRequiredField { line, .. }
            | ParseError::InvalidUtf8 { line } => *line,
        }
    }
}
