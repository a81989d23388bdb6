// 🚨 Error Kinds - one enum for the whole load
// Every failure the transform core or the loader can raise

use crate::entities::Entity;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ERROR ENUM
// ============================================================================

#[derive(Debug, Error)]
pub enum EtlError {
    // === Record shape / content ===
    /// Expected CSV column absent from a row
    #[error("schema mismatch: column '{column}' missing from {entity} row")]
    SchemaMismatch { entity: Entity, column: String },

    /// Date or timestamp not in day/month/year[ hour:minute:second] form
    #[error("invalid date in '{column}': '{value}' (expected {expected})")]
    InvalidDate {
        column: String,
        value: String,
        expected: &'static str,
    },

    /// Amount not numeric after comma → period substitution
    #[error("invalid amount in '{column}': '{value}'")]
    InvalidAmount { column: String, value: String },

    /// Text could not be decoded (re-encode operator or input decoding)
    #[error("malformed input: {reason} in '{value}'")]
    MalformedInput { value: String, reason: String },

    // === Boundaries ===
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Detected before any row is read
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    // === Row context ===
    /// Wraps a failure with the entity and row it happened on
    #[error("{entity} row at line {line}{}: {source}", key_suffix(.key))]
    Row {
        entity: Entity,
        line: u64,
        key: Option<String>,
        #[source]
        source: Box<EtlError>,
    },

    /// Wraps a failure of a multi-row batch with its entity and line range
    #[error("{entity} batch at lines {first_line}-{last_line}: {source}")]
    Batch {
        entity: Entity,
        first_line: u64,
        last_line: u64,
        #[source]
        source: Box<EtlError>,
    },
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" (key {})", k),
        None => String::new(),
    }
}

// ============================================================================
// ERROR KIND
// ============================================================================

/// Stable tag for each error kind, used in logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaMismatch,
    InvalidDate,
    InvalidAmount,
    MalformedInput,
    Database,
    Configuration,
    Io,
    Csv,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::InvalidDate => "invalid_date",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::Database => "database",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
            ErrorKind::Csv => "csv",
        }
    }
}

impl EtlError {
    /// Kind of the underlying failure (row context is looked through)
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            EtlError::InvalidDate { .. } => ErrorKind::InvalidDate,
            EtlError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            EtlError::MalformedInput { .. } => ErrorKind::MalformedInput,
            EtlError::Database(_) => ErrorKind::Database,
            EtlError::Configuration(_) => ErrorKind::Configuration,
            EtlError::Io { .. } => ErrorKind::Io,
            EtlError::Csv { .. } => ErrorKind::Csv,
            EtlError::Row { source, .. } | EtlError::Batch { source, .. } => source.kind(),
        }
    }

    /// Attach entity/line/key context to a row-level failure
    pub fn in_row(self, entity: Entity, line: u64, key: Option<String>) -> Self {
        EtlError::Row {
            entity,
            line,
            key,
            source: Box::new(self),
        }
    }

    /// Attach entity and line range to a failed batch
    pub fn in_batch(self, entity: Entity, first_line: u64, last_line: u64) -> Self {
        EtlError::Batch {
            entity,
            first_line,
            last_line,
            source: Box::new(self),
        }
    }

    /// Row-level failures may be skipped under the `skip` policy;
    /// everything else ends the run
    pub fn is_row_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SchemaMismatch
                | ErrorKind::InvalidDate
                | ErrorKind::InvalidAmount
                | ErrorKind::MalformedInput
        )
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

// ============================================================================
// TESTS
// ============================================================================
