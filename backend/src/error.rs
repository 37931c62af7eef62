//! Error types for the savings metrics pipeline.
//!
//! One type per concern:
//!
//! - [`SchemaError`] - table shape problems (ragged rows, missing/duplicate columns)
//! - [`DateParseError`] - a date cell that is not a calendar date
//! - [`NumericParseError`] - a numeric cell that is not a finite number
//! - [`DataError`] - everything the pure core can fail with
//! - [`SheetsError`] - spreadsheet client, auth and local sources
//! - [`ValidationError`] - rows rejected before append
//! - [`ConfigError`] - environment configuration
//! - [`PipelineError`] - top-level refresh cycle failures
//!
//! Conversion is automatic via `From`, so `?` works across boundaries.
//! Data-row indices are 0-based and exclude the header row.

use thiserror::Error;

// =============================================================================
// Table Shape Errors
// =============================================================================

/// Errors in the shape of a table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A data row does not have one value per column.
    #[error("Row {row} has {found} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The header row names the same column twice.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A required column is absent from a table that has a header.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A key column that must be unique repeats a value.
    #[error("Duplicate key '{value}' in column '{column}'")]
    DuplicateKey { column: String, value: String },

    /// A column used in arithmetic has not been converted to numbers.
    #[error("Column '{column}' row {row} is not numeric")]
    NotNumeric { column: String, row: usize },
}

// =============================================================================
// Cell Parse Errors
// =============================================================================

/// A cell in a date column could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot parse date in column '{column}' row {row}: '{value}'")]
pub struct DateParseError {
    pub column: String,
    pub row: usize,
    pub value: String,
}

/// A cell in a numeric column could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot parse number in column '{column}' row {row}: '{value}'")]
pub struct NumericParseError {
    pub column: String,
    pub row: usize,
    pub value: String,
}

// =============================================================================
// Core Errors
// =============================================================================

/// Everything the build/transform/aggregate core can fail with.
///
/// All variants are fatal to the current refresh cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    DateParse(#[from] DateParseError),

    #[error("{0}")]
    NumericParse(#[from] NumericParseError),

    /// Detail rows reference members missing from the roster and the
    /// join policy asks to fail.
    #[error("{view}: {} member ID(s) not in roster: {}", .member_ids.len(), .member_ids.join(", "))]
    OrphanedMembers {
        view: String,
        member_ids: Vec<String>,
    },
}

// =============================================================================
// Sheet Source Errors
// =============================================================================

/// Errors from spreadsheet sources (remote API or local exports).
#[derive(Debug, Error)]
pub enum SheetsError {
    /// No usable credentials configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Token exchange or key loading failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The API answered with an error status.
    #[error("Sheets API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The API answered with something we cannot decode.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Write attempted on a client without write scope.
    #[error("Client is read-only; set SHEETS_ALLOW_WRITES=true to append rows")]
    ReadOnly,

    /// Local export could not be read.
    #[error("Sheet IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local export could not be parsed.
    #[error("CSV error: {0}")]
    Csv(String),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Rows rejected before they are appended to a sheet.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Sheet kind not recognised.
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    /// Row failed the sheet's JSON schema.
    #[error("Row invalid for {sheet}: {}", .errors.join("; "))]
    Invalid { sheet: String, errors: Vec<String> },

    /// Row names a column the live sheet does not have.
    #[error("Column '{column}' does not exist in sheet {sheet}")]
    UnknownColumn { sheet: String, column: String },

    /// The sheet has no header row to align values against.
    #[error("Sheet {0} has no header row")]
    NoHeader(String),

    /// Embedded schema could not be compiled.
    #[error("Invalid embedded schema: {0}")]
    Schema(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Environment configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level refresh cycle errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Sheets error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        PipelineError::Data(err.into())
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Bind failed: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for the pure core.
pub type DataResult<T> = Result<T, DataError>;

/// Result type for sheet sources.
pub type SheetsResult<T> = Result<T, SheetsError>;

/// Result type for refresh cycles.
pub type PipelineResult<T> = Result<T, PipelineError>;
