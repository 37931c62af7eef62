//! # Savings Metrics - dashboard metrics for a community savings group
//!
//! Reads the group's four ledger sheets (members, monthly collections,
//! disbursements, administrative costs), normalizes them, and derives the
//! monthly and per-member views the dashboard renders.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SheetSource │────▶│    Table    │────▶│  Transform  │────▶│   Metrics   │
//! │ (API / CSV) │     │  (header +  │     │ (dates, f64 │     │ (group, sum │
//! │             │     │   rows)     │     │  columns)   │     │   join)     │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                                            │
//!        │               ┌─────────────┐     ┌─────────────┐          │
//!        └───────────────│   Refresh   │◀────│ Dashboard   │◀─────────┘
//!                        │ (TTL cache) │     │  Report     │
//!                        └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use savings_metrics::{run_pipeline, CsvDirSource, PipelineOptions, SheetNames};
//! use savings_metrics::sheets::fetch_workbook;
//!
//! #[tokio::main]
//! async fn main() {
//!     let names = SheetNames::default();
//!     let raw = fetch_workbook(&CsvDirSource::new("exports"), &names).await.unwrap();
//!     let report = run_pipeline(&raw, &names, &PipelineOptions::default()).unwrap();
//!     println!("Net position: {:.2}", report.summary.net_position);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Sheet kinds, raw workbook, derived views
//! - [`table`] - Header + rows table built from raw sheet rows
//! - [`parser`] - CSV parsing with encoding/delimiter detection
//! - [`transform`] - Date/month extraction, numeric conversion, pipeline
//! - [`metrics`] - Aggregations over the normalized tables
//! - [`sheets`] - Sheet sources (Google Sheets, CSV directory, static)
//! - [`validation`] - JSON Schema checks for appended rows
//! - [`cache`] - Wall-clock bucketed TTL cache
//! - [`refresh`] - Refresh cycles with memoization and stale fallback
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod table;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Aggregation
pub mod metrics;

// Data sources
pub mod sheets;

// Validation
pub mod validation;

// Caching and refresh
pub mod cache;
pub mod refresh;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, DataError, DataResult, PipelineError, PipelineResult, SchemaError, ServerError,
    SheetsError, SheetsResult, ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AdminFeeMonth, BeneficiaryAmount, CashFlowMonth, DashboardReport, DisbursementMonth,
    JoinIntegrityWarning, JoinPolicy, MemberAmount, MemberView, RawWorkbook, SheetKind, SheetNames,
    SpotlightMetrics, SummaryMetrics,
};

// =============================================================================
// Re-exports - Table
// =============================================================================

pub use table::{Cell, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    parse_rows, CsvError, ParsedCsv,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    compute_report, convert_to_float, extract_month, parse_date, parse_float, prepare_tables,
    run_pipeline, LedgerTables, PipelineOptions,
};

// =============================================================================
// Re-exports - Sheet sources
// =============================================================================

pub use sheets::{
    fetch_workbook, AppendResult, Credentials, CsvDirSource, ServiceAccountKey, SheetSource,
    SheetsClient, StaticSource,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, prepare_append, validate, validate_row};

// =============================================================================
// Re-exports - Cache / Refresh / Config
// =============================================================================

pub use cache::TtlCache;
pub use config::Config;
pub use refresh::{RefreshOutcome, RefreshService};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::server::{create_router, serve, start_server, AppState};
