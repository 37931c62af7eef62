//! REST API types for the dashboard frontend.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PipelineError, SheetsError, ValidationError};
use crate::models::SummaryMetrics;
use crate::refresh::RefreshOutcome;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            service: "savings-metrics".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Summary-only view of a refresh cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub stale: bool,
    pub summary: SummaryMetrics,
}

impl From<RefreshOutcome> for SummaryResponse {
    fn from(outcome: RefreshOutcome) -> Self {
        Self {
            cycle_id: outcome.cycle_id,
            generated_at: outcome.generated_at,
            stale: outcome.stale,
            summary: outcome.report.summary,
        }
    }
}

/// Response after appending one row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    pub status: String,
    pub sheet: String,
    pub updated_range: String,
    pub updated_rows: u32,
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

/// HTTP status for a failed refresh cycle.
pub fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Sheets(e) => sheets_status(e),
        PipelineError::Data(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP status for a sheet source failure.
pub fn sheets_status(err: &SheetsError) -> StatusCode {
    match err {
        SheetsError::ReadOnly => StatusCode::FORBIDDEN,
        SheetsError::MissingCredentials(_) | SheetsError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// HTTP status for a rejected row.
pub fn validation_status(err: &ValidationError) -> StatusCode {
    match err {
        ValidationError::UnknownSheet(_) => StatusCode::NOT_FOUND,
        ValidationError::NoHeader(_) => StatusCode::CONFLICT,
        ValidationError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ValidationError::Invalid { .. } | ValidationError::UnknownColumn { .. } => {
            StatusCode::BAD_REQUEST
        }
    }
}
