//! HTTP Server for the savings metrics API.
//!
//! Serves the derived dashboard views to the frontend. Every dashboard
//! request runs a refresh cycle; the TTL cache makes repeated requests
//! inside one window cheap.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                       |
//! |--------|-------------------------------|-----------------------------------|
//! | GET    | `/health`                     | Health check                      |
//! | GET    | `/api/dashboard`              | Full report for the current cycle |
//! | GET    | `/api/dashboard/summary`      | Summary record only               |
//! | POST   | `/api/sheets/{kind}/rows`     | Validate and append one row       |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs     |

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::Value;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use super::logs::{log_success, LOG_BROADCASTER};
use super::types::{
    error_response, pipeline_status, sheets_status, validation_status, AppendResponse,
    HealthResponse, SummaryResponse,
};
use crate::config::Config;
use crate::error::{ServerError, SheetsError, ValidationError};
use crate::models::SheetKind;
use crate::refresh::{RefreshOutcome, RefreshService};
use crate::sheets::SheetSource;
use crate::validation::prepare_append;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(error_response(&message.to_string())))
}

/// Shared handler state
pub struct AppState<S> {
    pub service: Arc<RefreshService<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: SheetSource> AppState<S> {
    pub fn new(service: RefreshService<S>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the router with CORS and request tracing.
pub fn create_router<S: SheetSource + 'static>(state: AppState<S>) -> Router {
    // Dashboard frontend is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/dashboard", get(dashboard::<S>))
        .route("/api/dashboard/summary", get(summary::<S>))
        .route("/api/sheets/{kind}/rows", post(append_row::<S>))
        .route("/api/logs", get(sse_logs))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server over the configured Google spreadsheet.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    let client = config.sheets_client()?;
    serve(client, &config).await
}

/// Start the HTTP server over any sheet source.
pub async fn serve<S: SheetSource + 'static>(source: S, config: &Config) -> Result<(), ServerError> {
    let service = RefreshService::new(
        source,
        config.sheet_names.clone(),
        config.pipeline_options(),
        config.cache_ttl,
    );
    let app = create_router(AppState::new(service));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Savings metrics server running on http://{}", addr);
    info!("   GET  /api/dashboard          - Full report");
    info!("   GET  /api/dashboard/summary  - Summary totals");
    info!("   POST /api/sheets/{{kind}}/rows - Append a row");
    info!("   GET  /api/logs               - SSE log stream");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn run_cycle<S: SheetSource>(state: &AppState<S>) -> Result<RefreshOutcome, ApiError> {
    state.service.refresh_now().await.map_err(|e| {
        error!("Refresh cycle failed: {}", e);
        api_error(pipeline_status(&e), e)
    })
}

/// Full dashboard report
#[instrument(skip_all)]
async fn dashboard<S: SheetSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<RefreshOutcome>, ApiError> {
    run_cycle(&state).await.map(Json)
}

/// Summary totals only
#[instrument(skip_all)]
async fn summary<S: SheetSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<SummaryResponse>, ApiError> {
    run_cycle(&state).await.map(|o| Json(o.into()))
}

/// Validate one row and append it to the sheet for `kind`
#[instrument(skip_all, fields(kind = %kind))]
async fn append_row<S: SheetSource>(
    State(state): State<AppState<S>>,
    Path(kind): Path<String>,
    Json(row): Json<Value>,
) -> Result<Json<AppendResponse>, ApiError> {
    let kind: SheetKind = kind.parse().map_err(|k| {
        let e = ValidationError::UnknownSheet(k);
        api_error(validation_status(&e), e)
    })?;

    let source = state.service.source();
    if !source.allows_writes() {
        warn!("Append rejected: writes disabled");
        return Err(api_error(StatusCode::FORBIDDEN, SheetsError::ReadOnly));
    }

    let sheet = state.service.names().get(kind).to_string();
    let header = source
        .read_header(&sheet)
        .await
        .map_err(|e| api_error(sheets_status(&e), e))?;
    let values = prepare_append(kind, &sheet, &row, &header)
        .map_err(|e| api_error(validation_status(&e), e))?;

    let result = source
        .append_row(&sheet, values)
        .await
        .map_err(|e| api_error(sheets_status(&e), e))?;

    // the next cycle must see the new row
    state.service.invalidate();
    log_success(format!("Appended row to {} ({})", sheet, result.updated_range));

    Ok(Json(AppendResponse {
        status: "ok".to_string(),
        sheet,
        updated_range: result.updated_range,
        updated_rows: result.updated_rows,
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
