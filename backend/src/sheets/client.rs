//! Google Sheets v4 values client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use savings_metrics::sheets::{Credentials, SheetsClient};
//!
//! let client = SheetsClient::new("1AbC...", Credentials::ApiKey(key));
//! let rows = client.read_range("01_Members!A1:Z1000").await?;
//! ```

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::auth::{exchange_token, AccessToken, Credentials, READONLY_SCOPE, READWRITE_SCOPE};
use super::SheetSource;
use crate::error::{SheetsError, SheetsResult};

/// Sheets API endpoint for spreadsheets.
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Cell range read for a whole sheet.
pub const SHEET_RANGE: &str = "A1:Z1000";

/// Default number of attempts for reads
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Marker the API puts in 400 responses for a sheet that does not exist.
const UNKNOWN_RANGE_MARKER: &str = "Unable to parse range";

/// `values.get` response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// `values.append` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: String,
    #[serde(default)]
    updated_rows: u32,
}

/// API error envelope
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// What an append changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    pub updated_range: String,
    pub updated_rows: u32,
}

/// Resolved request authorization
enum Authorization {
    Bearer(String),
    ApiKey(String),
}

impl Authorization {
    fn apply(self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Authorization::Bearer(token) => request.bearer_auth(token),
            Authorization::ApiKey(key) => request.query(&[("key", key)]),
        }
    }
}

/// Sheets API client for one spreadsheet.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    credentials: Credentials,
    allow_writes: bool,
    max_retries: u32,
    retry_delay: Duration,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl SheetsClient {
    /// Create a read-only client for `spreadsheet_id`
    pub fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            allow_writes: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the number of read attempts (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the pause between read attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Request write scope and allow `append_row`
    pub fn with_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }

    pub fn allows_writes(&self) -> bool {
        self.allow_writes
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn scope(&self) -> &'static str {
        if self.allow_writes {
            READWRITE_SCOPE
        } else {
            READONLY_SCOPE
        }
    }

    /// Read a whole sheet. An absent sheet reads as no rows.
    ///
    /// The API drops trailing empty cells, so short rows are filled back out
    /// to the header width. Rows wider than the header are left as they are.
    pub async fn read_sheet_rows(&self, sheet: &str) -> SheetsResult<Vec<Vec<String>>> {
        let rows = self.read_range(&format!("{}!{}", sheet, SHEET_RANGE)).await?;
        Ok(restore_trailing_cells(rows))
    }

    /// Read the header row of a sheet; empty if the sheet is absent or blank.
    pub async fn read_header(&self, sheet: &str) -> SheetsResult<Vec<String>> {
        let rows = self.read_range(&format!("{}!1:1", sheet)).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Read a range as formatted strings, with retries.
    ///
    /// 429, 5xx and transport failures are retried; an unknown range is
    /// treated as an absent sheet and reads as no rows.
    pub async fn read_range(&self, range: &str) -> SheetsResult<Vec<Vec<String>>> {
        let mut attempt = 1;
        loop {
            match self.try_read_range(range).await {
                Ok(rows) => return Ok(rows),
                Err(SheetsError::Api { status, message })
                    if status == StatusCode::BAD_REQUEST.as_u16()
                        && message.contains(UNKNOWN_RANGE_MARKER) =>
                {
                    tracing::warn!(range, "Sheet not found, reading as empty");
                    return Ok(Vec::new());
                }
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    tracing::warn!(
                        range,
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "Read failed, retrying in {}ms",
                        self.retry_delay.as_millis()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single `values.get` call
    async fn try_read_range(&self, range: &str) -> SheetsResult<Vec<Vec<String>>> {
        let url = self.values_url(range)?;
        let request = self
            .http
            .get(url)
            .query(&[("valueRenderOption", "FORMATTED_VALUE")]);
        let request = self.authorization().await?.apply(request);

        let body = send(request).await?;
        let values: ValueRange = serde_json::from_str(&body)
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))?;

        tracing::debug!(range, rows = values.values.len(), "Read range");
        Ok(values.values.into_iter().map(stringify_row).collect())
    }

    /// Append one row after the last row of `sheet`.
    ///
    /// A single call with no retry: a retried append could insert twice.
    pub async fn append_row(&self, sheet: &str, values: Vec<String>) -> SheetsResult<AppendResult> {
        if !self.allow_writes {
            return Err(SheetsError::ReadOnly);
        }

        let url = self.values_url(&format!("{}!A1:append", sheet))?;
        let request = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "values": [values] }));
        let request = self.authorization().await?.apply(request);

        let body = send(request).await?;
        let response: AppendResponse = serde_json::from_str(&body)
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            sheet,
            range = %response.updates.updated_range,
            "Appended row"
        );
        Ok(AppendResult {
            updated_range: response.updates.updated_range,
            updated_rows: response.updates.updated_rows,
        })
    }

    fn values_url(&self, range: &str) -> SheetsResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SheetsError::RequestFailed(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::RequestFailed("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    async fn authorization(&self) -> SheetsResult<Authorization> {
        match &self.credentials {
            Credentials::AccessToken(token) => Ok(Authorization::Bearer(token.clone())),
            Credentials::ApiKey(key) => Ok(Authorization::ApiKey(key.clone())),
            Credentials::ServiceAccount(key) => {
                let mut cached = self.token.lock().await;
                let now = chrono::Utc::now().timestamp();
                if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
                    return Ok(Authorization::Bearer(token.value.clone()));
                }
                let token = exchange_token(&self.http, key, self.scope()).await?;
                let value = token.value.clone();
                *cached = Some(token);
                Ok(Authorization::Bearer(value))
            }
        }
    }
}

impl SheetSource for SheetsClient {
    async fn read_sheet(&self, name: &str) -> SheetsResult<Vec<Vec<String>>> {
        self.read_sheet_rows(name).await
    }

    async fn read_header(&self, name: &str) -> SheetsResult<Vec<String>> {
        SheetsClient::read_header(self, name).await
    }

    fn allows_writes(&self) -> bool {
        self.allow_writes
    }

    async fn append_row(&self, name: &str, values: Vec<String>) -> SheetsResult<AppendResult> {
        SheetsClient::append_row(self, name, values).await
    }
}

/// Send a request and return the body of a successful response.
async fn send(request: RequestBuilder) -> SheetsResult<String> {
    let response = request
        .send()
        .await
        .map_err(|e| SheetsError::RequestFailed(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SheetsError::RequestFailed(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

fn is_retryable(err: &SheetsError) -> bool {
    match err {
        SheetsError::RequestFailed(_) => true,
        SheetsError::Api { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}

fn restore_trailing_cells(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.first().map_or(0, Vec::len);
    for row in rows.iter_mut().skip(1) {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
    rows
}

/// Formatted values are strings already; anything else is rendered as JSON.
fn stringify_row(row: Vec<Value>) -> Vec<String> {
    row.into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}
