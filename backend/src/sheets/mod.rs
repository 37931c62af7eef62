//! Sheet sources: where raw rows come from.
//!
//! Every source answers one question: the rows of a named sheet, header
//! first, all values as text. An absent sheet reads as no rows rather than
//! an error, so the core sees it as an empty table.
//!
//! - [`SheetsClient`] - Google Sheets v4 API (read + append)
//! - [`CsvDirSource`] - a directory of `<sheet>.csv` exports
//! - [`StaticSource`] - an in-memory workbook, e.g. loaded from JSON

pub mod auth;
pub mod client;

use futures::future::try_join_all;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::{SheetsError, SheetsResult};
use crate::models::{RawWorkbook, SheetNames};
use crate::parser::parse_bytes_auto;

pub use auth::{Credentials, ServiceAccountKey};
pub use client::{AppendResult, SheetsClient};

/// Anything that can hand over the raw rows of a named sheet.
///
/// Sources are read-only unless they override the write half.
pub trait SheetSource: Send + Sync {
    fn read_sheet(&self, name: &str)
        -> impl Future<Output = SheetsResult<Vec<Vec<String>>>> + Send;

    /// Header row of a sheet; empty if the sheet is absent.
    fn read_header(&self, name: &str) -> impl Future<Output = SheetsResult<Vec<String>>> + Send {
        async move {
            let rows = self.read_sheet(name).await?;
            Ok(rows.into_iter().next().unwrap_or_default())
        }
    }

    fn allows_writes(&self) -> bool {
        false
    }

    /// Append one row of values, already in header order.
    fn append_row(
        &self,
        _name: &str,
        _values: Vec<String>,
    ) -> impl Future<Output = SheetsResult<AppendResult>> + Send {
        async { Err(SheetsError::ReadOnly) }
    }
}

/// Read the four ledger sheets concurrently into one snapshot.
pub async fn fetch_workbook<S: SheetSource>(
    source: &S,
    names: &SheetNames,
) -> SheetsResult<RawWorkbook> {
    let sheets = names.all();
    let rows = try_join_all(sheets.iter().map(|name| source.read_sheet(name))).await?;

    let mut workbook = RawWorkbook::new();
    for (name, rows) in sheets.into_iter().zip(rows) {
        workbook.insert(name, rows);
    }
    Ok(workbook)
}

// =============================================================================
// Static Source
// =============================================================================

/// A fixed workbook held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    workbook: RawWorkbook,
}

impl StaticSource {
    pub fn new(workbook: RawWorkbook) -> Self {
        Self { workbook }
    }

    /// Load `{ "<sheet>": [["header", ...], [...]], ... }` from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SheetsResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let workbook = serde_json::from_str(&content)
            .map_err(|e| SheetsError::InvalidResponse(format!("workbook JSON: {}", e)))?;
        Ok(Self { workbook })
    }

    pub fn workbook(&self) -> &RawWorkbook {
        &self.workbook
    }
}

impl SheetSource for StaticSource {
    async fn read_sheet(&self, name: &str) -> SheetsResult<Vec<Vec<String>>> {
        Ok(self.workbook.rows(name).to_vec())
    }
}

// =============================================================================
// CSV Directory Source
// =============================================================================

/// Sheets exported as `<dir>/<sheet>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }
}

impl SheetSource for CsvDirSource {
    async fn read_sheet(&self, name: &str) -> SheetsResult<Vec<Vec<String>>> {
        let path = self.path_for(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Sheet export not found, reading as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let parsed = parse_bytes_auto(&bytes)
            .map_err(|e| SheetsError::Csv(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(
            sheet = name,
            encoding = %parsed.encoding,
            delimiter = ?parsed.delimiter,
            rows = parsed.rows.len(),
            "Read CSV export"
        );
        Ok(parsed.rows)
    }
}
