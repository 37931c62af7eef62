//! Typed tables built from raw sheet rows.
//!
//! The first raw row names the columns; every other row becomes one record,
//! aligned positionally. Unlike a plain CSV reader, ragged rows are rejected
//! instead of padded or truncated.
//!
//! # Example
//!
//! ```
//! use savings_metrics::table::{build, Cell};
//!
//! let table = build(vec![
//!     vec!["A".to_string(), "B".to_string()],
//!     vec!["1".to_string(), "2".to_string()],
//! ]).unwrap();
//!
//! assert_eq!(table.len(), 1);
//! assert_eq!(table.get(0, "B"), Some(&Cell::Text("2".to_string())));
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::SchemaError;

/// One table value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
}

impl Cell {
    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content; integers widen to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Value as a grouping key. Numbers use their shortest display form.
    pub fn key(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Integer(i) => i.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Ordered rows of named, positionally aligned cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a table from parts, checking unique names and row arity.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SchemaError::RowLength {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True for the table built from an absent sheet: no header at all.
    pub fn is_headerless(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller needs.
    pub fn require_column(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    /// Like [`Table::require_column`], but a headerless table yields `None`
    /// so absent sheets flow through as "no data" rather than as errors.
    pub fn locate(&self, name: &str) -> Result<Option<usize>, SchemaError> {
        if self.is_headerless() {
            return Ok(None);
        }
        self.require_column(name).map(Some)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Replace a column's values in place, or append it if new.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<(), SchemaError> {
        if values.len() != self.rows.len() {
            return Err(SchemaError::RowLength {
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Records as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        (name.clone(), serde_json::to_value(cell).unwrap_or(Value::Null))
                    })
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// Build a table from raw rows whose first element is the header.
///
/// An empty input gives an empty table. Fails with
/// [`SchemaError::RowLength`] on the first row whose length differs from the
/// header's, and with [`SchemaError::DuplicateColumn`] on repeated names.
pub fn build(rows: Vec<Vec<String>>) -> Result<Table, SchemaError> {
    let mut rows = rows.into_iter();
    let columns = match rows.next() {
        Some(header) => header,
        None => return Ok(Table::empty()),
    };

    let data = rows
        .map(|row| row.into_iter().map(Cell::Text).collect())
        .collect();

    Table::from_parts(columns, data)
}
