//! Column-level transforms: month extraction and numeric coercion.
//!
//! Both take the table by value and hand back the transformed table. They
//! fail fast: the first bad cell aborts the transform and nothing partial is
//! returned.

use chrono::Datelike;

use super::dates::parse_date;
use super::numeric::parse_float;
use crate::error::{DataError, DateParseError, NumericParseError};
use crate::models::columns::{MONTH, MONTH_NAME, MONTH_ORDER};
use crate::models::{month_name, month_order};
use crate::table::{Cell, Table};

/// Parse `date_column` as dates and derive `Month` (1-12) and `MonthName`.
///
/// With `include_order`, also derives `MonthOrder` (0-11), the calendar
/// position of `MonthName`, for stable axis ordering downstream.
///
/// The date column itself is replaced by parsed dates. A headerless table
/// (absent sheet) is returned unchanged.
pub fn extract_month(
    mut table: Table,
    date_column: &str,
    include_order: bool,
) -> Result<Table, DataError> {
    let idx = match table.locate(date_column)? {
        Some(idx) => idx,
        None => return Ok(table),
    };

    let mut dates = Vec::with_capacity(table.len());
    for (row, cells) in table.rows().iter().enumerate() {
        let date = cell_date(&cells[idx]).ok_or_else(|| DateParseError {
            column: date_column.to_string(),
            row,
            value: cells[idx].key(),
        })?;
        dates.push(date);
    }

    let mut months = Vec::with_capacity(dates.len());
    let mut names = Vec::with_capacity(dates.len());
    let mut orders = Vec::with_capacity(dates.len());
    for date in &dates {
        let number = date.month();
        // chrono guarantees 1..=12, so the name lookup always succeeds.
        let name = month_name(number).unwrap_or_default();
        months.push(Cell::Integer(i64::from(number)));
        if include_order {
            let order = month_order(name).map(i64::from).unwrap_or_default();
            orders.push(Cell::Integer(order));
        }
        names.push(Cell::Text(name.to_string()));
    }

    table.set_column(date_column, dates.into_iter().map(Cell::Date).collect())?;
    table.set_column(MONTH, months)?;
    table.set_column(MONTH_NAME, names)?;
    if include_order {
        table.set_column(MONTH_ORDER, orders)?;
    }
    Ok(table)
}

/// Parse every cell of each named column as a finite `f64`.
///
/// Other columns are untouched and column order is preserved. A headerless
/// table (absent sheet) is returned unchanged.
pub fn convert_to_float(mut table: Table, columns: &[&str]) -> Result<Table, DataError> {
    for &column in columns {
        let idx = match table.locate(column)? {
            Some(idx) => idx,
            None => return Ok(table),
        };

        let mut values = Vec::with_capacity(table.len());
        for (row, cells) in table.rows().iter().enumerate() {
            let value = cell_number(&cells[idx]).ok_or_else(|| NumericParseError {
                column: column.to_string(),
                row,
                value: cells[idx].key(),
            })?;
            values.push(Cell::Number(value));
        }
        table.set_column(column, values)?;
    }
    Ok(table)
}

fn cell_date(cell: &Cell) -> Option<chrono::NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(s) => parse_date(s),
        _ => None,
    }
}

fn cell_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Text(s) => parse_float(s),
        other => other.as_number().filter(|n| n.is_finite()),
    }
}
