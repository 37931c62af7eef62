//! Transformation module.
//!
//! This module turns raw sheet tables into typed ledger tables:
//! - Dates / Numeric: single-cell parsers
//! - Columns: `extract_month` and `convert_to_float`
//! - Pipeline: one refresh cycle over a raw workbook

pub mod columns;
pub mod dates;
pub mod numeric;
pub mod pipeline;

pub use columns::{convert_to_float, extract_month};
pub use dates::parse_date;
pub use numeric::parse_float;
pub use pipeline::*;
