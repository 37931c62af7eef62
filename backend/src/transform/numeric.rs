//! Numeric parsing for sheet cells.

use once_cell::sync::Lazy;
use regex::Regex;

/// Thousands-grouped decimal as the Sheets API formats it, e.g. `-1,200.50`.
static GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("static regex"));

/// Parse a cell as a finite `f64`.
///
/// Accepts plain decimal numerals with an optional sign and exponent, and
/// well-formed thousands grouping. Empty text, garbage, `NaN` and infinities
/// are rejected.
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let value: f64 = if GROUPED.is_match(s) {
        s.replace(',', "").parse().ok()?
    } else {
        s.parse().ok()?
    };

    value.is_finite().then_some(value)
}
