//! JSON Schema validation for rows appended to the ledger sheets.
//!
//! A row is a JSON object keyed by column name. Before it is appended it is
//! checked against the sheet's schema, its `Date` must parse the same way the
//! dashboard will parse it, and its columns must all exist in the live sheet
//! header. Values are then laid out in header order.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from `schemas/` directory:
//! - `members.json`
//! - `monthly-collection.json`
//! - `disbursement.json`
//! - `administrative-costs.json`
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use savings_metrics::models::SheetKind;
//! use savings_metrics::validation::validate_row;
//!
//! let row = json!({ "Date": "2024-03-01", "AmountSpent": 25 });
//! assert!(validate_row(SheetKind::AdministrativeCosts, &row).is_ok());
//!
//! let row = json!({ "Date": "2024-03-01" });
//! assert!(validate_row(SheetKind::AdministrativeCosts, &row).is_err());
//! ```

use serde_json::Value;

use crate::error::ValidationError;
use crate::models::columns::DATE;
use crate::models::SheetKind;
use crate::transform::parse_date;

/// Raw schema text for a sheet kind.
pub fn schema_source(kind: SheetKind) -> &'static str {
    match kind {
        SheetKind::Members => include_str!("../../schemas/members.json"),
        SheetKind::MonthlyCollection => include_str!("../../schemas/monthly-collection.json"),
        SheetKind::Disbursement => include_str!("../../schemas/disbursement.json"),
        SheetKind::AdministrativeCosts => include_str!("../../schemas/administrative-costs.json"),
    }
}

/// Parsed schema for a sheet kind.
pub fn schema_for(kind: SheetKind) -> Result<Value, ValidationError> {
    serde_json::from_str(schema_source(kind)).map_err(|e| ValidationError::Schema(e.to_string()))
}

/// Validate a JSON value against a JSON schema (draft 7).
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error if invalid
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check: true/false only.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one row for a sheet kind.
pub fn validate_row(kind: SheetKind, row: &Value) -> Result<(), ValidationError> {
    let schema = schema_for(kind)?;
    let mut errors = validate(&schema, row).err().unwrap_or_default();

    if let Some(date) = row.get(DATE).and_then(Value::as_str) {
        if !date.trim().is_empty() && parse_date(date).is_none() {
            errors.push(format!("\"{}\" is not a recognised date", date));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            sheet: kind.slug().to_string(),
            errors,
        })
    }
}

/// Lay out a row's values in `header` order.
///
/// Columns missing from the row become empty cells; a column the header
/// does not have is an error.
pub fn order_row(sheet: &str, row: &Value, header: &[String]) -> Result<Vec<String>, ValidationError> {
    if header.is_empty() {
        return Err(ValidationError::NoHeader(sheet.to_string()));
    }
    let object = row.as_object().ok_or_else(|| ValidationError::Invalid {
        sheet: sheet.to_string(),
        errors: vec!["row must be a JSON object".to_string()],
    })?;

    if let Some(unknown) = object.keys().find(|k| !header.contains(k)) {
        return Err(ValidationError::UnknownColumn {
            sheet: sheet.to_string(),
            column: unknown.clone(),
        });
    }

    Ok(header
        .iter()
        .map(|column| object.get(column).map(cell_text).unwrap_or_default())
        .collect())
}

/// Validate a row and lay it out for appending to `sheet`.
pub fn prepare_append(
    kind: SheetKind,
    sheet: &str,
    row: &Value,
    header: &[String],
) -> Result<Vec<String>, ValidationError> {
    validate_row(kind, row)?;
    order_row(sheet, row, header)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_embedded_schemas_compile() {
        for kind in SheetKind::ALL {
            let schema = schema_for(kind).unwrap();
            assert!(jsonschema::draft7::new(&schema).is_ok(), "{:?}", kind);
        }
    }

    #[test]
    fn test_valid_collection_row() {
        let row = json!({
            "MemberID": "M1",
            "Date": "2024-02-01",
            "AmountContributed": "1,000",
            "CommitmentFeePaid": 50,
            "AdminFeePaid": 0
        });
        assert!(validate_row(SheetKind::MonthlyCollection, &row).is_ok());
    }

    #[test]
    fn test_missing_required_column() {
        let row = json!({ "MemberID": "M1", "Date": "2024-02-01" });
        let err = validate_row(SheetKind::MonthlyCollection, &row).unwrap_err();
        match err {
            ValidationError::Invalid { sheet, errors } => {
                assert_eq!(sheet, "monthly-collection");
                assert!(errors.iter().any(|e| e.contains("AmountContributed")));
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_garbage_amounts() {
        let row = json!({ "MemberID": "M1", "Date": "2024-02-01", "AmountDisbursed": -5 });
        assert!(validate_row(SheetKind::Disbursement, &row).is_err());

        let row = json!({ "MemberID": "M1", "Date": "2024-02-01", "AmountDisbursed": "lots" });
        assert!(validate_row(SheetKind::Disbursement, &row).is_err());
    }

    #[test]
    fn test_unparseable_date() {
        let row = json!({ "Date": "next tuesday", "AmountSpent": 10 });
        let err = validate_row(SheetKind::AdministrativeCosts, &row).unwrap_err();
        assert!(err.to_string().contains("next tuesday"));
    }

    #[test]
    fn test_member_id_without_whitespace() {
        let schema = schema_for(SheetKind::Members).unwrap();
        assert!(is_valid(&schema, &json!({ "MemberID": "M7", "Name": "Grace" })));
        assert!(!is_valid(&schema, &json!({ "MemberID": "M 7", "Name": "Grace" })));
        assert!(!is_valid(&schema, &json!({ "MemberID": "M7", "Name": "" })));
    }

    #[test]
    fn test_order_row_follows_header() {
        let row = json!({ "AmountSpent": 12.5, "Date": "2024-03-01" });
        let values = order_row(
            "04_AdministrativeCosts",
            &row,
            &header(&["Date", "Description", "AmountSpent"]),
        )
        .unwrap();
        assert_eq!(values, vec!["2024-03-01", "", "12.5"]);
    }

    #[test]
    fn test_order_row_rejects_unknown_column() {
        let row = json!({ "Date": "2024-03-01", "Amount": 1 });
        let err = order_row("04_AdministrativeCosts", &row, &header(&["Date", "AmountSpent"]))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnknownColumn { ref column, .. } if column == "Amount"
        ));
    }

    #[test]
    fn test_order_row_requires_header() {
        let err = order_row("01_Members", &json!({}), &[]).unwrap_err();
        assert!(matches!(err, ValidationError::NoHeader(_)));
    }

    #[test]
    fn test_prepare_append() {
        let row = json!({ "MemberID": "M3", "Name": "Grace" });
        let values = prepare_append(
            SheetKind::Members,
            "01_Members",
            &row,
            &header(&["MemberID", "Name", "Phone"]),
        )
        .unwrap();
        assert_eq!(values, vec!["M3", "Grace", ""]);
    }
}
