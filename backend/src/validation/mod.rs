//! JSON Schema validation of raw upload rows.
//!
//! The schema is generated from the resolved column names, so it follows
//! whatever [`ColumnMapping`](crate::transform::normalizer::ColumnMapping)
//! the caller used. It checks shape only (required columns, value types,
//! obviously-bad text); semantic parsing of dates and numbers stays in the
//! normalizer.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use retail_insights::{ColumnMapping, RowValidator};
//!
//! let headers = vec!["year".into(), "Brand".into(), "Product".into(),
//!                    "Quantity".into(), "Total Price".into()];
//! let columns = ColumnMapping::default().resolve(&headers)?;
//! let validator = RowValidator::new(&columns)?;
//!
//! let row = json!({ "year": "2020", "Brand": "A", "Product": "X",
//!                   "Quantity": "10", "Total Price": "100" });
//! assert!(validator.validate(&row).is_ok());
//! ```

use serde::Serialize;
use serde_json::{json, Value};

use crate::transform::normalizer::ResolvedColumns;

const INTEGER_TEXT: &str = r"^\s*\d+(\.0+)?\s*$";
const NUMBER_TEXT: &str = r"^\s*[0-9][0-9,]*(\.[0-9]+)?\s*$";

/// Build the draft-7 schema for one raw row.
pub fn row_schema(columns: &ResolvedColumns) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        columns.date.clone(),
        json!({ "type": ["string", "integer", "number"], "minLength": 4 }),
    );
    properties.insert(
        columns.brand.clone(),
        json!({ "type": ["string", "number"], "pattern": r"\S" }),
    );
    properties.insert(
        columns.product.clone(),
        json!({ "type": ["string", "number"], "pattern": r"\S" }),
    );
    properties.insert(
        columns.quantity.clone(),
        json!({
            "anyOf": [
                { "type": "integer", "minimum": 0 },
                { "type": "string", "pattern": INTEGER_TEXT }
            ]
        }),
    );
    properties.insert(
        columns.total_price.clone(),
        json!({
            "anyOf": [
                { "type": "number", "minimum": 0 },
                { "type": "string", "pattern": NUMBER_TEXT }
            ]
        }),
    );

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": columns.all(),
        "properties": properties
    })
}

/// Compiled row validator.
pub struct RowValidator {
    validator: jsonschema::Validator,
}

impl RowValidator {
    pub fn new(columns: &ResolvedColumns) -> Result<Self, String> {
        let schema = row_schema(columns);
        let validator = jsonschema::draft7::new(&schema)
            .map_err(|e| format!("Invalid row schema: {}", e))?;
        Ok(Self { validator })
    }

    /// `Ok(())` if the row has the expected shape, otherwise every violation.
    pub fn validate(&self, row: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self.validator.iter_errors(row).map(|e| e.to_string()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Outcome of validating every row of an upload.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowValidationReport {
    pub valid: usize,
    pub invalid: usize,
    /// (1-based row, messages), capped at [`MAX_REPORTED_ROWS`] rows.
    pub errors: Vec<(usize, Vec<String>)>,
}

/// Maximum number of failing rows whose messages are kept.
pub const MAX_REPORTED_ROWS: usize = 10;

/// Validate every row and collect statistics.
pub fn validate_rows(rows: &[Value], validator: &RowValidator) -> RowValidationReport {
    let mut report = RowValidationReport::default();

    for (i, row) in rows.iter().enumerate() {
        match validator.validate(row) {
            Ok(()) => report.valid += 1,
            Err(errs) => {
                report.invalid += 1;
                if report.errors.len() < MAX_REPORTED_ROWS {
                    report.errors.push((i + 1, errs));
                }
            }
        }
    }

    report
}
