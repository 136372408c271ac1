//! Raw rows to a date-ordered [`TransactionSet`].
//!
//! ```text
//! Raw rows (JSON objects)            TransactionSet (by sale date)
//! ┌──────────────────────────┐       ┌──────────────────────────────┐
//! │ year: "2021", Qty: "5"   │       │ 2020-01-01 Acme Tea  10 100  │
//! │ year: "2020", Qty: "10"  │  →    │ 2021-01-01 Acme Tea   5  50  │
//! └──────────────────────────┘       └──────────────────────────────┘
//! ```
//!
//! Columns are located through a [`ColumnMapping`]. The strict entry points
//! fail on the first malformed row; [`normalize_lenient`] skips and reports
//! instead. Which policy applies is the caller's choice.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MalformedRowError, NormalizeResult, RowErrorKind};
use crate::models::{SaleDate, TransactionRecord, TransactionSet};

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:\.0+)?$").expect("valid year pattern"));

static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("valid year-month pattern"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

// =============================================================================
// Column Mapping
// =============================================================================

/// Source column names for each transaction field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnMapping {
    pub date: String,
    pub brand: String,
    pub product: String,
    pub quantity: String,
    pub total_price: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: "year".to_string(),
            brand: "Brand".to_string(),
            product: "Product".to_string(),
            quantity: "Quantity".to_string(),
            total_price: "Total Price".to_string(),
        }
    }
}

impl ColumnMapping {
    /// Locate every mapped column in `headers`.
    ///
    /// Exact matches win; otherwise a trimmed, case-insensitive match is used.
    pub fn resolve(&self, headers: &[String]) -> NormalizeResult<ResolvedColumns> {
        Ok(ResolvedColumns {
            date: find_header(headers, &self.date)?,
            brand: find_header(headers, &self.brand)?,
            product: find_header(headers, &self.product)?,
            quantity: find_header(headers, &self.quantity)?,
            total_price: find_header(headers, &self.total_price)?,
        })
    }
}

/// Column names as they actually appear in the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub date: String,
    pub brand: String,
    pub product: String,
    pub quantity: String,
    pub total_price: String,
}

impl ResolvedColumns {
    pub fn all(&self) -> [&str; 5] {
        [
            self.date.as_str(),
            self.brand.as_str(),
            self.product.as_str(),
            self.quantity.as_str(),
            self.total_price.as_str(),
        ]
    }
}

fn find_header(headers: &[String], wanted: &str) -> NormalizeResult<String> {
    if let Some(h) = headers.iter().find(|h| h.as_str() == wanted) {
        return Ok(h.clone());
    }
    let wanted_norm = wanted.trim().to_lowercase();
    headers
        .iter()
        .find(|h| h.trim().to_lowercase() == wanted_norm)
        .cloned()
        .ok_or_else(|| {
            MalformedRowError::header(RowErrorKind::MissingField {
                column: wanted.to_string(),
            })
        })
}

/// Check that every mapped column is present before touching any row.
pub fn validate_headers(headers: &[String], mapping: &ColumnMapping) -> NormalizeResult<()> {
    mapping.resolve(headers).map(|_| ())
}

// =============================================================================
// Normalization
// =============================================================================

/// A row dropped by [`normalize_lenient`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

impl From<MalformedRowError> for SkippedRow {
    fn from(err: MalformedRowError) -> Self {
        Self {
            row: err.row,
            reason: err.kind.to_string(),
        }
    }
}

/// Output of lenient normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub set: TransactionSet,
    pub skipped: Vec<SkippedRow>,
}

/// Normalize raw rows, failing on the first malformed one.
///
/// Column names are taken from the first row's keys. An empty input yields
/// an empty set.
pub fn normalize(rows: &[Value], mapping: &ColumnMapping) -> NormalizeResult<TransactionSet> {
    let Some(columns) = resolve_from_rows(rows, mapping)? else {
        return Ok(TransactionSet::empty());
    };
    normalize_with_columns(rows, &columns)
}

/// Normalize raw rows whose columns were already resolved against a header.
pub fn normalize_with_columns(
    rows: &[Value],
    columns: &ResolvedColumns,
) -> NormalizeResult<TransactionSet> {
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| normalize_row(row, i + 1, columns))
        .collect::<NormalizeResult<Vec<_>>>()?;

    Ok(TransactionSet::new(records))
}

/// Normalize raw rows, skipping malformed ones and reporting each.
///
/// A missing column is still fatal: no row could be read without it.
pub fn normalize_lenient(rows: &[Value], mapping: &ColumnMapping) -> NormalizeResult<NormalizeReport> {
    let Some(columns) = resolve_from_rows(rows, mapping)? else {
        return Ok(NormalizeReport::default());
    };
    Ok(normalize_lenient_with_columns(rows, &columns))
}

/// Lenient counterpart of [`normalize_with_columns`].
pub fn normalize_lenient_with_columns(rows: &[Value], columns: &ResolvedColumns) -> NormalizeReport {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        match normalize_row(row, i + 1, columns) {
            Ok(record) => records.push(record),
            Err(err) => skipped.push(SkippedRow::from(err)),
        }
    }

    NormalizeReport {
        set: TransactionSet::new(records),
        skipped,
    }
}

fn resolve_from_rows(
    rows: &[Value],
    mapping: &ColumnMapping,
) -> NormalizeResult<Option<ResolvedColumns>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let obj = first
        .as_object()
        .ok_or_else(|| MalformedRowError::new(1, RowErrorKind::NotAnObject))?;
    let headers: Vec<String> = obj.keys().cloned().collect();
    mapping.resolve(&headers).map(Some)
}

fn normalize_row(row: &Value, row_no: usize, columns: &ResolvedColumns) -> NormalizeResult<TransactionRecord> {
    let obj = row
        .as_object()
        .ok_or_else(|| MalformedRowError::new(row_no, RowErrorKind::NotAnObject))?;

    let raw_date = field(obj, row_no, &columns.date)?;
    let sale_date = parse_sale_date(raw_date).ok_or_else(|| {
        MalformedRowError::new(row_no, RowErrorKind::InvalidDate { value: value_text(raw_date) })
    })?;

    let brand = value_text(field(obj, row_no, &columns.brand)?);
    let product = value_text(field(obj, row_no, &columns.product)?);

    let raw_quantity = field(obj, row_no, &columns.quantity)?;
    let quantity = parse_quantity(raw_quantity).ok_or_else(|| {
        MalformedRowError::new(row_no, RowErrorKind::InvalidQuantity { value: value_text(raw_quantity) })
    })?;

    let raw_price = field(obj, row_no, &columns.total_price)?;
    let total_price = parse_price(raw_price).ok_or_else(|| {
        MalformedRowError::new(row_no, RowErrorKind::InvalidPrice { value: value_text(raw_price) })
    })?;

    Ok(TransactionRecord {
        sale_date,
        brand,
        product,
        quantity,
        total_price,
        source_row: row_no,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, row_no: usize, column: &str) -> NormalizeResult<&'a Value> {
    match obj.get(column) {
        None | Some(Value::Null) => Err(MalformedRowError::new(
            row_no,
            RowErrorKind::MissingField {
                column: column.to_string(),
            },
        )),
        Some(v) if is_blank(v) => Err(MalformedRowError::new(
            row_no,
            RowErrorKind::EmptyValue {
                column: column.to_string(),
            },
        )),
        Some(v) => Ok(v),
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Field Parsers
// =============================================================================

/// Parse a date-bearing cell.
///
/// Accepts a bare year (number or text), `YYYY-MM`, several day-resolution
/// date layouts, date-times and RFC 3339 timestamps. Time of day is dropped.
pub fn parse_sale_date(value: &Value) -> Option<SaleDate> {
    match value {
        Value::Number(n) => {
            let year = match n.as_i64() {
                Some(y) => y,
                None => {
                    let f = n.as_f64()?;
                    if f.fract() != 0.0 {
                        return None;
                    }
                    f as i64
                }
            };
            year_in_range(year).and_then(SaleDate::from_year)
        }
        Value::String(s) => parse_sale_date_str(s.trim()),
        _ => None,
    }
}

fn parse_sale_date_str(s: &str) -> Option<SaleDate> {
    if let Some(caps) = YEAR_RE.captures(s) {
        let year = caps[1].parse::<i64>().ok()?;
        return year_in_range(year).and_then(SaleDate::from_year);
    }

    if let Some(caps) = YEAR_MONTH_RE.captures(s) {
        let year = caps[1].parse::<i32>().ok()?;
        let month = caps[2].parse::<u32>().ok()?;
        return SaleDate::from_year_month(year, month);
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(SaleDate::from_date(date));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(SaleDate::from_date(dt.date()));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| SaleDate::from_date(dt.date_naive()))
}

fn year_in_range(year: i64) -> Option<i32> {
    (1..=9999).contains(&year).then_some(year as i32)
}

/// Parse a non-negative integer quantity (`"10"`, `"10.0"`, `10`).
pub fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_non_negative)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_non_negative))
        }
        _ => None,
    }
}

fn whole_non_negative(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

/// Parse a non-negative, finite price.
///
/// Thousands separators are tolerated when a decimal point is present
/// (`"1,234.50"`).
pub fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            let cleaned = if s.contains('.') {
                s.replace(',', "")
            } else {
                s.to_string()
            };
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}
