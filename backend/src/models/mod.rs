//! Domain models for the retail insights pipeline.
//!
//! - [`SaleDate`] - Calendar date plus the resolution the source gave it at
//! - [`TransactionRecord`] - One normalized sales event
//! - [`TransactionSet`] - Immutable, date-ordered collection of records
//! - [`ProductFilter`] - Caller-selected subset of products
//! - [`KpiSummary`], [`SalesMatrixRow`], [`ProductYearTotal`], [`TrendPoint`] - Derived views

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// =============================================================================
// Sale Date
// =============================================================================

/// How precise the source date value was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateResolution {
    Year,
    Month,
    Day,
}

/// Date of a sale.
///
/// Year-only sources land on January 1st with [`DateResolution::Year`];
/// finer resolution is kept when the source has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleDate {
    pub date: NaiveDate,
    pub resolution: DateResolution,
}

impl SaleDate {
    pub fn new(date: NaiveDate, resolution: DateResolution) -> Self {
        Self { date, resolution }
    }

    /// January 1st of `year`, year resolution.
    pub fn from_year(year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, 1, 1).map(|d| Self::new(d, DateResolution::Year))
    }

    /// First day of the month, month resolution.
    pub fn from_year_month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|d| Self::new(d, DateResolution::Month))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date, DateResolution::Day)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

impl PartialOrd for SaleDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SaleDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.date
            .cmp(&other.date)
            .then(self.resolution.cmp(&other.resolution))
    }
}

// =============================================================================
// Transaction Record
// =============================================================================

/// One normalized sales event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub sale_date: SaleDate,
    pub brand: String,
    pub product: String,
    pub quantity: u64,
    pub total_price: f64,
    /// 1-based data row index in the upload.
    pub source_row: usize,
}

impl TransactionRecord {
    pub fn year(&self) -> i32 {
        self.sale_date.year()
    }
}

// =============================================================================
// Transaction Set
// =============================================================================

/// Records ordered by sale date ascending.
///
/// Equal dates keep their input order. Once built the set is never mutated;
/// every stage derives new values from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransactionSet {
    records: Vec<TransactionRecord>,
}

impl TransactionSet {
    /// Build a set, ordering records by date (stable).
    pub fn new(mut records: Vec<TransactionRecord>) -> Self {
        records.sort_by(|a, b| a.sale_date.cmp(&b.sale_date));
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap records that are already date ordered (subsequences of a set).
    pub(crate) fn from_ordered(records: Vec<TransactionRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].sale_date <= w[1].sale_date));
        Self { records }
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct products in first-encountered order.
    pub fn products(&self) -> Vec<&str> {
        first_encountered(self.records.iter().map(|r| r.product.as_str()))
    }

    /// Distinct brands in first-encountered order.
    pub fn brands(&self) -> Vec<&str> {
        first_encountered(self.records.iter().map(|r| r.brand.as_str()))
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(TransactionRecord::year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sum of `total_price` over every record.
    pub fn total_price(&self) -> f64 {
        self.records.iter().map(|r| r.total_price).sum()
    }
}

impl<'a> IntoIterator for &'a TransactionSet {
    type Item = &'a TransactionRecord;
    type IntoIter = std::slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn first_encountered<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(*v)).collect()
}

// =============================================================================
// Product Filter
// =============================================================================

/// Products selected for the matrix and trend views.
///
/// Membership is all that matters, so names are kept as a sorted set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductFilter {
    products: BTreeSet<String>,
}

/// Number of products selected when the caller does not choose.
pub const DEFAULT_SELECTED_PRODUCTS: usize = 2;

impl ProductFilter {
    pub fn new<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            products: products.into_iter().map(Into::into).collect(),
        }
    }

    /// The first two distinct products encountered in `set`.
    pub fn default_for(set: &TransactionSet) -> Self {
        Self::new(
            set.products()
                .into_iter()
                .take(DEFAULT_SELECTED_PRODUCTS),
        )
    }

    pub fn contains(&self, product: &str) -> bool {
        self.products.contains(product)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(String::as_str)
    }

    /// Names in the filter that no record of `set` carries.
    pub fn unknown_products(&self, set: &TransactionSet) -> Vec<String> {
        let known: HashSet<&str> = set.iter().map(|r| r.product.as_str()).collect();
        self.products
            .iter()
            .filter(|p| !known.contains(p.as_str()))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Derived Views
// =============================================================================

/// Headline metrics for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    /// Summed in `u128` so totals never wrap, whatever the record quantities.
    pub total_quantity: u128,
    pub distinct_product_count: usize,
    pub best_year: i32,
}

/// Quantity sold in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearQuantity {
    pub year: i32,
    pub quantity: u128,
}

/// Sums for one (year, brand, product) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductYearTotal {
    pub year: i32,
    pub brand: String,
    pub product: String,
    pub total_price: f64,
    pub quantity: u128,
}

/// One bar segment of the stacked sales chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesMatrixRow {
    pub year: i32,
    pub brand: String,
    pub total_price: f64,
}

/// One point of a product's smoothed quantity line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub year: i32,
    pub product: String,
    pub smoothed_quantity: f64,
    /// Full sale date of the point, for consumers that plot finer than a year.
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, product: &str, row: usize) -> TransactionRecord {
        TransactionRecord {
            sale_date: SaleDate::from_year(year).unwrap(),
            brand: "Acme".to_string(),
            product: product.to_string(),
            quantity: 1,
            total_price: 1.0,
            source_row: row,
        }
    }

    #[test]
    fn test_set_is_sorted_and_stable() {
        let set = TransactionSet::new(vec![
            record(2022, "B", 1),
            record(2020, "A", 2),
            record(2022, "C", 3),
            record(2020, "D", 4),
        ]);

        let rows: Vec<usize> = set.iter().map(|r| r.source_row).collect();
        assert_eq!(rows, vec![2, 4, 1, 3]);
        assert_eq!(set.years(), vec![2020, 2022]);
    }

    #[test]
    fn test_products_first_encountered() {
        let set = TransactionSet::new(vec![
            record(2021, "Y", 1),
            record(2020, "X", 2),
            record(2022, "X", 3),
            record(2023, "Z", 4),
        ]);
        assert_eq!(set.products(), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_default_filter_takes_first_two() {
        let set = TransactionSet::new(vec![
            record(2020, "Tea", 1),
            record(2021, "Coffee", 2),
            record(2022, "Cocoa", 3),
        ]);
        let filter = ProductFilter::default_for(&set);
        assert_eq!(filter.len(), 2);
        assert!(filter.contains("Tea"));
        assert!(filter.contains("Coffee"));
        assert!(!filter.contains("Cocoa"));
    }

    #[test]
    fn test_unknown_products() {
        let set = TransactionSet::new(vec![record(2020, "Tea", 1)]);
        let filter = ProductFilter::new(["Tea", "Taa"]);
        assert_eq!(filter.unknown_products(&set), vec!["Taa".to_string()]);
    }

    #[test]
    fn test_finer_resolution_orders_after_same_day_year() {
        let year = SaleDate::from_year(2020).unwrap();
        let day = SaleDate::from_date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert!(year < day);
        assert_eq!(day.year(), 2020);
    }
}
