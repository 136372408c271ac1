//! Smoothed per-product quantity lines.
//!
//! Each product gets its own trailing window over its own chronological
//! records, so quantities never blend across products.

use std::collections::HashMap;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{TransactionRecord, TransactionSet, TrendPoint};

/// Window used by the dashboard's trend chart.
pub const DEFAULT_TREND_WINDOW: usize = 200;

/// Rolling mean of quantity per product.
///
/// A point is emitted once at least `window` earlier observations of the
/// same product exist; its value is the mean of the `window` most recent
/// observations up to and including it. Products with `window` records or
/// fewer produce nothing.
///
/// Points are grouped by product (first-appearance order) and chronological
/// within a product. The x value is the year of the record's sale date.
pub fn build_trend_series(set: &TransactionSet, window: usize) -> AnalyticsResult<Vec<TrendPoint>> {
    if window == 0 {
        return Err(AnalyticsError::InvalidWindow(window));
    }

    let mut points = Vec::new();
    for (product, series) in series_by_product(set) {
        if series.len() <= window {
            continue;
        }

        let mut sum: u128 = 0;
        for (i, record) in series.iter().enumerate() {
            sum += u128::from(record.quantity);
            if i >= window {
                sum -= u128::from(series[i - window].quantity);
                points.push(TrendPoint {
                    year: record.year(),
                    product: product.to_string(),
                    smoothed_quantity: sum as f64 / window as f64,
                    date: record.sale_date.date,
                });
            }
        }
    }

    Ok(points)
}

fn series_by_product(set: &TransactionSet) -> Vec<(&str, Vec<&TransactionRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut series: Vec<(&str, Vec<&TransactionRecord>)> = Vec::new();

    for record in set {
        let slot = *index.entry(record.product.as_str()).or_insert_with(|| {
            series.push((record.product.as_str(), Vec::new()));
            series.len() - 1
        });
        series[slot].1.push(record);
    }

    series
}
