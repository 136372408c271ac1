//! Headline metrics shown as dashboard widgets.

use std::collections::{BTreeMap, HashSet};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{KpiSummary, TransactionSet, YearQuantity};

/// Quantity sold per calendar year, ascending by year.
pub fn yearly_quantities(set: &TransactionSet) -> Vec<YearQuantity> {
    let mut per_year: BTreeMap<i32, u128> = BTreeMap::new();
    for record in set {
        *per_year.entry(record.year()).or_default() += u128::from(record.quantity);
    }

    per_year
        .into_iter()
        .map(|(year, quantity)| YearQuantity { year, quantity })
        .collect()
}

/// Total quantity, number of distinct products and best-selling year.
///
/// The best year is the one with the largest summed quantity; on a tie the
/// earliest year wins. An empty set has no best year and is rejected.
pub fn compute_kpis(set: &TransactionSet) -> AnalyticsResult<KpiSummary> {
    if set.is_empty() {
        return Err(AnalyticsError::EmptyDataset);
    }

    let total_quantity = set.iter().map(|r| u128::from(r.quantity)).sum();
    let distinct_product_count = set
        .iter()
        .map(|r| r.product.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut best: Option<YearQuantity> = None;
    for entry in yearly_quantities(set) {
        // strict comparison keeps the earliest year on ties
        if best.as_ref().map_or(true, |b| entry.quantity > b.quantity) {
            best = Some(entry);
        }
    }
    let best_year = best.map(|b| b.year).ok_or(AnalyticsError::EmptyDataset)?;

    Ok(KpiSummary {
        total_quantity,
        distinct_product_count,
        best_year,
    })
}
