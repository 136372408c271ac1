//! Narrow a transaction set to the selected products.

use crate::models::{ProductFilter, TransactionSet};

/// Records whose product is in `filter`, in their original order.
///
/// An empty filter selects nothing. Names that match no record are not an
/// error; they just contribute no rows (see [`ProductFilter::unknown_products`]
/// to report them).
pub fn filter_by_products(set: &TransactionSet, filter: &ProductFilter) -> TransactionSet {
    if filter.is_empty() {
        return TransactionSet::empty();
    }

    let records = set
        .iter()
        .filter(|r| filter.contains(&r.product))
        .cloned()
        .collect();

    TransactionSet::from_ordered(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SaleDate, TransactionRecord};

    fn sample() -> TransactionSet {
        let rec = |year: i32, product: &str, row: usize| TransactionRecord {
            sale_date: SaleDate::from_year(year).unwrap(),
            brand: "Acme".to_string(),
            product: product.to_string(),
            quantity: row as u64,
            total_price: 10.0,
            source_row: row,
        };
        TransactionSet::new(vec![
            rec(2020, "Tea", 1),
            rec(2020, "Coffee", 2),
            rec(2021, "Tea", 3),
            rec(2022, "Cocoa", 4),
        ])
    }

    #[test]
    fn test_keeps_matching_in_order() {
        let set = sample();
        let filtered = filter_by_products(&set, &ProductFilter::new(["Tea", "Cocoa"]));

        let rows: Vec<usize> = filtered.iter().map(|r| r.source_row).collect();
        assert_eq!(rows, vec![1, 3, 4]);
    }

    #[test]
    fn test_empty_filter_gives_empty_set() {
        let set = sample();
        let filtered = filter_by_products(&set, &ProductFilter::default());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_all_products_is_identity() {
        let set = sample();
        let all = ProductFilter::new(set.products());
        assert_eq!(filter_by_products(&set, &all), set);
    }

    #[test]
    fn test_unknown_product_gives_empty_set() {
        let set = sample();
        let filtered = filter_by_products(&set, &ProductFilter::new(["Chai"]));
        assert!(filtered.is_empty());
    }
}
