//! Year × brand sales matrix for the stacked comparison chart.
//!
//! The view lines every (brand, product) pair up on a shared year axis and
//! then flattens it back to one row per (year, brand):
//!
//! ```text
//! (year, brand, product) sums      →   (year, brand) rows
//! 2020 Acme Tea     100                2020 Acme   130
//! 2020 Acme Coffee   30                2020 Brew    40
//! 2020 Brew Tea      40                2021 Acme    50
//! 2021 Acme Tea      50
//! ```
//!
//! Years a pair never sold in are simply absent, never zero-filled.

use std::collections::{BTreeMap, HashMap};

use crate::models::{ProductYearTotal, SalesMatrixRow, TransactionSet};

/// First-encountered rank of each distinct value.
struct Ranks<'a> {
    order: HashMap<&'a str, usize>,
    names: Vec<&'a str>,
}

impl<'a> Ranks<'a> {
    fn new(values: Vec<&'a str>) -> Self {
        let order = values.iter().enumerate().map(|(i, v)| (*v, i)).collect();
        Self { order, names: values }
    }

    fn rank(&self, value: &str) -> usize {
        self.order.get(value).copied().unwrap_or(usize::MAX)
    }

    fn name(&self, rank: usize) -> &'a str {
        self.names.get(rank).copied().unwrap_or_default()
    }
}

/// Sum `total_price` and `quantity` per (year, brand, product).
///
/// Ordered by year ascending, then brand, then product, each in the order it
/// first appears in the set.
pub fn group_by_year_brand_product(set: &TransactionSet) -> Vec<ProductYearTotal> {
    let brands = Ranks::new(set.brands());
    let products = Ranks::new(set.products());

    let mut groups: BTreeMap<(i32, usize, usize), (f64, u128)> = BTreeMap::new();
    for record in set {
        let key = (
            record.year(),
            brands.rank(&record.brand),
            products.rank(&record.product),
        );
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += record.total_price;
        entry.1 += u128::from(record.quantity);
    }

    groups
        .into_iter()
        .map(|((year, brand, product), (total_price, quantity))| ProductYearTotal {
            year,
            brand: brands.name(brand).to_string(),
            product: products.name(product).to_string(),
            total_price,
            quantity,
        })
        .collect()
}

/// One row per (year, brand) with `total_price` summed over the brand's products.
///
/// Rows come ordered by year ascending, then by the brand's first appearance
/// in the set, so series keep the same stacking order in every year. An empty
/// set gives an empty matrix.
pub fn build_sales_matrix(set: &TransactionSet) -> Vec<SalesMatrixRow> {
    let brands = Ranks::new(set.brands());

    let mut cells: BTreeMap<(i32, usize), f64> = BTreeMap::new();
    for total in group_by_year_brand_product(set) {
        *cells.entry((total.year, brands.rank(&total.brand))).or_insert(0.0) += total.total_price;
    }

    cells
        .into_iter()
        .map(|((year, brand), total_price)| SalesMatrixRow {
            year,
            brand: brands.name(brand).to_string(),
            total_price,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SaleDate, TransactionRecord};

    fn rec(year: i32, brand: &str, product: &str, price: f64) -> TransactionRecord {
        TransactionRecord {
            sale_date: SaleDate::from_year(year).unwrap(),
            brand: brand.to_string(),
            product: product.to_string(),
            quantity: 1,
            total_price: price,
            source_row: 0,
        }
    }

    fn row(year: i32, brand: &str, total_price: f64) -> SalesMatrixRow {
        SalesMatrixRow {
            year,
            brand: brand.to_string(),
            total_price,
        }
    }

    #[test]
    fn test_two_row_scenario() {
        let set = TransactionSet::new(vec![rec(2020, "A", "X", 100.0), rec(2021, "A", "X", 50.0)]);

        assert_eq!(
            build_sales_matrix(&set),
            vec![row(2020, "A", 100.0), row(2021, "A", 50.0)]
        );
    }

    #[test]
    fn test_sums_products_within_brand() {
        let set = TransactionSet::new(vec![
            rec(2020, "Acme", "Tea", 100.0),
            rec(2020, "Acme", "Coffee", 30.0),
            rec(2020, "Brew", "Tea", 40.0),
            rec(2021, "Acme", "Tea", 50.0),
            rec(2020, "Acme", "Tea", 5.0),
        ]);

        assert_eq!(
            build_sales_matrix(&set),
            vec![
                row(2020, "Acme", 135.0),
                row(2020, "Brew", 40.0),
                row(2021, "Acme", 50.0),
            ]
        );
    }

    #[test]
    fn test_brand_order_follows_first_appearance() {
        let set = TransactionSet::new(vec![
            rec(2019, "Zephyr", "Tea", 1.0),
            rec(2020, "Acme", "Tea", 2.0),
            rec(2020, "Zephyr", "Tea", 3.0),
        ]);

        let brands: Vec<(i32, String)> = build_sales_matrix(&set)
            .into_iter()
            .map(|r| (r.year, r.brand))
            .collect();
        assert_eq!(
            brands,
            vec![
                (2019, "Zephyr".to_string()),
                (2020, "Zephyr".to_string()),
                (2020, "Acme".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_years_not_zero_filled() {
        let set = TransactionSet::new(vec![
            rec(2020, "Acme", "Tea", 1.0),
            rec(2022, "Brew", "Tea", 1.0),
        ]);

        let matrix = build_sales_matrix(&set);
        assert_eq!(matrix.len(), 2);
        assert!(matrix.iter().all(|r| r.total_price > 0.0));
    }

    #[test]
    fn test_total_value_preserved() {
        let set = TransactionSet::new(vec![
            rec(2020, "Acme", "Tea", 10.25),
            rec(2021, "Brew", "Coffee", 3.5),
            rec(2021, "Acme", "Coffee", 7.0),
            rec(2023, "Brew", "Tea", 0.75),
        ]);

        let matrix_total: f64 = build_sales_matrix(&set).iter().map(|r| r.total_price).sum();
        assert!((matrix_total - set.total_price()).abs() < 1e-9);
    }

    #[test]
    fn test_grouped_detail_keeps_quantity() {
        let set = TransactionSet::new(vec![
            rec(2020, "Acme", "Tea", 1.0),
            rec(2020, "Acme", "Tea", 2.0),
            rec(2020, "Acme", "Coffee", 4.0),
        ]);

        let groups = group_by_year_brand_product(&set);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].product, "Tea");
        assert_eq!(groups[0].quantity, 2);
        assert_eq!(groups[0].total_price, 3.0);
        assert_eq!(groups[1].product, "Coffee");
    }

    #[test]
    fn test_group_quantity_past_u64_does_not_wrap() {
        let big = TransactionRecord {
            quantity: u64::MAX,
            ..rec(2020, "Acme", "Tea", 1.0)
        };
        let set = TransactionSet::new(vec![big, rec(2020, "Acme", "Tea", 1.0)]);

        let groups = group_by_year_brand_product(&set);
        assert_eq!(groups[0].quantity, u128::from(u64::MAX) + 1);
    }

    #[test]
    fn test_empty_set_gives_empty_matrix() {
        assert!(build_sales_matrix(&TransactionSet::empty()).is_empty());
        assert!(group_by_year_brand_product(&TransactionSet::empty()).is_empty());
    }
}
