//! Read-only aggregate views over a [`TransactionSet`](crate::models::TransactionSet).
//!
//! - [`kpi`] - Headline metrics (total quantity, distinct products, best year)
//! - [`matrix`] - Year × brand sales totals for stacked comparison
//! - [`trend`] - Per-product rolling mean of quantities
//!
//! Each builder takes the set by reference and returns owned values; none of
//! them depend on each other.

pub mod kpi;
pub mod matrix;
pub mod trend;

pub use kpi::{compute_kpis, yearly_quantities};
pub use matrix::{build_sales_matrix, group_by_year_brand_product};
pub use trend::{build_trend_series, DEFAULT_TREND_WINDOW};
