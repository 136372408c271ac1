//! Transformation module.
//!
//! Raw rows to analysis-ready views:
//! - Normalizer: typed, date-ordered transactions
//! - Filter: product selection
//! - Pipeline: orchestration from upload bytes to report

pub mod filter;
pub mod normalizer;
pub mod pipeline;

pub use filter::filter_by_products;
pub use normalizer::*;
pub use pipeline::*;
