//! # Retail Insights - sales transaction analytics
//!
//! Turns a retail transaction export (one row per sale: date, brand,
//! product, quantity, total price) into the three views of a sales
//! dashboard: headline KPIs, a year × brand sales matrix, and per-product
//! smoothed quantity trends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│ Normalizer  │────▶│  Analytics  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (typed)    │     │ KPI/matrix/ │
//! └─────────────┘     └─────────────┘     └─────────────┘     │    trend    │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retail_insights::{analyze_csv, AnalysisOptions};
//!
//! let output = analyze_csv("sales.csv".as_ref(), &AnalysisOptions::default())?;
//! println!("Best year: {}", output.report.kpis.best_year);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Transactions, filters and the view row types
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Normalization, product filter and pipeline
//! - [`analytics`] - KPI, sales matrix and trend builders
//! - [`validation`] - Row shape validation
//! - [`cache`] - Content-hash keyed analysis cache
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Aggregation
pub mod analytics;

// Validation
pub mod validation;

// Caching
pub mod cache;

// Settings
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AnalyticsError, ConfigError, CsvError, MalformedRowError, PipelineError, RowErrorKind,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DateResolution, KpiSummary, ProductFilter, ProductYearTotal, SaleDate, SalesMatrixRow,
    TransactionRecord, TransactionSet, TrendPoint, YearQuantity,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_json, decode_content, detect_delimiter, detect_encoding, parse_bytes_auto,
    parse_csv_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Normalization and filter
// =============================================================================

pub use transform::filter::filter_by_products;
pub use transform::normalizer::{
    normalize, normalize_lenient, ColumnMapping, NormalizeReport, ResolvedColumns, SkippedRow,
};

// =============================================================================
// Re-exports - Analytics
// =============================================================================

pub use analytics::{
    build_sales_matrix, build_trend_series, compute_kpis, group_by_year_brand_product,
    yearly_quantities, DEFAULT_TREND_WINDOW,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate_rows, RowValidationReport, RowValidator};

// =============================================================================
// Re-exports - Cache and settings
// =============================================================================

pub use cache::{AnalysisCache, ContentHash};
pub use config::Settings;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze_bytes, analyze_csv, analyze_dataset, analyze_set, load_bytes, resolve_filter,
    AnalysisOptions, AnalysisReport, CsvInfo, LoadedDataset, PipelineOutput,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, AnalysisResponse, CsvMetadata, ResponseMetadata, ValidationStats};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
