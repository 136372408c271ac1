//! High-level pipeline API: upload in, dashboard views out.
//!
//! ```text
//! bytes ─▶ parse ─▶ validate ─▶ normalize ─┬─▶ KPIs (full set)
//!                                          └─▶ filter ─┬─▶ sales matrix
//!                                                      └─▶ trend series
//! ```
//!
//! Loading (parse + normalize) and analysis are separate steps so a caller
//! can keep a loaded dataset around and re-run analysis with another
//! product selection or window.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_insights::{analyze_csv, AnalysisOptions};
//! use std::path::Path;
//!
//! let output = analyze_csv(Path::new("sales.csv"), &AnalysisOptions::default())?;
//! println!("Best year: {}", output.report.kpis.best_year);
//! ```

use serde::Serialize;
use std::path::Path;

use crate::analytics::{
    build_sales_matrix, build_trend_series, compute_kpis, yearly_quantities, DEFAULT_TREND_WINDOW,
};
use crate::api::logs::{log_detail, log_info, log_success, log_warning, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    KpiSummary, ProductFilter, SalesMatrixRow, TransactionSet, TrendPoint, YearQuantity,
};
use crate::parser::{parse_bytes_auto, parse_bytes_with_delimiter, parse_csv_file_auto, ParseResult};
use crate::transform::filter::filter_by_products;
use crate::transform::normalizer::{
    normalize_lenient_with_columns, normalize_with_columns, ColumnMapping, SkippedRow,
};
use crate::validation::{validate_rows, RowValidationReport, RowValidator};

/// Options for a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Source column names
    pub columns: ColumnMapping,
    /// Explicit delimiter (auto-detected when `None`)
    pub delimiter: Option<char>,
    /// Products for the matrix and trend views (first two products when `None`)
    pub products: Option<Vec<String>>,
    /// Rolling window for the trend series
    pub trend_window: usize,
    /// Skip malformed rows instead of failing
    pub lenient: bool,
    /// Run schema validation over raw rows and report the result
    pub validate_rows: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            delimiter: None,
            products: None,
            trend_window: DEFAULT_TREND_WINDOW,
            lenient: false,
            validate_rows: true,
        }
    }
}

/// CSV file information
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Parsed and normalized upload.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub csv_info: CsvInfo,
    pub set: TransactionSet,
    /// Rows dropped in lenient mode
    pub skipped: Vec<SkippedRow>,
    pub validation: Option<RowValidationReport>,
}

/// The three dashboard views plus what the caller needs to label them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Computed on the full set
    pub kpis: KpiSummary,
    pub yearly_quantities: Vec<YearQuantity>,
    /// Every product in the set, first-appearance order
    pub products: Vec<String>,
    pub selected_products: ProductFilter,
    /// Selected names that match no record
    pub unknown_products: Vec<String>,
    /// Computed on the filtered set
    pub sales_matrix: Vec<SalesMatrixRow>,
    /// Computed on the filtered set
    pub trend: Vec<TrendPoint>,
    pub trend_window: usize,
    pub record_count: usize,
    pub filtered_count: usize,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: LoadedDataset,
    pub report: AnalysisReport,
}

/// Run the whole pipeline on a CSV file.
pub fn analyze_csv(path: &Path, options: &AnalysisOptions) -> PipelineResult<PipelineOutput> {
    log_info(Stage::Parse, format!("Reading {}", path.display()));
    let parse_result = match options.delimiter {
        Some(d) => parse_bytes_with_delimiter(&std::fs::read(path)?, d)?,
        None => parse_csv_file_auto(path)?,
    };
    let dataset = load_parsed(parse_result, options)?;
    let report = analyze_dataset(&dataset, options)?;
    Ok(PipelineOutput { dataset, report })
}

/// Run the whole pipeline on uploaded bytes.
pub fn analyze_bytes(bytes: &[u8], options: &AnalysisOptions) -> PipelineResult<PipelineOutput> {
    let dataset = load_bytes(bytes, options)?;
    let report = analyze_dataset(&dataset, options)?;
    Ok(PipelineOutput { dataset, report })
}

/// Parse and normalize uploaded bytes.
pub fn load_bytes(bytes: &[u8], options: &AnalysisOptions) -> PipelineResult<LoadedDataset> {
    log_info(Stage::Parse, format!("Decoding {} bytes", bytes.len()));
    let parse_result = match options.delimiter {
        Some(d) => parse_bytes_with_delimiter(bytes, d)?,
        None => parse_bytes_auto(bytes)?,
    };
    load_parsed(parse_result, options)
}

/// Normalize an already-parsed upload.
pub fn load_parsed(parse_result: ParseResult, options: &AnalysisOptions) -> PipelineResult<LoadedDataset> {
    log_success(Stage::Parse, format!("Detected encoding: {}", parse_result.encoding));
    log_success(Stage::Parse, format!("Detected delimiter: '{}'", format_delimiter(parse_result.delimiter)));
    log_success(Stage::Parse, format!("Read {} rows", parse_result.records.len()));

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.headers.clone(),
        row_count: parse_result.records.len(),
    };

    if parse_result.records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let columns = options.columns.resolve(&parse_result.headers)?;
    log_detail(
        Stage::Normalize,
        format!(
            "Columns: date='{}' brand='{}' product='{}' quantity='{}' price='{}'",
            columns.date, columns.brand, columns.product, columns.quantity, columns.total_price
        ),
    );

    let validation = if options.validate_rows {
        let validator = RowValidator::new(&columns)
            .map_err(|message| PipelineError::Validation { row: 0, errors: vec![message] })?;
        let report = validate_rows(&parse_result.records, &validator);
        print_validation_result(&report);
        Some(report)
    } else {
        None
    };

    let (set, skipped) = if options.lenient {
        let report = normalize_lenient_with_columns(&parse_result.records, &columns);
        print_skipped(&report.skipped);
        (report.set, report.skipped)
    } else {
        (normalize_with_columns(&parse_result.records, &columns)?, Vec::new())
    };
    log_success(Stage::Normalize, format!("{} transactions", set.len()));

    Ok(LoadedDataset {
        csv_info,
        set,
        skipped,
        validation,
    })
}

/// The product selection a run will use.
pub fn resolve_filter(set: &TransactionSet, options: &AnalysisOptions) -> ProductFilter {
    match &options.products {
        Some(products) => ProductFilter::new(products.iter().cloned()),
        None => ProductFilter::default_for(set),
    }
}

/// Compute KPIs on the full set and matrix + trend on the selected products.
pub fn analyze_dataset(dataset: &LoadedDataset, options: &AnalysisOptions) -> PipelineResult<AnalysisReport> {
    analyze_set(&dataset.set, &resolve_filter(&dataset.set, options), options.trend_window)
}

/// Analysis over a normalized set with an explicit filter and window.
pub fn analyze_set(
    set: &TransactionSet,
    filter: &ProductFilter,
    trend_window: usize,
) -> PipelineResult<AnalysisReport> {
    let kpis = compute_kpis(set)?;
    log_success(
        Stage::Kpi,
        format!(
            "Total quantity {}, {} products, best year {}",
            kpis.total_quantity, kpis.distinct_product_count, kpis.best_year
        ),
    );

    let unknown_products = filter.unknown_products(set);
    if !unknown_products.is_empty() {
        log_warning(
            Stage::Filter,
            format!("Unknown products in selection: {}", unknown_products.join(", ")),
        );
    }
    let filtered = filter_by_products(set, filter);
    log_success(
        Stage::Filter,
        format!(
            "{} of {} transactions selected ({})",
            filtered.len(),
            set.len(),
            filter.names().collect::<Vec<_>>().join(", ")
        ),
    );

    let sales_matrix = build_sales_matrix(&filtered);
    log_success(Stage::Matrix, format!("{} year/brand rows", sales_matrix.len()));

    let trend = build_trend_series(&filtered, trend_window)?;
    if trend.is_empty() && !filtered.is_empty() {
        log_warning(
            Stage::Trend,
            format!("No product has more than {} transactions; trend is empty", trend_window),
        );
    } else {
        log_success(Stage::Trend, format!("{} smoothed points (window {})", trend.len(), trend_window));
    }

    Ok(AnalysisReport {
        kpis,
        yearly_quantities: yearly_quantities(set),
        products: set.products().into_iter().map(String::from).collect(),
        selected_products: filter.clone(),
        unknown_products,
        sales_matrix,
        trend,
        trend_window,
        record_count: set.len(),
        filtered_count: filtered.len(),
    })
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

fn print_validation_result(report: &RowValidationReport) {
    if report.invalid == 0 {
        log_success(Stage::Validate, format!("All {} rows well-formed", report.valid));
        return;
    }
    log_warning(
        Stage::Validate,
        format!("{} rows well-formed, {} not", report.valid, report.invalid),
    );
    for (row, errors) in report.errors.iter().take(3) {
        log_detail(Stage::Validate, format!("row {}: {}", row, errors.join("; ")));
    }
}

fn print_skipped(skipped: &[SkippedRow]) {
    if skipped.is_empty() {
        return;
    }
    log_warning(Stage::Normalize, format!("{} rows skipped", skipped.len()));
    for skip in skipped.iter().take(5) {
        log_detail(Stage::Normalize, format!("row {}: {}", skip.row, skip.reason));
    }
    if skipped.len() > 5 {
        log_detail(Stage::Normalize, format!("... +{}", skipped.len() - 5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalyticsError, RowErrorKind};

    const TWO_ROWS: &str = "year,Brand,Product,Quantity,Total Price\n\
                            2020,A,X,10,100\n\
                            2021,A,X,5,50\n";

    #[test]
    fn test_default_options() {
        let opts = AnalysisOptions::default();
        assert_eq!(opts.trend_window, 200);
        assert!(!opts.lenient);
        assert!(opts.products.is_none());
    }

    #[test]
    fn test_two_row_scenario() {
        let output = analyze_bytes(TWO_ROWS.as_bytes(), &AnalysisOptions::default()).unwrap();
        let report = output.report;

        assert_eq!(
            report.kpis,
            KpiSummary {
                total_quantity: 15,
                distinct_product_count: 1,
                best_year: 2020
            }
        );
        assert_eq!(
            report.sales_matrix,
            vec![
                SalesMatrixRow { year: 2020, brand: "A".into(), total_price: 100.0 },
                SalesMatrixRow { year: 2021, brand: "A".into(), total_price: 50.0 },
            ]
        );
        assert!(report.trend.is_empty());
        assert_eq!(output.dataset.csv_info.row_count, 2);
        assert_eq!(output.dataset.validation.unwrap().invalid, 0);
    }

    #[test]
    fn test_kpis_use_full_set_but_views_use_selection() {
        let csv = "year,Brand,Product,Quantity,Total Price\n\
                   2020,A,X,1,10\n\
                   2020,B,Y,2,20\n\
                   2021,C,Z,9,90\n";
        let options = AnalysisOptions {
            products: Some(vec!["Z".into(), "Nope".into()]),
            trend_window: 1,
            ..AnalysisOptions::default()
        };

        let report = analyze_bytes(csv.as_bytes(), &options).unwrap().report;

        assert_eq!(report.kpis.total_quantity, 12);
        assert_eq!(report.kpis.best_year, 2021);
        assert_eq!(report.filtered_count, 1);
        assert_eq!(report.unknown_products, vec!["Nope".to_string()]);
        assert_eq!(report.sales_matrix.len(), 1);
        assert_eq!(report.sales_matrix[0].brand, "C");
        assert_eq!(report.products, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_default_selection_is_first_two_products() {
        let csv = "year,Brand,Product,Quantity,Total Price\n\
                   2022,A,Late,1,10\n\
                   2020,A,Early,1,10\n\
                   2021,B,Middle,1,10\n";

        let report = analyze_bytes(csv.as_bytes(), &AnalysisOptions::default()).unwrap().report;
        let selected: Vec<&str> = report.selected_products.names().collect();
        assert_eq!(selected, vec!["Early", "Middle"]);
        assert_eq!(report.filtered_count, 2);
    }

    #[test]
    fn test_strict_mode_fails_on_bad_row() {
        let csv = format!("{}bad,A,X,1,1\n", TWO_ROWS);
        let err = analyze_bytes(csv.as_bytes(), &AnalysisOptions::default()).unwrap_err();

        match err {
            PipelineError::MalformedRow(e) => {
                assert_eq!(e.row, 3);
                assert!(matches!(e.kind, RowErrorKind::InvalidDate { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lenient_mode_reports_skipped() {
        let csv = format!("{}bad,A,X,1,1\n", TWO_ROWS);
        let options = AnalysisOptions {
            lenient: true,
            ..AnalysisOptions::default()
        };

        let output = analyze_bytes(csv.as_bytes(), &options).unwrap();
        assert_eq!(output.dataset.skipped.len(), 1);
        assert_eq!(output.report.record_count, 2);
    }

    #[test]
    fn test_all_rows_skipped_is_empty_dataset() {
        let csv = "year,Brand,Product,Quantity,Total Price\nbad,A,X,1,1\n";
        let options = AnalysisOptions {
            lenient: true,
            ..AnalysisOptions::default()
        };

        let err = analyze_bytes(csv.as_bytes(), &options).unwrap_err();
        assert!(matches!(err, PipelineError::Analytics(AnalyticsError::EmptyDataset)));
    }

    #[test]
    fn test_header_only_file_is_empty_input() {
        let csv = "year,Brand,Product,Quantity,Total Price\n";
        let err = analyze_bytes(csv.as_bytes(), &AnalysisOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "year,Brand,Product,Quantity\n2020,A,X,1\n";
        let err = analyze_bytes(csv.as_bytes(), &AnalysisOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Total Price"));
    }

    #[test]
    fn test_analyze_csv_uses_explicit_delimiter() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_ROWS.replace(',', ";").as_bytes()).unwrap();

        let semicolon = AnalysisOptions {
            delimiter: Some(';'),
            ..AnalysisOptions::default()
        };
        let output = analyze_csv(file.path(), &semicolon).unwrap();
        assert_eq!(output.dataset.csv_info.delimiter, ';');
        assert_eq!(output.report.kpis.total_quantity, 15);

        let comma = AnalysisOptions {
            delimiter: Some(','),
            ..AnalysisOptions::default()
        };
        let err = analyze_csv(file.path(), &comma).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow(ref e) if e.row == 0));
    }

    #[test]
    fn test_empty_selection_gives_empty_views() {
        let set = load_bytes(TWO_ROWS.as_bytes(), &AnalysisOptions::default()).unwrap().set;

        let report = analyze_set(&set, &ProductFilter::default(), 2).unwrap();
        assert!(report.sales_matrix.is_empty());
        assert!(report.trend.is_empty());
        assert_eq!(report.kpis.total_quantity, 15);
    }
}
