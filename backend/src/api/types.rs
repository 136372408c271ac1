//! REST API types for the dashboard.
//!
//! One upload produces one [`AnalysisResponse`] carrying the three views
//! (KPI cards, sales matrix, trend series) ready to chart, plus metadata
//! about how the file was read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::ContentHash;
use crate::models::{KpiSummary, SalesMatrixRow, TrendPoint, YearQuantity};
use crate::transform::normalizer::SkippedRow;
use crate::transform::pipeline::{AnalysisReport, LoadedDataset};

/// Response sent to the dashboard after an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning"
    pub status: String,

    /// SHA-256 of the upload, usable with `DELETE /api/cache/{hash}`
    pub content_hash: String,

    pub kpis: KpiSummary,
    pub yearly_quantities: Vec<YearQuantity>,
    pub sales_matrix: Vec<SalesMatrixRow>,
    pub trend: Vec<TrendPoint>,

    pub metadata: ResponseMetadata,
}

/// How the views were produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Every product in the upload, for the selection widget
    pub products: Vec<String>,
    pub selected_products: Vec<String>,
    pub unknown_products: Vec<String>,
    pub trend_window: usize,
    pub record_count: usize,
    pub filtered_count: usize,

    /// Whether the report came from the cache
    pub cached: bool,

    pub csv_info: CsvMetadata,
    pub validation: ValidationStats,

    /// Rows dropped in lenient mode
    pub skipped: Vec<SkippedRow>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Row validation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<ValidationError>,
}

/// Schema violations of one row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub row: usize,
    pub errors: Vec<String>,
}

impl AnalysisResponse {
    pub fn new(hash: &ContentHash, dataset: &LoadedDataset, report: &AnalysisReport, cached: bool) -> Self {
        let validation = dataset
            .validation
            .as_ref()
            .map(|v| ValidationStats {
                valid: v.valid,
                invalid: v.invalid,
                errors: v
                    .errors
                    .iter()
                    .map(|(row, errs)| ValidationError {
                        row: *row,
                        errors: errs.clone(),
                    })
                    .collect(),
            })
            .unwrap_or_default();

        let clean = validation.invalid == 0
            && dataset.skipped.is_empty()
            && report.unknown_products.is_empty();

        AnalysisResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if clean { "ready" } else { "warning" }.to_string(),
            content_hash: hash.to_string(),
            kpis: report.kpis.clone(),
            yearly_quantities: report.yearly_quantities.clone(),
            sales_matrix: report.sales_matrix.clone(),
            trend: report.trend.clone(),
            metadata: ResponseMetadata {
                products: report.products.clone(),
                selected_products: report.selected_products.names().map(String::from).collect(),
                unknown_products: report.unknown_products.clone(),
                trend_window: report.trend_window,
                record_count: report.record_count,
                filtered_count: report.filtered_count,
                cached,
                csv_info: CsvMetadata {
                    encoding: dataset.csv_info.encoding.clone(),
                    delimiter: dataset.csv_info.delimiter.to_string(),
                    row_count: dataset.csv_info.row_count,
                    columns: dataset.csv_info.headers.clone(),
                },
                validation,
                skipped: dataset.skipped.clone(),
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "salesMatrix": [],
        "trend": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::pipeline::{analyze_dataset, load_bytes, AnalysisOptions};

    fn response(csv: &str, options: &AnalysisOptions) -> AnalysisResponse {
        let dataset = load_bytes(csv.as_bytes(), options).unwrap();
        let report = analyze_dataset(&dataset, options).unwrap();
        AnalysisResponse::new(&ContentHash::of(csv.as_bytes()), &dataset, &report, false)
    }

    #[test]
    fn test_clean_upload_is_ready() {
        let csv = "year,Brand,Product,Quantity,Total Price\n2020,A,X,10,100\n2021,A,X,5,50\n";
        let resp = response(csv, &AnalysisOptions::default());

        assert_eq!(resp.status, "ready");
        assert_eq!(resp.content_hash.len(), 64);
        assert_eq!(resp.metadata.csv_info.delimiter, ",");
        assert_eq!(resp.metadata.selected_products, vec!["X".to_string()]);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["kpis"]["bestYear"], 2020);
        assert_eq!(json["salesMatrix"][1]["totalPrice"], 50.0);
        assert_eq!(json["metadata"]["csvInfo"]["rowCount"], 2);
    }

    #[test]
    fn test_skipped_rows_give_warning() {
        let csv = "year,Brand,Product,Quantity,Total Price\n2020,A,X,10,100\nsoon,A,X,1,1\n";
        let options = AnalysisOptions {
            lenient: true,
            ..AnalysisOptions::default()
        };
        let resp = response(csv, &options);

        assert_eq!(resp.status, "warning");
        assert_eq!(resp.metadata.skipped.len(), 1);
        assert_eq!(resp.metadata.skipped[0].row, 2);
    }

    #[test]
    fn test_error_response_shape() {
        let json = error_response("No file provided");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "No file provided");
    }
}
