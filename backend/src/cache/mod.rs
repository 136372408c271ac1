//! Analysis cache - reuse work across requests for the same upload.
//!
//! Two layers, both keyed by the SHA-256 of the uploaded bytes:
//!
//! - datasets: the normalized [`LoadedDataset`] (also keyed by the column
//!   mapping and row policy, since those change the result)
//! - reports: an [`AnalysisReport`] for one dataset, product selection and
//!   trend window
//!
//! The cache is owned by its caller (the HTTP server holds one behind a
//! mutex). Nothing here is written to disk. Entries leave only through
//! [`AnalysisCache::invalidate`], [`AnalysisCache::clear`], capacity
//! eviction of the oldest upload, or (for reports) eviction of the oldest
//! report of an upload once it holds [`MAX_REPORTS_PER_UPLOAD`].

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::models::ProductFilter;
use crate::transform::normalizer::ColumnMapping;
use crate::transform::pipeline::{AnalysisReport, LoadedDataset};

/// Uploads kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 32;

/// Distinct (selection, window) reports kept for one upload.
pub const MAX_REPORTS_PER_UPLOAD: usize = 16;

/// SHA-256 of an upload, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Accept a hash received from a client (64 hex characters).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        (value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())).then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that determines a normalized dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
    pub content: ContentHash,
    pub columns: ColumnMapping,
    pub delimiter: Option<char>,
    pub lenient: bool,
}

/// Everything that determines an analysis report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub dataset: DatasetKey,
    pub filter: ProductFilter,
    pub trend_window: usize,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// In-memory cache of loaded datasets and reports.
pub struct AnalysisCache {
    capacity: usize,
    datasets: HashMap<DatasetKey, Arc<LoadedDataset>>,
    reports: HashMap<ReportKey, Arc<AnalysisReport>>,
    /// Report keys per upload, oldest first
    report_order: HashMap<ContentHash, VecDeque<ReportKey>>,
    /// Upload hashes, oldest first
    order: VecDeque<ContentHash>,
    stats: CacheStats,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Keep at most `capacity` distinct uploads (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            datasets: HashMap::new(),
            reports: HashMap::new(),
            report_order: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn dataset(&mut self, key: &DatasetKey) -> Option<Arc<LoadedDataset>> {
        let found = self.datasets.get(key).cloned();
        self.record(found.is_some());
        found
    }

    pub fn insert_dataset(&mut self, key: DatasetKey, dataset: LoadedDataset) -> Arc<LoadedDataset> {
        self.touch(&key.content);
        let dataset = Arc::new(dataset);
        self.datasets.insert(key, Arc::clone(&dataset));
        dataset
    }

    pub fn report(&mut self, key: &ReportKey) -> Option<Arc<AnalysisReport>> {
        let found = self.reports.get(key).cloned();
        self.record(found.is_some());
        found
    }

    pub fn insert_report(&mut self, key: ReportKey, report: AnalysisReport) -> Arc<AnalysisReport> {
        self.touch(&key.dataset.content);
        let report = Arc::new(report);
        if self.reports.insert(key.clone(), Arc::clone(&report)).is_none() {
            let keys = self.report_order.entry(key.dataset.content.clone()).or_default();
            keys.push_back(key);
            while keys.len() > MAX_REPORTS_PER_UPLOAD {
                if let Some(oldest) = keys.pop_front() {
                    self.reports.remove(&oldest);
                }
            }
        }
        report
    }

    /// Drop every entry derived from `content`. Returns how many were removed.
    pub fn invalidate(&mut self, content: &ContentHash) -> usize {
        let before = self.datasets.len() + self.reports.len();
        self.datasets.retain(|k, _| &k.content != content);
        self.reports.retain(|k, _| &k.dataset.content != content);
        self.report_order.remove(content);
        self.order.retain(|h| h != content);
        before - (self.datasets.len() + self.reports.len())
    }

    pub fn clear(&mut self) {
        self.datasets.clear();
        self.reports.clear();
        self.report_order.clear();
        self.order.clear();
    }

    /// Number of reports held for one upload.
    pub fn reports_for(&self, content: &ContentHash) -> usize {
        self.report_order.get(content).map_or(0, VecDeque::len)
    }

    /// Number of distinct uploads held.
    pub fn uploads(&self) -> usize {
        self.order.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn record(&mut self, hit: bool) {
        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
    }

    fn touch(&mut self, content: &ContentHash) {
        if self.order.contains(content) {
            return;
        }
        self.order.push_back(content.clone());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.front().cloned() {
                self.invalidate(&oldest);
            }
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::pipeline::{analyze_dataset, load_bytes, resolve_filter, AnalysisOptions};

    const CSV: &str = "year,Brand,Product,Quantity,Total Price\n2020,A,X,10,100\n2021,B,Y,5,50\n";

    fn dataset_key(bytes: &[u8]) -> DatasetKey {
        DatasetKey {
            content: ContentHash::of(bytes),
            columns: ColumnMapping::default(),
            delimiter: None,
            lenient: false,
        }
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = ContentHash::of(b"abc");
        assert_eq!(
            a.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(ContentHash::parse(&a.as_str().to_uppercase()), Some(a));
        assert!(ContentHash::parse("xyz").is_none());
    }

    #[test]
    fn test_dataset_hit_after_insert() {
        let options = AnalysisOptions::default();
        let mut cache = AnalysisCache::new();
        let key = dataset_key(CSV.as_bytes());

        assert!(cache.dataset(&key).is_none());
        cache.insert_dataset(key.clone(), load_bytes(CSV.as_bytes(), &options).unwrap());
        assert_eq!(cache.dataset(&key).unwrap().set.len(), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_report_key_includes_filter_and_window() {
        let options = AnalysisOptions::default();
        let mut cache = AnalysisCache::new();
        let dataset = load_bytes(CSV.as_bytes(), &options).unwrap();
        let filter = resolve_filter(&dataset.set, &options);
        let report = analyze_dataset(&dataset, &options).unwrap();

        let key = ReportKey {
            dataset: dataset_key(CSV.as_bytes()),
            filter: filter.clone(),
            trend_window: 200,
        };
        cache.insert_report(key.clone(), report);

        assert!(cache.report(&key).is_some());
        let other_filter = ReportKey {
            filter: ProductFilter::new(["X"]),
            ..key.clone()
        };
        assert!(cache.report(&other_filter).is_none());
        let other_window = ReportKey {
            trend_window: 3,
            ..key
        };
        assert!(cache.report(&other_window).is_none());
    }

    #[test]
    fn test_invalidate_removes_both_layers() {
        let options = AnalysisOptions::default();
        let mut cache = AnalysisCache::new();
        let dataset = load_bytes(CSV.as_bytes(), &options).unwrap();
        let report = analyze_dataset(&dataset, &options).unwrap();
        let key = dataset_key(CSV.as_bytes());

        cache.insert_dataset(key.clone(), dataset);
        cache.insert_report(
            ReportKey {
                dataset: key.clone(),
                filter: ProductFilter::default(),
                trend_window: 200,
            },
            report,
        );

        assert_eq!(cache.invalidate(&key.content), 2);
        assert!(cache.dataset(&key).is_none());
        assert_eq!(cache.uploads(), 0);
    }

    #[test]
    fn test_reports_per_upload_are_capped() {
        let options = AnalysisOptions::default();
        let mut cache = AnalysisCache::new();
        let dataset = load_bytes(CSV.as_bytes(), &options).unwrap();
        let report = analyze_dataset(&dataset, &options).unwrap();
        let key = |window: usize| ReportKey {
            dataset: dataset_key(CSV.as_bytes()),
            filter: ProductFilter::new(["X"]),
            trend_window: window,
        };

        for window in 1..=MAX_REPORTS_PER_UPLOAD + 5 {
            cache.insert_report(key(window), report.clone());
        }

        let content = ContentHash::of(CSV.as_bytes());
        assert_eq!(cache.reports_for(&content), MAX_REPORTS_PER_UPLOAD);
        assert!(cache.report(&key(1)).is_none());
        assert!(cache.report(&key(MAX_REPORTS_PER_UPLOAD + 5)).is_some());

        // re-inserting a held key does not evict anything
        cache.insert_report(key(MAX_REPORTS_PER_UPLOAD + 5), report);
        assert_eq!(cache.reports_for(&content), MAX_REPORTS_PER_UPLOAD);
        assert!(cache.report(&key(6)).is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest_upload() {
        let options = AnalysisOptions::default();
        let mut cache = AnalysisCache::with_capacity(1);
        let second = CSV.replace("10,100", "11,110");

        let first_key = dataset_key(CSV.as_bytes());
        let second_key = dataset_key(second.as_bytes());
        cache.insert_dataset(first_key.clone(), load_bytes(CSV.as_bytes(), &options).unwrap());
        cache.insert_dataset(second_key.clone(), load_bytes(second.as_bytes(), &options).unwrap());

        assert_eq!(cache.uploads(), 1);
        assert!(cache.dataset(&first_key).is_none());
        assert!(cache.dataset(&second_key).is_some());
    }
}
