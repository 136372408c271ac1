//! CSV ingestion with encoding and delimiter auto-detection.
//!
//! Turns an uploaded transaction export into raw row objects (one JSON object
//! per row, keyed by header). Nothing here knows about transactions; the
//! normalizer gives the rows meaning.

use serde_json::{Map, Value};
use std::path::Path;

pub use crate::error::CsvError;
use crate::error::CsvResult;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows as JSON objects
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV into JSON objects with explicit delimiter.
///
/// Each row becomes a JSON object where keys are column headers and values
/// are the trimmed cell strings.
///
/// # Example
/// ```ignore
/// use retail_insights::csv_to_json;
///
/// let csv = "year,Brand,Product\n2020,Acme,Tea";
/// let rows = csv_to_json(csv, ',').unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0]["Brand"], "Acme");
/// ```
pub fn csv_to_json(csv: &str, delimiter: char) -> CsvResult<Vec<Value>> {
    parse_string_with_metadata(csv, delimiter, "utf-8".to_string()).map(|r| r.records)
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e)))?;

    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV bytes with auto-detected encoding and an explicit delimiter.
pub fn parse_bytes_with_delimiter(bytes: &[u8], delimiter: char) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV string with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Delimiter '{}' is not a single-byte character", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
            CsvError::new(line, format!("Cannot read line: {}", e))
        })?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("");
            obj.insert(header.clone(), Value::String(value.to_string()));
        }

        records.push(Value::Object(obj));
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "year,Brand,Product,Quantity,Total Price\n\
                          2020,Acme,Tea,10,100\n\
                          2021,Acme,Tea,5,50\n";

    #[test]
    fn test_simple_csv() {
        let rows = csv_to_json(SAMPLE, ',').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["year"], "2020");
        assert_eq!(rows[0]["Brand"], "Acme");
        assert_eq!(rows[1]["Quantity"], "5");
        assert_eq!(rows[1]["Total Price"], "50");
    }

    #[test]
    fn test_quoted_values_keep_delimiter() {
        let csv = "Brand;Product\n\"Acme; Ltd\";\"Green Tea\"";
        let rows = csv_to_json(csv, ';').unwrap();

        assert_eq!(rows[0]["Brand"], "Acme; Ltd");
        assert_eq!(rows[0]["Product"], "Green Tea");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let rows = csv_to_json(csv, ',').unwrap();

        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_values_become_empty() {
        let csv = "a;b;c\n1;;3\n4";
        let rows = csv_to_json(csv, ';').unwrap();

        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1]["a"], "4");
        assert_eq!(rows[1]["c"], "");
    }

    #[test]
    fn test_extra_columns_ignored() {
        let csv = "a,b\n1,2,3,4";
        let rows = csv_to_json(csv, ',').unwrap();

        assert_eq!(rows[0].as_object().unwrap().len(), 2);
        assert_eq!(rows[0]["b"], "2");
    }

    #[test]
    fn test_empty_csv_error() {
        let err = csv_to_json("", ',').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let csv = "\u{feff}year,Brand\n2020,Acme";
        let rows = csv_to_json(csv, ',').unwrap();
        assert_eq!(rows[0]["year"], "2020");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(SAMPLE.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.records.len(), 2);
        assert_eq!(
            result.headers,
            vec!["year", "Brand", "Product", "Quantity", "Total Price"]
        );
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_parse_file_auto() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.replace(',', ";").as_bytes()).unwrap();

        let result = parse_csv_file_auto(file.path()).unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records[0]["Product"], "Tea");
    }

    #[test]
    fn test_missing_file_error() {
        let err = parse_csv_file_auto("/definitely/not/here.csv").unwrap_err();
        assert!(err.message.contains("Cannot read file"));
    }
}
