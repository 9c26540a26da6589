//! Delimiter-flexible CSV records.

use csv::{ReaderBuilder, Trim};
use peticiona_core::{DataLoadError, FieldValue, Record};
use std::collections::HashSet;
use tracing::debug;

const CANDIDATES: [u8; 3] = [b';', b',', b'\t'];

/// Pick the delimiter that occurs most often in the header line.
/// Ties go to the earlier candidate (`;` then `,` then tab); a header with
/// none of them is read as comma-separated.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let mut best = (b',', 0usize);
    for candidate in CANDIDATES {
        let count = header.bytes().filter(|&b| b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Parse CSV text (header row = field names) into records.
pub fn parse_csv(text: &str) -> Result<Vec<Record>, DataLoadError> {
    let delimiter = sniff_delimiter(text);
    debug!(delimiter = %(delimiter as char).escape_default(), "Detected CSV delimiter");

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut seen = HashSet::new();
    for name in headers.iter().filter(|h| !h.is_empty()) {
        if !seen.insert(name.as_str()) {
            return Err(DataLoadError::DuplicateColumn(name.clone()));
        }
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(malformed)?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let pairs = headers
            .iter()
            .zip(row.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, cell)| (name.clone(), FieldValue::from_cell(cell)));
        records.push(Record::new(records.len(), pairs));
    }
    Ok(records)
}

fn malformed(err: csv::Error) -> DataLoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    DataLoadError::MalformedCsv {
        line,
        reason: err.to_string(),
    }
}
