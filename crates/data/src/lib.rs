//! # Peticiona Data
//!
//! Turns a CSV or JSON data source into an ordered list of [`Record`]s,
//! and reads the delimiter-separated tables the schema is built from.
//!
//! ```text
//!   interview.csv ──┐
//!                   ├──► load_records() ──► Vec<Record>
//!   interview.json ─┘
//! ```

pub mod csv_source;
pub mod json_source;
pub mod table;

pub use csv_source::{parse_csv, sniff_delimiter};
pub use json_source::parse_json;
pub use table::read_table;

use peticiona_core::{DataLoadError, Record};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// The kind of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Csv,
    Json,
}

impl DataKind {
    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(DataKind::Csv),
            "json" => Some(DataKind::Json),
            _ => None,
        }
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DataKind::Csv),
            "json" => Ok(DataKind::Json),
            other => Err(format!("unknown data kind '{other}' (expected csv or json)")),
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Csv => write!(f, "csv"),
            DataKind::Json => write!(f, "json"),
        }
    }
}

/// A data source: where the records come from and how to read them.
#[derive(Debug, Clone)]
pub struct DataSource {
    pub path: PathBuf,
    pub kind: DataKind,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>, kind: DataKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Keep only the first record of the batch
    pub first_only: bool,
}

/// Load every record of a data source.
pub fn load_records(source: &DataSource, options: LoadOptions) -> Result<Vec<Record>, DataLoadError> {
    if !source.path.exists() {
        return Err(DataLoadError::NotFound(source.path.clone()));
    }
    let text = std::fs::read_to_string(&source.path).map_err(|e| DataLoadError::Read {
        path: source.path.clone(),
        reason: e.to_string(),
    })?;

    let mut records = parse_records(&text, source.kind)?;
    if options.first_only && records.len() > 1 {
        debug!(dropped = records.len() - 1, "First-record mode, truncating batch");
        records.truncate(1);
    }

    info!(
        path = %source.path.display(),
        kind = %source.kind,
        records = records.len(),
        "Loaded records"
    );
    Ok(records)
}

/// Parse in-memory text of the given kind.
pub fn parse_records(text: &str, kind: DataKind) -> Result<Vec<Record>, DataLoadError> {
    let text = strip_bom(text);
    let records = match kind {
        DataKind::Csv => parse_csv(text)?,
        DataKind::Json => parse_json(text)?,
    };
    if records.is_empty() {
        return Err(DataLoadError::Empty);
    }
    Ok(records)
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}
