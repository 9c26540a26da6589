//! Typed reading of delimiter-separated schema tables.

use crate::csv_source::sniff_delimiter;
use csv::{ReaderBuilder, Trim};
use peticiona_core::DataLoadError;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Read a table into typed rows.
///
/// `delimiter` is the configured one; when it splits the header into a
/// single column the delimiter is sniffed from the header instead.
pub fn read_table<T: DeserializeOwned>(path: &Path, delimiter: u8) -> Result<Vec<T>, DataLoadError> {
    if !path.exists() {
        return Err(DataLoadError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| DataLoadError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_table(&text, delimiter)
}

/// Same as [`read_table`] for in-memory text.
pub fn parse_table<T: DeserializeOwned>(text: &str, delimiter: u8) -> Result<Vec<T>, DataLoadError> {
    let text = crate::strip_bom(text);
    let header = text.lines().next().unwrap_or("");
    let delimiter = if header.as_bytes().contains(&delimiter) {
        delimiter
    } else {
        let sniffed = sniff_delimiter(text);
        debug!(
            configured = %(delimiter as char).escape_default(),
            sniffed = %(sniffed as char).escape_default(),
            "Configured delimiter not in header, using sniffed one"
        );
        sniffed
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(to_error)?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect::<Vec<_>>();
    reader.set_headers(csv::StringRecord::from(headers));

    let mut rows = Vec::new();
    for row in reader.deserialize::<T>() {
        rows.push(row.map_err(to_error)?);
    }
    Ok(rows)
}

fn to_error(err: csv::Error) -> DataLoadError {
    DataLoadError::MalformedCsv {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(alias = "id")]
        campo_id: String,
        #[serde(default)]
        rotulo: Option<String>,
    }

    #[test]
    fn reads_rows_with_aliases_and_optional_columns() {
        let rows: Vec<Row> = parse_table("\u{feff}ID;Extra\n F001 ;x\nF002;\n", b';').unwrap();
        assert_eq!(
            rows,
            vec![
                Row { campo_id: "F001".into(), rotulo: None },
                Row { campo_id: "F002".into(), rotulo: None },
            ]
        );
    }

    #[test]
    fn falls_back_to_sniffed_delimiter() {
        let rows: Vec<Row> = parse_table("campo_id,rotulo\nF001,Autor\n", b';').unwrap();
        assert_eq!(rows[0].rotulo.as_deref(), Some("Autor"));
    }

    #[test]
    fn missing_required_column_is_error() {
        let result: Result<Vec<Row>, _> = parse_table("rotulo\nAutor\n", b';');
        assert!(matches!(result, Err(DataLoadError::MalformedCsv { .. })));
    }

    #[test]
    fn missing_file_is_not_found() {
        let result: Result<Vec<Row>, _> = read_table(Path::new("/nonexistent/t.csv"), b';');
        assert!(matches!(result, Err(DataLoadError::NotFound(_))));
    }
}
