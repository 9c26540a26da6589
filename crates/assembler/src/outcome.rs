//! Per-record outcomes and the batch report.

use chrono::{DateTime, Utc};
use peticiona_core::Diagnostic;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Counters collected while assembling one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordStats {
    /// Placeholder occurrences left after section editing; equals
    /// substituted + missing + unmapped
    pub placeholders_found: usize,
    pub placeholders_substituted: usize,
    /// Known fields that had no value
    pub placeholders_missing: usize,
    pub placeholders_unmapped: usize,
    pub required_fields: usize,
    pub required_missing: usize,
    pub sections_found: usize,
    pub sections_active: usize,
    pub sections_removed: usize,
    /// Share of required fields with a value, 0..=100
    pub completeness: f64,
    pub missing_by_category: BTreeMap<String, Vec<String>>,
}

impl RecordStats {
    pub(crate) fn set_completeness(&mut self) {
        self.completeness = if self.required_fields == 0 {
            100.0
        } else {
            let filled = self.required_fields - self.required_missing;
            (filled as f64 * 1000.0 / self.required_fields as f64).round() / 10.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    Written { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    /// Zero-based position in the data source
    pub index: usize,
    #[serde(flatten)]
    pub status: RecordStatus,
    pub stats: RecordStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RecordStatus::Written { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.status {
            RecordStatus::Written { path } => Some(path),
            RecordStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RecordStatus::Written { .. } => None,
            RecordStatus::Failed { error } => Some(error),
        }
    }
}

/// Aggregated result of a batch, ordered by record index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub template: PathBuf,
    pub schema_source: String,
    pub records: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub warnings: usize,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn new(template: &Path, schema_source: String, mut outcomes: Vec<RecordOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            generated_at: Utc::now(),
            template: template.to_path_buf(),
            schema_source,
            records: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            warnings: outcomes.iter().map(|o| o.diagnostics.len()).sum(),
            outcomes,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Warning counts per diagnostic kind across the batch.
    pub fn warnings_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in self.outcomes.iter().flat_map(|o| &o.diagnostics) {
            *counts.entry(diagnostic.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, ok: bool) -> RecordOutcome {
        RecordOutcome {
            index,
            status: if ok {
                RecordStatus::Written {
                    path: PathBuf::from(format!("out_{index}.docx")),
                }
            } else {
                RecordStatus::Failed { error: "boom".into() }
            },
            stats: RecordStats::default(),
            diagnostics: vec![Diagnostic::UnmappedPlaceholder { token: "x".into() }],
        }
    }

    #[test]
    fn completeness_percentage() {
        let mut stats = RecordStats {
            required_fields: 3,
            required_missing: 1,
            ..RecordStats::default()
        };
        stats.set_completeness();
        assert_eq!(stats.completeness, 66.7);
        stats.required_fields = 0;
        stats.set_completeness();
        assert_eq!(stats.completeness, 100.0);
    }

    #[test]
    fn report_orders_and_counts_outcomes() {
        let report = BatchReport::new(
            Path::new("t.docx"),
            "relational".into(),
            vec![outcome(2, true), outcome(0, false), outcome(1, true)],
        );
        let order: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!((report.records, report.succeeded, report.failed), (3, 2, 1));
        assert!(report.has_failures());
        assert_eq!(report.warnings_by_kind().get("unmapped_placeholder"), Some(&3));
        assert_eq!(report.outcomes[0].error(), Some("boom"));
        assert_eq!(report.outcomes[1].output(), Some(Path::new("out_1.docx")));
    }

    #[test]
    fn report_serializes_status_inline() {
        let report = BatchReport::new(Path::new("t.docx"), "legacy".into(), vec![outcome(0, true)]);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let first = &json["outcomes"][0];
        assert_eq!(first["status"], "written");
        assert_eq!(first["path"], "out_0.docx");
        assert_eq!(first["diagnostics"][0]["kind"], "unmapped_placeholder");
    }
}
