//! Document Assembler: one output document per record.
//!
//! ```text
//!  Record ──► RuleEngine::evaluate ──► Activation
//!                                         │
//!  Template::instantiate ──► apply_sections(active) ──► substitute(format) ──► save
//!                                                                               │
//!                                                              RecordOutcome ◄──┘
//! ```
//!
//! Inactive sections are removed before substitution, so placeholders
//! inside them are never resolved or reported. A fatal error in one record
//! is recorded in its outcome and the batch carries on.

pub mod outcome;
pub mod output;

pub use outcome::{BatchReport, RecordOutcome, RecordStats, RecordStatus};
pub use output::OutputPolicy;

use peticiona_config::ProcessingConfig;
use peticiona_core::{Diagnostic, FieldLookup, Record, TemplateError};
use peticiona_document::{Replacement, Template};
use peticiona_format::{FieldFormat, ValueFormatter};
use peticiona_rules::RuleEngine;
use peticiona_schema::Schema;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const UNCATEGORIZED: &str = "Sem categoria";

/// Shared, read-only inputs of a batch.
pub struct Assembler<'a> {
    schema: &'a Schema,
    engine: &'a RuleEngine,
    formatter: &'a ValueFormatter,
    template: &'a Template,
    strict: bool,
    workers: usize,
    /// Template sections no rule governs
    unknown_sections: Vec<String>,
}

impl<'a> Assembler<'a> {
    /// Fails when the template's section markers do not balance.
    pub fn new(
        schema: &'a Schema,
        engine: &'a RuleEngine,
        formatter: &'a ValueFormatter,
        template: &'a Template,
    ) -> Result<Self, TemplateError> {
        let sections: BTreeSet<String> = template.sections()?.into_iter().collect();
        let unknown_sections: Vec<String> = sections.into_iter().filter(|s| !engine.has_rule(s)).collect();
        for section in &unknown_sections {
            warn!(section = %section, "Template section has no activation rule and will be removed");
        }
        Ok(Self {
            schema,
            engine,
            formatter,
            template,
            strict: false,
            workers: 1,
            unknown_sections,
        })
    }

    pub fn with_processing(mut self, processing: &ProcessingConfig) -> Self {
        self.strict = processing.strict;
        self.workers = processing.workers.max(1);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Assemble every record. Records are independent; outcomes come back
    /// ordered by record index whatever the worker count.
    pub fn run(&self, records: &[Record], output: &OutputPolicy) -> Vec<RecordOutcome> {
        let total = records.len();
        let target = output.target_dir();
        if !target.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(&target) {
                error!(dir = %target.display(), error = %e, "Cannot create output directory");
            }
        }

        let mut outcomes = if self.workers <= 1 || total <= 1 {
            records
                .iter()
                .map(|r| self.assemble(r, &output.path_for(r.index(), total)))
                .collect()
        } else {
            self.run_parallel(records, output, total)
        };
        outcomes.sort_by_key(|o: &RecordOutcome| o.index);
        outcomes
    }

    fn run_parallel(&self, records: &[Record], output: &OutputPolicy, total: usize) -> Vec<RecordOutcome> {
        let workers = self.workers.min(records.len());
        let chunk = records.len().div_ceil(workers);
        info!(workers, records = records.len(), "Assembling in parallel");

        std::thread::scope(|s| {
            let handles: Vec<_> = records
                .chunks(chunk)
                .map(|batch| {
                    let handle = s.spawn(move || {
                        batch
                            .iter()
                            .map(|r| self.assemble(r, &output.path_for(r.index(), total)))
                            .collect::<Vec<_>>()
                    });
                    (batch, handle)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(batch, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        batch
                            .iter()
                            .map(|r| failed(r.index(), "worker thread panicked".into(), Vec::new()))
                            .collect()
                    })
                })
                .collect()
        })
    }

    /// Assemble one record into `path`.
    pub fn assemble(&self, record: &Record, path: &Path) -> RecordOutcome {
        let index = record.index();
        let activation = self.engine.evaluate(record);
        let mut diagnostics = activation.diagnostics.clone();
        let mut stats = RecordStats {
            required_fields: activation.required_fields.len(),
            required_missing: activation.missing_required.len(),
            ..RecordStats::default()
        };

        for section in &self.unknown_sections {
            let diag = Diagnostic::UnknownSection {
                section: section.clone(),
            };
            diag.log(index);
            diagnostics.push(diag);
        }

        if self.strict && !activation.missing_required.is_empty() {
            let missing: Vec<&str> = activation.missing_required.iter().map(String::as_str).collect();
            return failed(
                index,
                format!("required fields missing: {}", missing.join(", ")),
                diagnostics,
            );
        }

        let mut document = self.template.instantiate();
        let edit = match document.apply_sections(&|id| activation.is_active(id)) {
            Ok(edit) => edit,
            Err(e) => return failed(index, e.to_string(), diagnostics),
        };
        stats.sections_found = edit.found.len();
        stats.sections_active = edit.kept.len();
        stats.sections_removed = edit.removed.len();

        let mut missing_fields: BTreeSet<String> = activation.missing_required.clone();
        let mut unmapped: BTreeSet<String> = BTreeSet::new();
        let substitution = document.substitute(&mut |name: &str| {
            if self.schema.field_by_name(name).is_none() {
                unmapped.insert(name.to_string());
                return Replacement::Unmapped;
            }
            let Some(value) = activation.resolved.lookup(name).filter(|v| !v.is_blank()) else {
                stats.placeholders_missing += 1;
                if missing_fields.insert(name.to_string()) {
                    let diag = Diagnostic::MissingField {
                        field: name.to_string(),
                        required: false,
                    };
                    diag.log(index);
                    diagnostics.push(diag);
                }
                return Replacement::Text(String::new());
            };
            let formatted = self
                .formatter
                .format(name, FieldFormat::for_field(self.schema, name), value);
            if let Some(diag) = formatted.diagnostic {
                diag.log(index);
                diagnostics.push(diag);
            }
            Replacement::Text(formatted.text)
        });
        // Missing values were replaced by empty text; they are counted apart.
        stats.placeholders_found = substitution.found;
        stats.placeholders_substituted = substitution.substituted.saturating_sub(stats.placeholders_missing);
        stats.placeholders_unmapped = substitution.unmapped.len();
        for token in unmapped {
            let diag = Diagnostic::UnmappedPlaceholder { token };
            diag.log(index);
            diagnostics.push(diag);
        }

        for field in &missing_fields {
            let category = self.schema.category_of(field).unwrap_or(UNCATEGORIZED);
            stats
                .missing_by_category
                .entry(category.to_string())
                .or_default()
                .push(field.clone());
        }
        stats.set_completeness();

        if let Err(e) = document.save(path) {
            return RecordOutcome {
                index,
                status: RecordStatus::Failed { error: e.to_string() },
                stats,
                diagnostics,
            };
        }
        debug!(
            record = index,
            path = %path.display(),
            substituted = stats.placeholders_substituted,
            removed_sections = stats.sections_removed,
            warnings = diagnostics.len(),
            "Record assembled"
        );
        RecordOutcome {
            index,
            status: RecordStatus::Written {
                path: PathBuf::from(path),
            },
            stats,
            diagnostics,
        }
    }
}

fn failed(index: usize, error: String, diagnostics: Vec<Diagnostic>) -> RecordOutcome {
    error!(record = index, error = %error, "Record failed");
    RecordOutcome {
        index,
        status: RecordStatus::Failed { error },
        stats: RecordStats::default(),
        diagnostics,
    }
}
