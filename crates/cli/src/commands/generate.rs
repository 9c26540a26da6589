//! `peticiona generate`: one document per record.

use peticiona_assembler::{Assembler, BatchReport, OutputPolicy};
use peticiona_config::AppConfig;
use peticiona_data::{DataKind, DataSource, LoadOptions, load_records};
use peticiona_document::Template;
use peticiona_format::ValueFormatter;
use peticiona_rules::RuleEngine;
use std::path::PathBuf;
use tracing::info;

pub struct GenerateArgs {
    pub template: PathBuf,
    pub data: PathBuf,
    pub kind: Option<DataKind>,
    pub output: Option<PathBuf>,
    pub first_record: bool,
    pub strict: bool,
    pub workers: Option<usize>,
    pub report: Option<PathBuf>,
}

pub fn run(config: &AppConfig, args: GenerateArgs) -> Result<BatchReport, Box<dyn std::error::Error>> {
    let kind = match args.kind.or_else(|| DataKind::from_path(&args.data)) {
        Some(kind) => kind,
        None => {
            return Err(format!(
                "Cannot tell the data kind of {}; pass --kind csv or --kind json",
                args.data.display()
            )
            .into());
        }
    };

    let (schema, engine) = RuleEngine::load(&config.schema)?;
    println!(
        "📚 Schema: {} ({} fields, {} rules)",
        schema.source(),
        schema.fields().len(),
        schema.rules().len()
    );

    let template = Template::open(&args.template)?;
    let placeholders = template.placeholders();
    println!(
        "📄 Template: {} ({} placeholders, {} split across runs)",
        args.template.display(),
        placeholders.len(),
        placeholders.iter().filter(|p| p.split).count()
    );
    let source = DataSource::new(&args.data, kind);
    let records = load_records(
        &source,
        LoadOptions {
            first_only: args.first_record,
        },
    )?;
    println!("📥 Records: {} from {}", records.len(), args.data.display());

    let formatter = ValueFormatter::new(config.formatting.clone());
    let mut assembler = Assembler::new(&schema, &engine, &formatter, &template)?.with_processing(&config.processing);
    if args.strict {
        assembler = assembler.strict(true);
    }
    if let Some(workers) = args.workers {
        assembler = assembler.workers(workers);
    }

    let policy = match &args.output {
        Some(output) => OutputPolicy::infer(output, &args.template, &config.output.suffix),
        None => OutputPolicy::directory(&config.output.dir, &args.template, &config.output.suffix),
    };

    let outcomes = assembler.run(&records, &policy);
    let report = BatchReport::new(&args.template, schema.source().to_string(), outcomes);
    print_summary(&report);

    if let Some(path) = &args.report {
        std::fs::write(path, report.to_json()?)
            .map_err(|e| format!("Failed to write report to {}: {e}", path.display()))?;
        info!(path = %path.display(), "Batch report written");
        println!("🧾 Report: {}", path.display());
    }

    Ok(report)
}

fn print_summary(report: &BatchReport) {
    println!();
    for outcome in &report.outcomes {
        let n = outcome.index + 1;
        match (outcome.output(), outcome.error()) {
            (Some(path), _) => println!(
                "   ✅ #{n} → {} ({:.1}% complete, {} warnings)",
                path.display(),
                outcome.stats.completeness,
                outcome.diagnostics.len()
            ),
            (None, Some(error)) => println!("   ❌ #{n}: {error}"),
            (None, None) => {}
        }
        for (category, fields) in &outcome.stats.missing_by_category {
            println!("      ⚠️  {category}: {}", fields.join(", "));
        }
    }

    println!();
    println!(
        "📊 {} records: {} written, {} failed, {} warnings",
        report.records, report.succeeded, report.failed, report.warnings
    );
    for (kind, count) in report.warnings_by_kind() {
        println!("   {kind:<22} {count}");
    }
}
