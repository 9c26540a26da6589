//! End-to-end tests for the assembly pipeline.
//!
//! Each test lays out schema tables, a data file and a `.docx` template in a
//! temporary directory, then drives the same steps `peticiona generate` does.

use peticiona_assembler::{Assembler, BatchReport, OutputPolicy, RecordOutcome};
use peticiona_config::AppConfig;
use peticiona_core::Diagnostic;
use peticiona_data::{DataKind, DataSource, LoadOptions, load_records};
use peticiona_document::{Package, Template, inspect};
use peticiona_format::ValueFormatter;
use peticiona_rules::RuleEngine;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

// ── Fixtures ─────────────────────────────────────────────────────────────

fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

fn para(runs: &[&str]) -> String {
    let runs: String = runs.iter().map(|r| run(r)).collect();
    format!("<w:p>{runs}</w:p>")
}

fn row(cells: &[&str]) -> String {
    let cells: String = cells.iter().map(|c| format!("<w:tc>{}</w:tc>", para(&[c]))).collect();
    format!("<w:tr>{cells}</w:tr>")
}

fn write_template(path: &Path) {
    let body = [
        para(&["Autor: {{nome_", "autor}}"]),
        para(&["{{#DANOS}}"]),
        para(&["Valor: {{valor_causa}}, em dobro {{valor_total}}"]),
        para(&["{{/DANOS}}"]),
        format!(
            "<w:tbl><w:tblPr/>{}{}</w:tbl>",
            row(&["Fato", "{{data_fato}}"]),
            row(&["{{#DANOS}}Dano", "sim{{/DANOS}}"])
        ),
        para(&["Termos em que pede deferimento."]),
    ]
    .concat();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#
    );
    let header = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:hdr xmlns:w="{W_NS}">{}</w:hdr>"#,
        para(&["Processo de {{nome_autor}}"])
    );
    let bytes = Package::from_files([
        ("[Content_Types].xml", "<Types/>".to_string()),
        ("word/document.xml", document),
        ("word/header1.xml", header),
    ])
    .to_bytes()
    .unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_schema(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("campos_definicao.csv"),
        "campo_id;nome_campo;tipo_dado_id;obrigatorio_quando_ativo;formula_calculo\n\
         F001;nome_autor;T1;sim;\n\
         F002;valor_causa;T2;sim;\n\
         F003;tipo_acao;T1;;\n\
         F004;valor_total;T2;;valor_causa * 2\n\
         F005;data_fato;T3;;\n",
    )
    .unwrap();
    fs::write(
        dir.join("categorias_campos.csv"),
        "campo_id;categoria_1;ordem_exibicao\n\
         F001;Autor;1\n\
         F003;Pedido;1\n\
         F002;Pedido;2\n\
         F004;Pedido;3\n\
         F005;Fatos;1\n",
    )
    .unwrap();
    fs::write(
        dir.join("regras_ativacao.csv"),
        "regra_id;secao_id;condicao;campo_id;obrigatorio_quando_ativo\n\
         R1;DANOS;tipo_acao == 'indenizacao';F002;sim\n",
    )
    .unwrap();
    fs::write(
        dir.join("tipos_dados.csv"),
        "tipo_dado_id;nome_tipo\nT1;texto\nT2;moeda\nT3;data\n",
    )
    .unwrap();
}

const RECORDS: &str = r#"[
    {"nome_autor": "Maria Silva", "tipo_acao": "indenizacao", "valor_causa": "1500", "data_fato": "2024-03-05"},
    {"nome_autor": "João Souza", "tipo_acao": "cobranca"}
]"#;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config: AppConfig,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        write_schema(&root.join("schema"));
        write_template(&root.join("modelo.docx"));
        fs::write(root.join("dados.json"), RECORDS).unwrap();

        let mut config = AppConfig::default();
        config.schema.dir = root.join("schema");
        config.output.dir = root.join("saida");
        Self {
            _dir: dir,
            root,
            config,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Same steps as `peticiona generate`.
    fn generate(&self, first_only: bool, workers: usize) -> BatchReport {
        let (schema, engine) = RuleEngine::load(&self.config.schema).unwrap();
        let template_path = self.path("modelo.docx");
        let template = Template::open(&template_path).unwrap();
        let records = load_records(
            &DataSource::new(self.path("dados.json"), DataKind::Json),
            LoadOptions { first_only },
        )
        .unwrap();
        let formatter = ValueFormatter::new(self.config.formatting.clone());
        let assembler = Assembler::new(&schema, &engine, &formatter, &template)
            .unwrap()
            .with_processing(&self.config.processing)
            .workers(workers);
        let policy = OutputPolicy::directory(&self.config.output.dir, &template_path, &self.config.output.suffix);
        let outcomes = assembler.run(&records, &policy);
        BatchReport::new(&template_path, schema.source().to_string(), outcomes)
    }
}

fn texts(path: &Path) -> Vec<String> {
    Template::open(path).unwrap().instantiate().paragraph_texts()
}

fn output(outcome: &RecordOutcome) -> PathBuf {
    outcome.output().expect("record was written").to_path_buf()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[test]
fn generates_one_document_per_record() {
    let ws = Workspace::new();
    let report = ws.generate(false, 1);

    assert_eq!(report.records, 2);
    assert_eq!(report.succeeded, 2);
    assert!(!report.has_failures());

    let first = &report.outcomes[0];
    assert_eq!(output(first), ws.path("saida").join("modelo_processado_1.docx"));
    assert_eq!(
        texts(&output(first)),
        vec![
            "Autor: Maria Silva",
            "Valor: R$ 1.500,00, em dobro R$ 3.000,00",
            "Fato",
            "05/03/2024",
            "Dano",
            "sim",
            "Termos em que pede deferimento.",
            "Processo de Maria Silva",
        ]
    );
    assert_eq!(first.stats.sections_active, 2);
    assert_eq!(first.stats.sections_removed, 0);
    assert_eq!(first.stats.completeness, 100.0);
    assert!(
        !first
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::MissingField { .. } | Diagnostic::UnmappedPlaceholder { .. }))
    );
}

#[test]
fn inactive_section_removes_paragraphs_and_table_row() {
    let ws = Workspace::new();
    let report = ws.generate(false, 1);

    let second = &report.outcomes[1];
    let path = output(second);
    assert_eq!(path, ws.path("saida").join("modelo_processado_2.docx"));
    assert_eq!(
        texts(&path),
        vec![
            "Autor: João Souza",
            "Fato",
            "",
            "Termos em que pede deferimento.",
            "Processo de João Souza",
        ]
    );
    assert_eq!(second.stats.sections_removed, 2);
    assert_eq!(
        (
            second.stats.placeholders_found,
            second.stats.placeholders_substituted,
            second.stats.placeholders_missing,
            second.stats.placeholders_unmapped
        ),
        (3, 2, 1, 0)
    );
    assert!(second.diagnostics.contains(&Diagnostic::MissingField {
        field: "data_fato".into(),
        required: false,
    }));
    assert_eq!(
        second.stats.missing_by_category.get("Fatos"),
        Some(&vec!["data_fato".to_string()])
    );
}

#[test]
fn first_record_only_writes_an_unnumbered_file() {
    let ws = Workspace::new();
    let report = ws.generate(true, 1);

    assert_eq!(report.records, 1);
    assert_eq!(
        output(&report.outcomes[0]),
        ws.path("saida").join("modelo_processado.docx")
    );
}

#[test]
fn parallel_batch_matches_sequential_batch() {
    let ws = Workspace::new();
    let sequential = ws.generate(false, 1);
    let seq_texts: Vec<Vec<String>> = sequential.outcomes.iter().map(|o| texts(&output(o))).collect();

    let parallel = ws.generate(false, 4);
    let par_texts: Vec<Vec<String>> = parallel.outcomes.iter().map(|o| texts(&output(o))).collect();

    assert_eq!(seq_texts, par_texts);
    let indexes: Vec<usize> = parallel.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indexes, vec![0, 1]);
}

#[test]
fn batch_report_serializes_to_json() {
    let ws = Workspace::new();
    let report = ws.generate(false, 1);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["records"], 2);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["outcomes"][0]["status"], "written");
    assert_eq!(json["outcomes"][1]["index"], 1);
    assert!(json["schema_source"].as_str().unwrap().contains("schema"));
}

#[test]
fn config_file_drives_schema_and_output() {
    let ws = Workspace::new();
    let config_path = ws.path("peticiona.toml");
    fs::write(
        &config_path,
        format!(
            "[schema]\ndir = \"{}\"\n\n[output]\ndir = \"{}\"\nsuffix = \"_final\"\n",
            ws.path("schema").display(),
            ws.path("out").display()
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    assert_eq!(config.output.suffix, "_final");

    let ws = Workspace { config, ..ws };
    let report = ws.generate(true, 1);
    assert_eq!(output(&report.outcomes[0]), ws.path("out").join("modelo_final.docx"));
}

#[test]
fn inspection_agrees_with_the_schema() {
    let ws = Workspace::new();
    let template = Template::open(&ws.path("modelo.docx")).unwrap();
    let inspection = inspect(&template);
    let (schema, engine) = RuleEngine::load(&ws.config.schema).unwrap();

    assert!(!inspection.has_marker_errors());
    assert_eq!(
        inspection.placeholder_names().into_iter().collect::<Vec<_>>(),
        vec!["data_fato", "nome_autor", "valor_causa", "valor_total"]
    );
    assert!(inspection.unknown_placeholders(|n| schema.field_by_name(n).is_some()).is_empty());
    assert!(inspection.section_ids().iter().all(|id| engine.has_rule(id)));
}

#[test]
fn missing_template_is_a_fatal_error() {
    let ws = Workspace::new();
    let err = Template::open(&ws.path("nao_existe.docx")).unwrap_err();
    assert!(err.to_string().contains("nao_existe.docx"));
}
