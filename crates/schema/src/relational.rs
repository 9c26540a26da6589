//! The relational tables: one CSV per entity, keyed by field id.

use crate::model::{flag, ActivationRule, Category, DataType, FieldDefinition, SelectOption};
use crate::{Schema, SchemaParts, SchemaSource};
use peticiona_config::SchemaConfig;
use peticiona_core::{DataLoadError, SchemaLoadError};
use peticiona_data::read_table;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FieldRow {
    #[serde(alias = "id", alias = "field_id")]
    campo_id: String,
    #[serde(alias = "name", alias = "field_name")]
    nome_campo: String,
    #[serde(alias = "data_type", alias = "type_id")]
    tipo_dado_id: String,
    #[serde(default, alias = "control_type")]
    tipo_controle_interface: Option<String>,
    #[serde(default, alias = "required_when_active")]
    obrigatorio_quando_ativo: Option<String>,
    #[serde(default, alias = "default")]
    valor_padrao: Option<String>,
    #[serde(default, alias = "mask")]
    mascara_formato: Option<String>,
    #[serde(default, alias = "regex")]
    regex_validacao: Option<String>,
    #[serde(default, alias = "visible_when")]
    visivel_quando: Option<String>,
    #[serde(default, alias = "calc_when")]
    calcular_quando: Option<String>,
    #[serde(default, alias = "formula")]
    formula_calculo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    #[serde(alias = "field_id")]
    campo_id: String,
    #[serde(alias = "categoria", alias = "category")]
    categoria_1: String,
    #[serde(default, alias = "subcategory")]
    subcategoria_1: Option<String>,
    #[serde(default, alias = "display_order")]
    ordem_exibicao: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    #[serde(default, alias = "rule_id")]
    regra_id: Option<String>,
    #[serde(alias = "section_id", alias = "secao")]
    secao_id: String,
    #[serde(default, alias = "condition")]
    condicao: Option<String>,
    #[serde(default, alias = "field_id")]
    campo_id: Option<String>,
    #[serde(default, alias = "required_when_active")]
    obrigatorio_quando_ativo: Option<String>,
    #[serde(default, alias = "link_field_id")]
    campo_vinculo_id: Option<String>,
    #[serde(default, alias = "link_type")]
    condicao_vinculo_tipo: Option<String>,
    #[serde(default, alias = "link_value")]
    condicao_vinculo_valor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypeRow {
    #[serde(alias = "id", alias = "type_id")]
    tipo_dado_id: String,
    #[serde(default, alias = "name", alias = "type_name")]
    nome_tipo: Option<String>,
    #[serde(default, alias = "mask")]
    mascara_formato: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptionRow {
    #[serde(alias = "field_id")]
    campo_id: String,
    #[serde(alias = "value")]
    valor: String,
    #[serde(default, alias = "label")]
    rotulo: Option<String>,
}

/// Load and cross-check all relational tables.
pub fn load(config: &SchemaConfig) -> Result<Schema, SchemaLoadError> {
    let delimiter = config.delimiter_byte();
    let fields: Vec<FieldRow> = required_table(config, &config.fields_table, delimiter)?;
    let categories: Vec<CategoryRow> = required_table(config, &config.categories_table, delimiter)?;
    let rules: Vec<RuleRow> = required_table(config, &config.rules_table, delimiter)?;
    let types: Vec<TypeRow> = required_table(config, &config.types_table, delimiter)?;
    let options: Vec<OptionRow> = optional_table(config, &config.options_table, delimiter)?;

    let parts = assemble(fields, categories, rules, types, options)?;
    let schema = Schema::from_parts(
        SchemaSource::Relational {
            dir: config.dir.clone(),
        },
        parts,
    )?;
    schema.log_loaded();
    Ok(schema)
}

fn required_table<T: DeserializeOwned>(
    config: &SchemaConfig,
    file: &str,
    delimiter: u8,
) -> Result<Vec<T>, SchemaLoadError> {
    let path = config.table_path(file);
    let rows = read_table::<T>(&path, delimiter).map_err(|e| table_error(&path, e))?;
    if rows.is_empty() {
        return Err(SchemaLoadError::EmptyTable {
            table: table_name(&path),
        });
    }
    debug!(table = %table_name(&path), rows = rows.len(), "Read schema table");
    Ok(rows)
}

fn optional_table<T: DeserializeOwned>(
    config: &SchemaConfig,
    file: &str,
    delimiter: u8,
) -> Result<Vec<T>, SchemaLoadError> {
    let path = config.table_path(file);
    match read_table::<T>(&path, delimiter) {
        Ok(rows) => Ok(rows),
        Err(DataLoadError::NotFound(_)) => {
            debug!(table = %table_name(&path), "Optional schema table absent");
            Ok(Vec::new())
        }
        Err(e) => Err(table_error(&path, e)),
    }
}

fn table_error(path: &Path, err: DataLoadError) -> SchemaLoadError {
    match err {
        DataLoadError::NotFound(path) => SchemaLoadError::MissingTable { path },
        other => SchemaLoadError::InvalidTable {
            table: table_name(path),
            reason: other.to_string(),
        },
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn dangling(table: &str, entity: &str, reference: &str) -> SchemaLoadError {
    SchemaLoadError::DanglingReference {
        table: table.to_string(),
        entity: entity.to_string(),
        reference: reference.to_string(),
    }
}

fn assemble(
    field_rows: Vec<FieldRow>,
    category_rows: Vec<CategoryRow>,
    rule_rows: Vec<RuleRow>,
    type_rows: Vec<TypeRow>,
    option_rows: Vec<OptionRow>,
) -> Result<SchemaParts, SchemaLoadError> {
    let data_types: Vec<DataType> = type_rows
        .into_iter()
        .map(|row| {
            let name = non_empty(row.nome_tipo).unwrap_or_else(|| row.tipo_dado_id.clone());
            DataType::new(row.tipo_dado_id.trim(), name, non_empty(row.mascara_formato))
        })
        .collect();

    let names_by_id: HashMap<String, String> = field_rows
        .iter()
        .map(|row| (row.campo_id.trim().to_string(), row.nome_campo.trim().to_string()))
        .collect();

    // Categories: first appearance fixes their order, ordem_exibicao orders fields.
    let mut categories: Vec<Category> = Vec::new();
    let mut placement: HashMap<String, (String, Option<String>, u32)> = HashMap::new();
    for (row_idx, row) in category_rows.into_iter().enumerate() {
        let field_id = row.campo_id.trim().to_string();
        if !names_by_id.contains_key(&field_id) {
            return Err(dangling("categorias_campos", "field", &field_id));
        }
        let name = row.categoria_1.trim().to_string();
        if name.is_empty() {
            continue;
        }
        if !categories.iter().any(|c| c.name == name) {
            let order = categories.len() as u32 + 1;
            categories.push(Category::new(&name, order));
        }
        let order = row
            .ordem_exibicao
            .as_deref()
            .and_then(|o| o.trim().parse::<u32>().ok())
            .unwrap_or(row_idx as u32 + 1);
        placement
            .entry(field_id)
            .or_insert((name, non_empty(row.subcategoria_1), order));
    }

    let fields: Vec<FieldDefinition> = field_rows
        .into_iter()
        .map(|row| {
            let id = row.campo_id.trim().to_string();
            let mut field = FieldDefinition::new(id.clone(), row.nome_campo.trim(), row.tipo_dado_id.trim());
            if let Some((category, subcategory, order)) = placement.remove(&id) {
                field.category = Some(category);
                field.subcategory = subcategory;
                field.display_order = order;
            }
            field.control_type = non_empty(row.tipo_controle_interface);
            field.required_when_active = flag(row.obrigatorio_quando_ativo.as_deref());
            field.default = non_empty(row.valor_padrao);
            field.mask = non_empty(row.mascara_formato);
            field.regex = non_empty(row.regex_validacao);
            field.visible_when = non_empty(row.visivel_quando);
            field.calc_when = non_empty(row.calcular_quando);
            field.formula = non_empty(row.formula_calculo);
            field
        })
        .collect();
    let required_flag: HashMap<&str, bool> = fields
        .iter()
        .map(|f| (f.id.as_str(), f.required_when_active))
        .collect();

    let mut rules: Vec<ActivationRule> = Vec::new();
    for row in rule_rows {
        let section = row.secao_id.trim().to_string();
        if section.is_empty() {
            return Err(SchemaLoadError::InvalidTable {
                table: "regras_ativacao".into(),
                reason: "row without secao_id".into(),
            });
        }

        let condition = match (non_empty(row.condicao), non_empty(row.campo_vinculo_id)) {
            (Some(condition), _) => Some(condition),
            (None, Some(link_id)) => {
                let link_name = names_by_id
                    .get(&link_id)
                    .ok_or_else(|| dangling("regras_ativacao", "field", &link_id))?;
                let kind = non_empty(row.condicao_vinculo_tipo).unwrap_or_else(|| "preenchido".into());
                let value = non_empty(row.condicao_vinculo_valor);
                Some(link_condition(link_name, &kind, value.as_deref()).map_err(|reason| {
                    SchemaLoadError::InvalidTable {
                        table: "regras_ativacao".into(),
                        reason,
                    }
                })?)
            }
            (None, None) => None,
        };

        let idx = match rules.iter().position(|r| r.section_id == section) {
            Some(idx) => idx,
            None => {
                rules.push(ActivationRule {
                    id: non_empty(row.regra_id.clone()).unwrap_or_else(|| format!("R_{section}")),
                    section_id: section.clone(),
                    condition: String::new(),
                    required_fields: Vec::new(),
                });
                rules.len() - 1
            }
        };
        let rule = &mut rules[idx];

        if let Some(condition) = condition {
            if rule.condition.is_empty() {
                rule.condition = condition;
            } else if rule.condition != condition {
                return Err(SchemaLoadError::ConflictingRule { section });
            }
        }

        if let Some(field_id) = non_empty(row.campo_id) {
            let name = names_by_id
                .get(&field_id)
                .ok_or_else(|| dangling("regras_ativacao", "field", &field_id))?;
            let required = match non_empty(row.obrigatorio_quando_ativo) {
                Some(cell) => flag(Some(&cell)),
                None => required_flag.get(field_id.as_str()).copied().unwrap_or(false),
            };
            if required && !rule.required_fields.contains(name) {
                rule.required_fields.push(name.clone());
            }
        }
    }

    let options = option_rows
        .into_iter()
        .map(|row| {
            let value = row.valor.trim().to_string();
            SelectOption {
                field_id: row.campo_id.trim().to_string(),
                label: non_empty(row.rotulo).unwrap_or_else(|| value.clone()),
                value,
            }
        })
        .collect();

    Ok(SchemaParts {
        fields,
        categories,
        rules,
        data_types,
        options,
    })
}

/// Translate a linking-form rule into condition text.
fn link_condition(field: &str, kind: &str, value: Option<&str>) -> Result<String, String> {
    let literal = || quote(value.unwrap_or(""));
    match kind.trim().to_lowercase().as_str() {
        "igual" | "equals" | "eq" => Ok(format!("{field} == {}", literal())),
        "diferente" | "not_equals" | "ne" => Ok(format!("{field} != {}", literal())),
        "preenchido" | "filled" => Ok(format!("{field} != ''")),
        "vazio" | "empty" => Ok(format!("NOT ({field} != '')")),
        other => Err(format!("unknown condicao_vinculo_tipo '{other}'")),
    }
}

fn quote(value: &str) -> String {
    if value.contains('"') {
        format!("'{}'", value.replace('\'', ""))
    } else {
        format!("\"{value}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write_tables(dir: &Path, rules: &str) {
        fs::write(
            dir.join("campos_definicao.csv"),
            "\u{feff}campo_id;nome_campo;tipo_dado_id;obrigatorio_quando_ativo;formula_calculo\n\
             F001;nome_autor;T1;sim;\n\
             F002;valor_causa;T2;não;\n\
             F003;tipo_acao;T1;;\n\
             F004;valor_total;T2;;valor_causa * 2\n",
        )
        .unwrap();
        fs::write(
            dir.join("categorias_campos.csv"),
            "campo_id;categoria_1;subcategoria_1;ordem_exibicao\n\
             F001;Autor;Identificação;1\n\
             F002;Pedido;;2\n\
             F003;Pedido;;1\n",
        )
        .unwrap();
        fs::write(dir.join("regras_ativacao.csv"), rules).unwrap();
        fs::write(
            dir.join("tipos_dados.csv"),
            "tipo_dado_id;nome_tipo\nT1;texto\nT2;moeda\n",
        )
        .unwrap();
    }

    fn config(dir: &Path) -> SchemaConfig {
        SchemaConfig {
            dir: dir.to_path_buf(),
            ..SchemaConfig::default()
        }
    }

    const RULES: &str = "regra_id;secao_id;condicao;campo_id;obrigatorio_quando_ativo\n\
                         R1;DANOS;tipo_acao == 'indenizacao';F002;sim\n\
                         R1;DANOS;;F001;\n";

    #[test]
    fn loads_complete_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), RULES);
        let schema = load(&config(dir.path())).unwrap();

        assert!(matches!(schema.source(), SchemaSource::Relational { .. }));
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.value_kind_of("valor_causa"), ValueKind::Currency);
        let rule = schema.rule_for_section("DANOS").unwrap();
        assert_eq!(rule.condition, "tipo_acao == 'indenizacao'");
        assert_eq!(rule.required_fields, vec!["valor_causa", "nome_autor"]);

        let pedido: Vec<&str> = schema.fields_in_category("Pedido").iter().map(|f| f.name.as_str()).collect();
        assert_eq!(pedido, vec!["tipo_acao", "valor_causa"]);
        assert_eq!(
            schema.field_by_name("nome_autor").and_then(|f| f.subcategory.as_deref()),
            Some("Identificação")
        );
        assert!(schema.field_by_name("valor_total").unwrap().is_derived());
        assert!(schema.options().is_empty());
    }

    #[test]
    fn linking_form_becomes_condition() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(
            dir.path(),
            "secao_id;campo_vinculo_id;condicao_vinculo_tipo;condicao_vinculo_valor\n\
             TUTELA;F003;igual;urgente\n\
             OBS;F001;preenchido;\n\
             SEM_NOME;F001;vazio;\n",
        );
        let schema = load(&config(dir.path())).unwrap();
        assert_eq!(schema.rule_for_section("TUTELA").unwrap().condition, "tipo_acao == \"urgente\"");
        assert_eq!(schema.rule_for_section("OBS").unwrap().condition, "nome_autor != ''");
        assert_eq!(schema.rule_for_section("SEM_NOME").unwrap().condition, "NOT (nome_autor != '')");
    }

    #[test]
    fn conflicting_conditions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(
            dir.path(),
            "secao_id;condicao\nDANOS;tipo_acao == 'a'\nDANOS;tipo_acao == 'b'\n",
        );
        let err = load(&config(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaLoadError::ConflictingRule { ref section } if section == "DANOS"));
    }

    #[test]
    fn missing_and_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&config(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaLoadError::MissingTable { .. }));

        write_tables(dir.path(), "secao_id;condicao\n");
        let err = load(&config(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaLoadError::EmptyTable { ref table } if table == "regras_ativacao"));
    }

    #[test]
    fn unknown_field_in_rule_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), "secao_id;condicao;campo_id\nDANOS;;F404\n");
        let err = load(&config(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaLoadError::DanglingReference { ref reference, .. } if reference == "F404"));
    }

    #[test]
    fn options_table_is_read_when_present() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), RULES);
        fs::write(
            dir.path().join("opcoes_selecao.csv"),
            "campo_id;valor;rotulo\nF003;indenizacao;Indenização\nF003;cobranca;\n",
        )
        .unwrap();
        let schema = load(&config(dir.path())).unwrap();
        let labels: Vec<&str> = schema.options_for("tipo_acao").iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Indenização", "cobranca"]);
    }
}
