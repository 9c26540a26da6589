//! The legacy single-file mapping, used only when the tables fail.
//!
//! ```json
//! {
//!   "campos": { "nome_autor": { "campo_id": "F001", "categoria": "Autor", ... } },
//!   "secoes": { "DANOS": { "condicao": "...", "campos_obrigatorios": ["valor_causa"] } }
//! }
//! ```

use crate::model::{flag, ActivationRule, Category, DataType, FieldDefinition, SelectOption};
use crate::{Schema, SchemaParts, SchemaSource};
use peticiona_core::SchemaLoadError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_TYPE: &str = "texto";

#[derive(Debug, Deserialize)]
struct Mapping {
    campos: BTreeMap<String, LegacyField>,
    #[serde(default)]
    secoes: BTreeMap<String, LegacySection>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyField {
    #[serde(default)]
    campo_id: Option<String>,
    #[serde(default)]
    nome_campo: Option<String>,
    #[serde(default)]
    categoria: Option<String>,
    #[serde(default)]
    tipo_dado_programacao: Option<String>,
    #[serde(default)]
    obrigatorio_quando_ativo: Option<Value>,
    #[serde(default)]
    valor_padrao: Option<Value>,
    #[serde(default)]
    opcoes_valores: Option<Value>,
    #[serde(default)]
    mascara_formato: Option<String>,
    #[serde(default)]
    regex_validacao: Option<String>,
    #[serde(default)]
    visivel_quando: Option<String>,
    #[serde(default)]
    calcular_quando: Option<String>,
    #[serde(default)]
    formula_calculo: Option<String>,
    #[serde(default)]
    ordem_exibicao: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacySection {
    #[serde(default)]
    condicao: Option<String>,
    #[serde(default)]
    campos_obrigatorios: Vec<String>,
}

/// Load the mapping file into a reduced but equivalent schema.
pub fn load(path: &Path) -> Result<Schema, SchemaLoadError> {
    if !path.exists() {
        return Err(SchemaLoadError::MissingTable {
            path: path.to_path_buf(),
        });
    }
    let invalid = |reason: String| SchemaLoadError::InvalidLegacyMapping {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let mapping: Mapping =
        serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| invalid(e.to_string()))?;
    if mapping.campos.is_empty() {
        return Err(invalid("no fields under \"campos\"".into()));
    }

    let schema = Schema::from_parts(
        SchemaSource::Legacy {
            path: path.to_path_buf(),
        },
        convert(mapping),
    )?;
    schema.log_loaded();
    Ok(schema)
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => clean(Some(s.clone())),
        other => Some(other.to_string()),
    }
}

fn json_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(other) => flag(scalar_text(other).as_deref()),
        None => false,
    }
}

fn option_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(';')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    }
}

fn convert(mapping: Mapping) -> SchemaParts {
    let mut parts = SchemaParts::default();

    for (position, (key, legacy)) in mapping.campos.into_iter().enumerate() {
        let name = clean(legacy.nome_campo).unwrap_or_else(|| key.trim().to_string());
        let id = clean(legacy.campo_id).unwrap_or_else(|| name.clone());
        let type_name = clean(legacy.tipo_dado_programacao).unwrap_or_else(|| DEFAULT_TYPE.into());
        let mask = clean(legacy.mascara_formato);

        if !parts.data_types.iter().any(|t| t.id == type_name) {
            parts
                .data_types
                .push(DataType::new(type_name.clone(), type_name.clone(), None));
        }

        let category = clean(legacy.categoria);
        if let Some(cat) = &category {
            if !parts.categories.iter().any(|c| &c.name == cat) {
                let order = parts.categories.len() as u32 + 1;
                parts.categories.push(Category::new(cat, order));
            }
        }

        for value in option_values(legacy.opcoes_valores.as_ref()) {
            parts.options.push(SelectOption {
                field_id: id.clone(),
                label: value.clone(),
                value,
            });
        }

        let mut field = FieldDefinition::new(id, name, type_name);
        field.category = category;
        field.required_when_active = json_flag(legacy.obrigatorio_quando_ativo.as_ref());
        field.default = legacy.valor_padrao.as_ref().and_then(scalar_text);
        field.mask = mask;
        field.regex = clean(legacy.regex_validacao);
        field.visible_when = clean(legacy.visivel_quando);
        field.calc_when = clean(legacy.calcular_quando);
        field.formula = clean(legacy.formula_calculo);
        field.display_order = legacy.ordem_exibicao.unwrap_or(position as u32 + 1);
        parts.fields.push(field);
    }

    for (section, legacy) in mapping.secoes {
        let section = section.trim().to_string();
        parts.rules.push(ActivationRule {
            id: format!("R_{section}"),
            condition: clean(legacy.condicao).unwrap_or_default(),
            required_fields: legacy
                .campos_obrigatorios
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            section_id: section,
        });
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;
    use pretty_assertions::assert_eq;

    const MAPPING: &str = r#"{
        "campos": {
            "nome_autor": {
                "campo_id": "F001",
                "categoria": "Autor",
                "tipo_dado_programacao": "texto",
                "obrigatorio_quando_ativo": true
            },
            "valor_causa": {
                "campo_id": "F002",
                "categoria": "Pedido",
                "tipo_dado_programacao": "moeda",
                "obrigatorio_quando_ativo": "não"
            },
            "tipo_acao": {
                "campo_id": "F003",
                "categoria": "Pedido",
                "opcoes_valores": "indenizacao; cobranca"
            }
        },
        "secoes": {
            "DANOS": { "condicao": "tipo_acao == 'indenizacao'", "campos_obrigatorios": ["valor_causa"] }
        }
    }"#;

    #[test]
    fn converts_mapping_to_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping_campos_definicao.json");
        std::fs::write(&path, MAPPING).unwrap();

        let schema = load(&path).unwrap();
        assert!(matches!(schema.source(), SchemaSource::Legacy { .. }));
        assert_eq!(schema.fields().len(), 3);
        assert!(schema.field_by_name("nome_autor").unwrap().required_when_active);
        assert!(!schema.field_by_name("valor_causa").unwrap().required_when_active);
        assert_eq!(schema.value_kind_of("valor_causa"), ValueKind::Currency);
        assert_eq!(schema.value_kind_of("tipo_acao"), ValueKind::Text);

        let values: Vec<&str> = schema.options_for("tipo_acao").iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["indenizacao", "cobranca"]);
        assert_eq!(
            schema.rule_for_section("DANOS").unwrap().required_fields,
            vec!["valor_causa"]
        );
    }

    #[test]
    fn missing_and_broken_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        assert!(matches!(load(&path), Err(SchemaLoadError::MissingTable { .. })));

        std::fs::write(&path, "{\"campos\": {}}").unwrap();
        assert!(matches!(load(&path), Err(SchemaLoadError::InvalidLegacyMapping { .. })));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load(&path), Err(SchemaLoadError::InvalidLegacyMapping { .. })));
    }
}
