//! Schema entities: fields, categories, data types, rules and options.

use serde::Serialize;

/// One field of the interview form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub id: String,
    /// The name placeholders and records use
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Id of the field's [`DataType`]
    pub data_type: String,
    pub control_type: Option<String>,
    pub required_when_active: bool,
    pub default: Option<String>,
    /// Digit mask, `#` standing for one digit
    pub mask: Option<String>,
    pub regex: Option<String>,
    pub visible_when: Option<String>,
    pub calc_when: Option<String>,
    pub formula: Option<String>,
    pub display_order: u32,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            subcategory: None,
            data_type: data_type.into(),
            control_type: None,
            required_when_active: false,
            default: None,
            mask: None,
            regex: None,
            visible_when: None,
            calc_when: None,
            formula: None,
            display_order: 0,
        }
    }

    /// A field whose value can be computed from other fields.
    pub fn is_derived(&self) -> bool {
        self.formula.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub display_order: u32,
}

impl Category {
    pub fn new(name: &str, display_order: u32) -> Self {
        Self {
            id: category_id(name),
            name: name.to_string(),
            display_order,
        }
    }
}

pub(crate) fn category_id(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// How values of a data type are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Currency,
    SpelledCurrency,
    SpelledNumber,
    Date,
    Masked,
    Boolean,
    Number,
    Text,
}

impl ValueKind {
    /// Infer the kind from a data-type name and its optional mask.
    pub fn infer(type_name: &str, mask: Option<&str>) -> Self {
        let name = fold(type_name);
        let has = |keys: &[&str]| keys.iter().any(|k| name.contains(k));
        let money = has(&["moeda", "dinheiro", "monetari", "currency", "reais"]);

        if has(&["extenso", "words"]) {
            if money { ValueKind::SpelledCurrency } else { ValueKind::SpelledNumber }
        } else if money {
            ValueKind::Currency
        } else if has(&["data", "date"]) {
            ValueKind::Date
        } else if has(&["cpf", "cnpj", "cep", "mascara", "masked"])
            || mask.is_some_and(|m| m.contains('#'))
        {
            ValueKind::Masked
        } else if has(&["booleano", "bool", "sim_nao"]) {
            ValueKind::Boolean
        } else if has(&["inteiro", "decimal", "numero", "number", "integer"]) {
            ValueKind::Number
        } else {
            ValueKind::Text
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Currency => "currency",
            ValueKind::SpelledCurrency => "spelled currency",
            ValueKind::SpelledNumber => "spelled number",
            ValueKind::Date => "date",
            ValueKind::Masked => "masked text",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
        }
    }
}

/// Lowercase and strip the Portuguese accents that show up in type names.
fn fold(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataType {
    pub id: String,
    pub name: String,
    pub mask: Option<String>,
    pub kind: ValueKind,
}

impl DataType {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mask: Option<String>) -> Self {
        let name = name.into();
        let kind = ValueKind::infer(&name, mask.as_deref());
        Self {
            id: id.into(),
            name,
            mask,
            kind,
        }
    }
}

/// A section's trigger condition and the fields it makes required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationRule {
    pub id: String,
    pub section_id: String,
    /// Condition source text; empty means always active
    pub condition: String,
    /// Field names
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub field_id: String,
    pub value: String,
    pub label: String,
}

/// Interpret a `sim`/`não` style flag cell. Empty means `false`.
pub(crate) fn flag(raw: Option<&str>) -> bool {
    raw.and_then(peticiona_core::parse_bool_word).unwrap_or(false)
}
