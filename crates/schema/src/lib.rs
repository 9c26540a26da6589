//! # Peticiona Schema
//!
//! The field definition model: which fields exist, how they are typed,
//! grouped and validated, and which rules switch template sections on.
//!
//! Two sources feed the same [`Schema`]:
//!
//! ```text
//!   campos_definicao.csv ┐
//!   categorias_campos.csv│
//!   regras_ativacao.csv  ├─► relational::load ──┐
//!   tipos_dados.csv      │                      ├─► Schema (tagged with its SchemaSource)
//!   opcoes_selecao.csv   ┘                      │
//!   mapping_campos_definicao.json ─► legacy::load (only when the tables fail)
//! ```
//!
//! The schema is loaded once and shared read-only by every record.

pub mod legacy;
pub mod model;
pub mod relational;

pub use model::{ActivationRule, Category, DataType, FieldDefinition, SelectOption, ValueKind};

use peticiona_config::SchemaConfig;
use peticiona_core::SchemaLoadError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

/// Where a loaded schema came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaSource {
    Relational { dir: PathBuf },
    Legacy { path: PathBuf },
}

impl std::fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaSource::Relational { dir } => write!(f, "relational tables in {}", dir.display()),
            SchemaSource::Legacy { path } => write!(f, "legacy mapping {}", path.display()),
        }
    }
}

/// The raw entity lists a schema is assembled from.
#[derive(Debug, Clone, Default)]
pub struct SchemaParts {
    pub fields: Vec<FieldDefinition>,
    pub categories: Vec<Category>,
    pub rules: Vec<ActivationRule>,
    pub data_types: Vec<DataType>,
    pub options: Vec<SelectOption>,
}

/// The immutable field definition model.
#[derive(Debug, Clone)]
pub struct Schema {
    source: SchemaSource,
    fields: Vec<FieldDefinition>,
    categories: Vec<Category>,
    rules: Vec<ActivationRule>,
    data_types: Vec<DataType>,
    options: Vec<SelectOption>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
    types_by_id: HashMap<String, usize>,
    rules_by_section: HashMap<String, usize>,
}

impl Schema {
    /// Load the relational tables, falling back to the legacy mapping.
    pub fn load(config: &SchemaConfig) -> Result<Self, SchemaLoadError> {
        Self::load_with(config, Ok)
    }

    /// Load a schema and run `build` on it. A failure of `build` on the
    /// relational schema also triggers the legacy fallback, so later
    /// compilation steps (condition parsing, derived-field ordering) count
    /// as part of "the tables are usable".
    pub fn load_with<T>(
        config: &SchemaConfig,
        build: impl Fn(Schema) -> Result<T, SchemaLoadError>,
    ) -> Result<T, SchemaLoadError> {
        match relational::load(config).and_then(&build) {
            Ok(built) => Ok(built),
            Err(relational) => {
                warn!(error = %relational, "Relational schema unusable, trying legacy mapping");
                legacy::load(&config.legacy_path())
                    .and_then(&build)
                    .map_err(|legacy| SchemaLoadError::Unavailable {
                        relational: Box::new(relational),
                        legacy: Box::new(legacy),
                    })
            }
        }
    }

    /// Validate entity lists and build the lookup indexes.
    pub fn from_parts(source: SchemaSource, parts: SchemaParts) -> Result<Self, SchemaLoadError> {
        let SchemaParts {
            fields,
            mut categories,
            rules,
            data_types,
            options,
        } = parts;
        let table = match &source {
            SchemaSource::Relational { .. } => "campos_definicao",
            SchemaSource::Legacy { .. } => "mapping_campos_definicao",
        };

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, field) in fields.iter().enumerate() {
            if by_id.insert(field.id.clone(), idx).is_some() {
                return Err(SchemaLoadError::DuplicateField {
                    what: "id".into(),
                    value: field.id.clone(),
                });
            }
            if by_name.insert(field.name.clone(), idx).is_some() {
                return Err(SchemaLoadError::DuplicateField {
                    what: "name".into(),
                    value: field.name.clone(),
                });
            }
        }

        let types_by_id: HashMap<String, usize> = data_types
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.id.clone(), idx))
            .collect();
        for field in &fields {
            if !types_by_id.contains_key(&field.data_type) {
                return Err(dangling(table, "data type", &field.data_type));
            }
        }

        let known_categories: HashSet<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        for category in fields.iter().filter_map(|f| f.category.as_deref()) {
            if !known_categories.contains(category) {
                return Err(dangling(table, "category", category));
            }
        }

        for option in &options {
            if !by_id.contains_key(&option.field_id) {
                return Err(dangling("opcoes_selecao", "field", &option.field_id));
            }
        }

        let mut rules_by_section = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            if rules_by_section.insert(rule.section_id.clone(), idx).is_some() {
                return Err(SchemaLoadError::ConflictingRule {
                    section: rule.section_id.clone(),
                });
            }
            for name in &rule.required_fields {
                if !by_name.contains_key(name) {
                    return Err(dangling("regras_ativacao", "field", name));
                }
            }
        }

        categories.sort_by_key(|c| c.display_order);

        Ok(Self {
            source,
            fields,
            categories,
            rules,
            data_types,
            options,
            by_name,
            by_id,
            types_by_id,
            rules_by_section,
        })
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Categories in display order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn rules(&self) -> &[ActivationRule] {
        &self.rules
    }

    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn field_by_id(&self, id: &str) -> Option<&FieldDefinition> {
        self.by_id.get(id).map(|&idx| &self.fields[idx])
    }

    /// Fields of a category (by name or id), in display order.
    pub fn fields_in_category(&self, category: &str) -> Vec<&FieldDefinition> {
        let wanted = model::category_id(category);
        let mut fields: Vec<&FieldDefinition> = self
            .fields
            .iter()
            .filter(|f| {
                f.category
                    .as_deref()
                    .is_some_and(|c| c == category || model::category_id(c) == wanted)
            })
            .collect();
        fields.sort_by_key(|f| f.display_order);
        fields
    }

    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.field_by_name(name)?.category.as_deref()
    }

    pub fn rule_for_section(&self, section_id: &str) -> Option<&ActivationRule> {
        self.rules_by_section.get(section_id).map(|&idx| &self.rules[idx])
    }

    /// Sections governed by at least one rule.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.section_id.as_str())
    }

    /// True when the field is flagged required, or some rule requires it
    /// while its section is active.
    pub fn is_required_when_active(&self, name: &str) -> bool {
        self.field_by_name(name).is_some_and(|f| f.required_when_active)
            || self.rules.iter().any(|r| r.required_fields.iter().any(|f| f == name))
    }

    /// True when some activation rule lists this field.
    pub fn is_rule_bound(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.required_fields.iter().any(|f| f == name))
    }

    pub fn options_for(&self, name: &str) -> Vec<&SelectOption> {
        match self.field_by_name(name) {
            Some(field) => self.options.iter().filter(|o| o.field_id == field.id).collect(),
            None => Vec::new(),
        }
    }

    pub fn data_type_of(&self, name: &str) -> Option<&DataType> {
        let field = self.field_by_name(name)?;
        self.types_by_id.get(&field.data_type).map(|&idx| &self.data_types[idx])
    }

    /// Rendering kind of a field; unknown fields are plain text.
    pub fn value_kind_of(&self, name: &str) -> ValueKind {
        let Some(field) = self.field_by_name(name) else {
            return ValueKind::Text;
        };
        match self.data_type_of(name) {
            Some(t) if t.kind == ValueKind::Text && field.mask.as_deref().is_some_and(|m| m.contains('#')) => {
                ValueKind::Masked
            }
            Some(t) => t.kind,
            None => ValueKind::Text,
        }
    }

    /// The field's own mask, else its data type's.
    pub fn mask_of(&self, name: &str) -> Option<&str> {
        let field = self.field_by_name(name)?;
        field
            .mask
            .as_deref()
            .or_else(|| self.data_type_of(name).and_then(|t| t.mask.as_deref()))
    }

    pub(crate) fn log_loaded(&self) {
        info!(
            source = %self.source,
            fields = self.fields.len(),
            categories = self.categories.len(),
            rules = self.rules.len(),
            options = self.options.len(),
            "Schema loaded"
        );
    }
}

fn dangling(table: &str, entity: &str, reference: &str) -> SchemaLoadError {
    SchemaLoadError::DanglingReference {
        table: table.to_string(),
        entity: entity.to_string(),
        reference: reference.to_string(),
    }
}
