//! Value validation against option sets and validation patterns.

use peticiona_core::{Diagnostic, FieldValue};
use peticiona_schema::{FieldDefinition, Schema};
use regex_lite::Regex;

/// Compiled checks for one field.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    field: String,
    options: Vec<(String, String)>,
    pattern: Option<(String, Regex)>,
}

impl FieldValidator {
    /// Build the validator for a field, or `None` when it has nothing to check.
    /// The pattern must match the whole value.
    pub fn compile(schema: &Schema, field: &FieldDefinition) -> Result<Option<Self>, String> {
        let options: Vec<(String, String)> = schema
            .options_for(&field.name)
            .into_iter()
            .map(|o| (o.value.clone(), o.label.clone()))
            .collect();
        let pattern = match field.regex.as_deref() {
            Some(raw) => {
                let re = Regex::new(&format!("^(?:{raw})$")).map_err(|e| format!("invalid regex '{raw}': {e}"))?;
                Some((raw.to_string(), re))
            }
            None => None,
        };
        if options.is_empty() && pattern.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            field: field.name.clone(),
            options,
            pattern,
        }))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Check one present value. Blank values are never invalid.
    pub fn check(&self, value: &FieldValue) -> Option<Diagnostic> {
        if value.is_blank() {
            return None;
        }
        let text = value.render();
        let text = text.trim();

        if !self.options.is_empty() {
            let wanted = text.to_lowercase();
            let listed = self
                .options
                .iter()
                .any(|(v, l)| v.trim().to_lowercase() == wanted || l.trim().to_lowercase() == wanted);
            if !listed {
                let allowed: Vec<&str> = self.options.iter().map(|(v, _)| v.as_str()).collect();
                return Some(Diagnostic::InvalidValue {
                    field: self.field.clone(),
                    value: text.to_string(),
                    detail: format!("not one of: {}", allowed.join(", ")),
                });
            }
        }

        if let Some((raw, re)) = &self.pattern {
            if !re.is_match(text) {
                return Some(Diagnostic::InvalidValue {
                    field: self.field.clone(),
                    value: text.to_string(),
                    detail: format!("does not match pattern {raw}"),
                });
            }
        }

        None
    }
}
