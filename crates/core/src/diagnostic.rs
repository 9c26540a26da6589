//! Non-fatal findings collected while assembling one record.
//!
//! A diagnostic never stops a record: the value degrades (empty string,
//! raw text, inactive section) and the finding is reported instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A placeholder had no resolvable value; an empty string was substituted.
    #[error("Missing value for {} field '{field}'", requirement(.required))]
    MissingField { field: String, required: bool },

    /// A placeholder names no known field definition.
    #[error("Placeholder '{{{{{token}}}}}' has no field definition")]
    UnmappedPlaceholder { token: String },

    /// An activation condition could not be evaluated; the section is inactive.
    #[error("Activation rule for section '{section}' failed: {detail}")]
    ActivationRule { section: String, detail: String },

    /// A value could not be rendered as its declared type; raw text was used.
    #[error("Cannot format field '{field}' as {data_type} ('{value}'): {detail}")]
    Formatting {
        field: String,
        data_type: String,
        value: String,
        detail: String,
    },

    /// A derived field could not be computed and stays unresolved.
    #[error("Derived field '{field}' not computed: {detail}")]
    DerivedField { field: String, detail: String },

    /// A value violates its option set or validation pattern.
    #[error("Field '{field}' has invalid value '{value}': {detail}")]
    InvalidValue {
        field: String,
        value: String,
        detail: String,
    },

    /// The template contains a section that no activation rule governs.
    #[error("Section '{section}' has no activation rule and was removed")]
    UnknownSection { section: String },
}

fn requirement(required: &bool) -> &'static str {
    if *required { "required" } else { "optional" }
}

impl Diagnostic {
    /// Short machine-readable kind, matching the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::MissingField { .. } => "missing_field",
            Diagnostic::UnmappedPlaceholder { .. } => "unmapped_placeholder",
            Diagnostic::ActivationRule { .. } => "activation_rule",
            Diagnostic::Formatting { .. } => "formatting",
            Diagnostic::DerivedField { .. } => "derived_field",
            Diagnostic::InvalidValue { .. } => "invalid_value",
            Diagnostic::UnknownSection { .. } => "unknown_section",
        }
    }

    /// Emit this diagnostic as a `warn!` event for the given record.
    pub fn log(&self, record: usize) {
        tracing::warn!(record, kind = self.kind(), "{}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let missing = Diagnostic::MissingField {
            field: "cpf_autor".into(),
            required: true,
        };
        assert_eq!(missing.to_string(), "Missing value for required field 'cpf_autor'");

        let unmapped = Diagnostic::UnmappedPlaceholder {
            token: "nome_reu".into(),
        };
        assert_eq!(
            unmapped.to_string(),
            "Placeholder '{{nome_reu}}' has no field definition"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let diag = Diagnostic::UnknownSection {
            section: "TUTELA".into(),
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["kind"], "unknown_section");
        assert_eq!(json["section"], "TUTELA");
        assert_eq!(diag.kind(), "unknown_section");

        let back: Diagnostic = serde_json::from_value(json).unwrap();
        assert_eq!(back, diag);
    }
}
