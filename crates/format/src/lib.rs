//! Value Formatter: renders field values as document text by data kind.
//!
//! | Kind              | Input            | Output                         |
//! |-------------------|------------------|--------------------------------|
//! | `Currency`        | `1234.5`         | `R$ 1.234,50`                  |
//! | `SpelledCurrency` | `101`            | `cento e um reais`             |
//! | `SpelledNumber`   | `101`            | `cento e um`                   |
//! | `Date`            | `2024-03-09`     | `09/03/2024`                   |
//! | `Masked`          | `12345678909`    | `123.456.789-09`               |
//! | `Boolean`         | `true`           | `Sim`                          |
//! | `Number`          | `1234.5`         | `1.234,5`                      |
//!
//! A value that cannot be coerced to its kind is rendered as-is and a
//! [`Diagnostic::Formatting`] warning is returned alongside it.

pub mod date;
pub mod mask;
pub mod number;
pub mod words;

use peticiona_config::FormattingConfig;
use peticiona_core::{Diagnostic, FieldValue};
use peticiona_schema::{Schema, ValueKind};
use rust_decimal::Decimal;
use tracing::trace;

/// How one field should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFormat<'a> {
    pub kind: ValueKind,
    pub mask: Option<&'a str>,
}

impl<'a> FieldFormat<'a> {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind, mask: None }
    }

    pub fn with_mask(mut self, mask: Option<&'a str>) -> Self {
        self.mask = mask;
        self
    }

    /// Look the field up in the schema. Unknown fields render as text.
    pub fn for_field(schema: &'a Schema, name: &str) -> Self {
        Self {
            kind: schema.value_kind_of(name),
            mask: schema.mask_of(name),
        }
    }
}

/// Text to insert, plus a warning when the value had to fall back to raw.
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub text: String,
    pub diagnostic: Option<Diagnostic>,
}

/// Stateless formatter configured with locale tokens.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    config: FormattingConfig,
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::new(FormattingConfig::default())
    }
}

impl ValueFormatter {
    pub fn new(config: FormattingConfig) -> Self {
        Self { config }
    }

    /// Render `value` for `field`. Blank values render as an empty string.
    pub fn format(&self, field: &str, format: FieldFormat<'_>, value: &FieldValue) -> Formatted {
        if value.is_blank() {
            return Formatted {
                text: String::new(),
                diagnostic: None,
            };
        }
        match self.render(format, value) {
            Ok(text) => {
                trace!(field, kind = format.kind.label(), text = %text, "Formatted value");
                Formatted { text, diagnostic: None }
            }
            Err(detail) => {
                let raw = value.render();
                Formatted {
                    diagnostic: Some(Diagnostic::Formatting {
                        field: field.to_string(),
                        data_type: format.kind.label().to_string(),
                        value: raw.clone(),
                        detail,
                    }),
                    text: raw,
                }
            }
        }
    }

    fn render(&self, format: FieldFormat<'_>, value: &FieldValue) -> Result<String, String> {
        match format.kind {
            ValueKind::Currency => Ok(number::currency(decimal(value)?, &self.config.currency_symbol)),
            ValueKind::SpelledCurrency => {
                words::spell_currency(decimal(value)?).ok_or_else(|| "amount too large to spell".to_string())
            }
            ValueKind::SpelledNumber => {
                words::spell_number(decimal(value)?).ok_or_else(|| "number too large to spell".to_string())
            }
            ValueKind::Number => Ok(number::number(decimal(value)?)),
            ValueKind::Date => {
                let raw = value.render();
                let parsed = date::parse_date(&raw).ok_or_else(|| format!("'{raw}' is not a date"))?;
                date::render_date(parsed, &self.config.date_format)
            }
            ValueKind::Masked => match format.mask {
                Some(mask) => mask::apply_mask(&value.render(), mask),
                None => Ok(value.render()),
            },
            ValueKind::Boolean => match value.as_bool() {
                Some(true) => Ok(self.config.yes_token.clone()),
                Some(false) => Ok(self.config.no_token.clone()),
                None => Err(format!("'{}' is not a yes/no value", value.render())),
            },
            ValueKind::Text => Ok(value.render()),
        }
    }
}

fn decimal(value: &FieldValue) -> Result<Decimal, String> {
    value
        .as_decimal()
        .ok_or_else(|| format!("'{}' is not a number", value.render()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(kind: ValueKind, raw: &str) -> Formatted {
        ValueFormatter::default().format("campo", FieldFormat::new(kind), &FieldValue::from_cell(raw))
    }

    #[test]
    fn currency_examples() {
        assert_eq!(fmt(ValueKind::Currency, "1234.5").text, "R$ 1.234,50");
        assert_eq!(fmt(ValueKind::Currency, "0").text, "R$ 0,00");
        assert_eq!(fmt(ValueKind::Currency, "R$ 1.234,50").text, "R$ 1.234,50");
        let number = ValueFormatter::default().format(
            "valor",
            FieldFormat::new(ValueKind::Currency),
            &FieldValue::from(1500i64),
        );
        assert_eq!(number.text, "R$ 1.500,00");
    }

    #[test]
    fn spelled_examples() {
        assert_eq!(fmt(ValueKind::SpelledNumber, "101").text, "cento e um");
        assert_eq!(fmt(ValueKind::SpelledCurrency, "101").text, "cento e um reais");
    }

    #[test]
    fn dates_and_booleans() {
        assert_eq!(fmt(ValueKind::Date, "2024-03-09").text, "09/03/2024");
        assert_eq!(fmt(ValueKind::Boolean, "sim").text, "Sim");
        assert_eq!(fmt(ValueKind::Boolean, "false").text, "Não");
        let custom = ValueFormatter::new(FormattingConfig {
            date_format: "%d de %B de %Y".into(),
            ..FormattingConfig::default()
        });
        let text = custom
            .format("data", FieldFormat::new(ValueKind::Date), &FieldValue::text("09/03/2024"))
            .text;
        assert_eq!(text, "09 de March de 2024");
    }

    #[test]
    fn masks_apply_only_with_a_pattern() {
        let f = ValueFormatter::default();
        let cpf = FieldFormat::new(ValueKind::Masked).with_mask(Some("###.###.###-##"));
        assert_eq!(f.format("cpf", cpf, &FieldValue::text("12345678909")).text, "123.456.789-09");
        assert_eq!(fmt(ValueKind::Masked, "12345678909").text, "12345678909");
    }

    #[test]
    fn unformattable_value_falls_back_to_raw() {
        let out = fmt(ValueKind::Currency, "a combinar");
        assert_eq!(out.text, "a combinar");
        match out.diagnostic {
            Some(Diagnostic::Formatting { field, data_type, value, .. }) => {
                assert_eq!(field, "campo");
                assert_eq!(data_type, "currency");
                assert_eq!(value, "a combinar");
            }
            other => panic!("expected formatting warning, got {other:?}"),
        }
        assert!(fmt(ValueKind::Date, "ontem").diagnostic.is_some());
        assert!(fmt(ValueKind::Boolean, "talvez").diagnostic.is_some());
    }

    #[test]
    fn blank_values_render_empty() {
        let out = fmt(ValueKind::Currency, "  ");
        assert_eq!(out.text, "");
        assert!(out.diagnostic.is_none());
    }

    #[test]
    fn field_format_comes_from_schema() {
        use peticiona_schema::{Category, DataType, FieldDefinition, SchemaParts, SchemaSource};
        let mut cpf = FieldDefinition::new("F1", "cpf_autor", "T1");
        cpf.category = Some("Autor".into());
        let schema = Schema::from_parts(
            SchemaSource::Legacy { path: "m.json".into() },
            SchemaParts {
                fields: vec![cpf],
                categories: vec![Category::new("Autor", 1)],
                data_types: vec![DataType::new("T1", "cpf", Some("###.###.###-##".into()))],
                ..SchemaParts::default()
            },
        )
        .unwrap();
        let format = FieldFormat::for_field(&schema, "cpf_autor");
        assert_eq!(format.kind, ValueKind::Masked);
        assert_eq!(format.mask, Some("###.###.###-##"));
        assert_eq!(FieldFormat::for_field(&schema, "desconhecido").kind, ValueKind::Text);
    }
}
