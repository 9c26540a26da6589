//! Raw field values as they arrive from CSV cells or JSON documents.
//!
//! A `FieldValue` keeps what the source said; coercion to numbers or
//! booleans happens on demand so the same record can be read as text by
//! one placeholder and as an amount by a formula.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// A single raw value of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    /// Empty cell, JSON `null`, or a field that was never provided.
    #[default]
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Build a value from a CSV cell: trimmed, and empty cells become `Null`.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    /// Build a value from a JSON scalar. Arrays are joined with `", "`,
    /// nested objects are kept as their compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                let repr = n.to_string();
                Decimal::from_str(&repr)
                    .or_else(|_| Decimal::from_scientific(&repr))
                    .map(FieldValue::Number)
                    .unwrap_or(FieldValue::Text(repr))
            }
            serde_json::Value::String(s) => FieldValue::from_cell(s),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(FieldValue::from_json)
                    .filter(|v| !v.is_blank())
                    .map(|v| v.render())
                    .collect();
                if parts.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(parts.join(", "))
                }
            }
            serde_json::Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    /// True for `Null` and for whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the value. Text accepts `1234.5`, `1.234,50`
    /// and an optional `R$` prefix.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_decimal(s),
            FieldValue::Bool(_) | FieldValue::Null => None,
        }
    }

    /// Boolean reading of the value (`sim`/`não`, `true`/`false`, `1`/`0`, ...).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Number(n) => Some(!n.is_zero()),
            FieldValue::Text(s) => parse_bool_word(s),
            FieldValue::Null => None,
        }
    }

    /// The value as plain text, exactly as it would appear unformatted.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Decimal> for FieldValue {
    fn from(n: Decimal) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(Decimal::from(n))
    }
}

/// Parse a number written either the Brazilian way (`1.234,50`) or the
/// plain way (`1234.5`). A leading `R$` and inner spaces are ignored.
///
/// A lone dot followed by exactly three digits after a short non-zero
/// integer part (`1.234`) is read as a thousands separator.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    let (negative, rest) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.strip_prefix('+').unwrap_or(&compact)),
    };
    let rest = rest.strip_prefix("R$").unwrap_or(rest);
    let (negative, rest) = match rest.strip_prefix('-') {
        Some(inner) if !negative => (true, inner),
        _ => (negative, rest),
    };
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    if !rest.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = rest.matches(',').count();
    let dots = rest.matches('.').count();
    let normalized = match (rest.rfind(','), rest.rfind('.')) {
        (Some(c), Some(d)) if c > d => {
            if commas > 1 {
                return None;
            }
            rest.replace('.', "").replace(',', ".")
        }
        (Some(_), Some(_)) => {
            if dots > 1 {
                return None;
            }
            rest.replace(',', "")
        }
        (Some(_), None) if commas > 1 => rest.replace(',', ""),
        (Some(_), None) => rest.replace(',', "."),
        (None, Some(_)) if dots > 1 => rest.replace('.', ""),
        (None, Some(d)) => {
            let (int_part, frac_part) = (&rest[..d], &rest[d + 1..]);
            let grouped = frac_part.len() == 3
                && (1..=3).contains(&int_part.len())
                && !int_part.starts_with('0');
            if grouped {
                rest.replace('.', "")
            } else {
                rest.to_string()
            }
        }
        (None, None) => rest.to_string(),
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Interpret a yes/no word. Returns `None` for anything unrecognised.
pub fn parse_bool_word(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "sim" | "s" | "yes" | "y" | "true" | "t" | "1" | "verdadeiro" => Some(true),
        "não" | "nao" | "n" | "no" | "false" | "f" | "0" | "falso" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_brazilian_and_plain_numbers() {
        assert_eq!(parse_decimal("1.234,50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("1234.5"), Some(dec("1234.5")));
        assert_eq!(parse_decimal("R$ 1.234,50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("1,5"), Some(dec("1.5")));
        assert_eq!(parse_decimal("1.000.000"), Some(dec("1000000")));
        assert_eq!(parse_decimal("1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("-R$ 10,00"), Some(dec("-10.00")));
        assert_eq!(parse_decimal("R$ -10,00"), Some(dec("-10.00")));
    }

    #[test]
    fn lone_dot_with_three_digits_is_grouping() {
        assert_eq!(parse_decimal("1.234"), Some(dec("1234")));
        assert_eq!(parse_decimal("0.125"), Some(dec("0.125")));
        assert_eq!(parse_decimal("12.5"), Some(dec("12.5")));
    }

    #[test]
    fn rejects_non_numbers() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("12a"), None);
        assert_eq!(parse_decimal("R$"), None);
        assert_eq!(parse_decimal("1.2.3,4,5"), None);
    }

    #[test]
    fn bool_words() {
        assert_eq!(parse_bool_word("Sim"), Some(true));
        assert_eq!(parse_bool_word(" NÃO "), Some(false));
        assert_eq!(parse_bool_word("nao"), Some(false));
        assert_eq!(parse_bool_word("talvez"), None);
    }

    #[test]
    fn cells_are_trimmed_and_empty_is_null() {
        assert_eq!(FieldValue::from_cell("  Maria "), FieldValue::text("Maria"));
        assert_eq!(FieldValue::from_cell("   "), FieldValue::Null);
    }

    #[test]
    fn json_scalars_map_to_values() {
        use serde_json::json;
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(1234.5)), FieldValue::Number(dec("1234.5")));
        assert_eq!(FieldValue::from_json(&json!(["a", "b"])), FieldValue::text("a, b"));
        assert_eq!(FieldValue::from_json(&json!("")), FieldValue::Null);
    }

    #[test]
    fn coercions() {
        assert!(FieldValue::text("   ").is_blank());
        assert!(!FieldValue::Bool(false).is_blank());
        assert_eq!(FieldValue::text("sim").as_bool(), Some(true));
        assert_eq!(FieldValue::from(0).as_bool(), Some(false));
        assert_eq!(FieldValue::text("2.500,00").as_decimal(), Some(dec("2500.00")));
        assert_eq!(FieldValue::Bool(true).as_decimal(), None);
        assert_eq!(FieldValue::from(dec("10.50")).render(), "10.50");
    }
}
