//! Records: one ordered field → value mapping per input row or object.

use crate::value::FieldValue;
use std::collections::HashMap;

/// Anything that can answer "what is the value of field X".
///
/// Implemented by [`Record`] and by the rule engine's resolved record
/// (raw values plus derived ones), so the condition evaluator and the
/// formatter never need to know which of the two they are reading.
pub trait FieldLookup {
    fn lookup(&self, name: &str) -> Option<&FieldValue>;

    /// True when the field exists and holds something other than blank.
    fn has_value(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|v| !v.is_blank())
    }
}

/// One input record. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    index: usize,
    fields: Vec<(String, FieldValue)>,
    positions: HashMap<String, usize>,
}

impl Record {
    /// Build a record from ordered pairs. Names are trimmed; if a name
    /// repeats, the last value wins but the first position is kept.
    pub fn new(index: usize, pairs: impl IntoIterator<Item = (String, FieldValue)>) -> Self {
        let mut fields: Vec<(String, FieldValue)> = Vec::new();
        let mut positions = HashMap::new();
        for (name, value) in pairs {
            let name = name.trim().to_string();
            match positions.get(&name) {
                Some(&pos) => fields[pos] = (name, value),
                None => {
                    positions.insert(name.clone(), fields.len());
                    fields.push((name, value));
                }
            }
        }
        Self {
            index,
            fields,
            positions,
        }
    }

    /// Zero-based position of this record in its source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.positions.get(name).map(|&pos| &self.fields[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Fields in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldLookup for Record {
    fn lookup(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

impl FieldLookup for HashMap<String, FieldValue> {
    fn lookup(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(
            3,
            vec![
                (" nome_autor ".to_string(), FieldValue::text("Maria")),
                ("valor_causa".to_string(), FieldValue::from(1500)),
                ("observacao".to_string(), FieldValue::Null),
            ],
        )
    }

    #[test]
    fn keeps_order_and_trims_names() {
        let record = sample();
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["nome_autor", "valor_causa", "observacao"]);
        assert_eq!(record.index(), 3);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let record = sample();
        assert_eq!(record.get("nome_autor"), Some(&FieldValue::text("Maria")));
        assert_eq!(record.get("Nome_Autor"), None);
    }

    #[test]
    fn has_value_ignores_blank() {
        let record = sample();
        assert!(record.has_value("valor_causa"));
        assert!(!record.has_value("observacao"));
        assert!(!record.has_value("inexistente"));
    }

    #[test]
    fn repeated_name_keeps_first_position() {
        let record = Record::new(
            0,
            vec![
                ("a".to_string(), FieldValue::text("1")),
                ("b".to_string(), FieldValue::text("2")),
                ("a".to_string(), FieldValue::text("3")),
            ],
        );
        let pairs: Vec<(&str, String)> = record.iter().map(|(k, v)| (k, v.render())).collect();
        assert_eq!(pairs, vec![("a", "3".to_string()), ("b", "2".to_string())]);
    }
}
