//! JSON records: a single object or an array of objects.

use peticiona_core::{DataLoadError, FieldValue, Record};
use serde_json::{Map, Value};

pub fn parse_json(text: &str) -> Result<Vec<Record>, DataLoadError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| DataLoadError::MalformedJson(e.to_string()))?;

    match root {
        Value::Object(map) => Ok(vec![to_record(0, &map)]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(to_record(index, map)),
                _ => Err(DataLoadError::NotAnObject { index }),
            })
            .collect(),
        _ => Err(DataLoadError::MalformedJson(
            "expected an object or an array of objects".into(),
        )),
    }
}

fn to_record(index: usize, map: &Map<String, Value>) -> Record {
    Record::new(
        index,
        map.iter()
            .map(|(k, v)| (k.trim().to_string(), FieldValue::from_json(v))),
    )
}
