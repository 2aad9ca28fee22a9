//! Firestore REST value types and JSON conversion.
//!
//! Records are serialized through `serde_json` and converted to the
//! Firestore wire representation here, so every model type round-trips
//! without per-field mapping code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }
}

/// Convert a JSON value to a Firestore value.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(value_from_json).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), value_from_json(v)))
                    .collect(),
            ),
        }),
    }
}

/// Convert a Firestore value back to JSON.
pub fn json_from_value(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::ArrayValue(arr) => serde_json::Value::Array(
            arr.values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(json_from_value)
                .collect(),
        ),
        Value::MapValue(map) => serde_json::Value::Object(
            map.fields
                .as_ref()
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), json_from_value(v)))
                        .collect()
                })
                .unwrap_or_default(),
        ),
    }
}

/// Convert a serializable record into a Firestore field map.
pub fn fields_from_record<T: Serialize>(record: &T) -> crate::StoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(record)?;
    match json {
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), value_from_json(v)))
            .collect()),
        _ => Err(crate::StoreError::serialization(
            "record did not serialize to an object",
        )),
    }
}

/// Convert a Firestore field map back into a record.
pub fn record_from_fields<T: for<'de> Deserialize<'de>>(
    fields: &HashMap<String, Value>,
) -> crate::StoreResult<T> {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), json_from_value(v)))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

/// Build a nested field map from dotted leaf paths, for partial updates:
/// `assets.final_url` becomes `{assets: {final_url: ...}}` in the body while
/// the update mask keeps the dotted path.
pub fn nest_fields(entries: &[(String, serde_json::Value)]) -> HashMap<String, Value> {
    let mut root = serde_json::Map::new();

    for (path, leaf) in entries {
        let mut cursor = &mut root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                cursor.insert(segment.to_string(), leaf.clone());
            } else {
                cursor = cursor
                    .entry(segment.to_string())
                    .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()))
                    .as_object_mut()
                    .expect("intermediate path segments are objects");
            }
        }
    }

    root.iter()
        .map(|(k, v)| (k.clone(), value_from_json(v)))
        .collect()
}
