use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::interfaces::document_store::ArrayOp;
use crate::middleware::error::{AppError, AppResult};

/// A stored record: a JSON object whose `id` field holds `<collection>:<key>`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "id";

pub fn new_record_id(collection: &str) -> String {
    format!("{collection}:{}", Uuid::new_v4().simple())
}

pub fn to_document<T: Serialize>(value: &T) -> AppResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Serde {
            source: format!("expected an object, got {other}"),
        }),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> AppResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

pub fn document_id(document: &Document) -> AppResult<&str> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Store {
            source: "document without id".to_string(),
        })
}

/// Resolves a dotted path (`owner.username`) inside a document.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate objects.
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = document
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Shallow-merges `patch` into `document`.
///
/// With `validate` set, the patch may not touch `id` and may not change the
/// JSON type of a field that already holds a non-null value.
pub fn apply_patch(mut document: Document, patch: Document, validate: bool) -> AppResult<Document> {
    if validate {
        for (key, value) in patch.iter() {
            if key == ID_FIELD {
                return Err(AppError::InvalidInput {
                    description: "id can not be updated".to_string(),
                });
            }
            if let Some(current) = document.get(key) {
                if !current.is_null() && !value.is_null() && !same_kind(current, value) {
                    return Err(AppError::InvalidInput {
                        description: format!("field '{key}' has the wrong type"),
                    });
                }
            }
        }
    }
    for (key, value) in patch {
        if key == ID_FIELD {
            continue;
        }
        document.insert(key, value);
    }
    Ok(document)
}

/// Applies an array change in place. A missing or null field counts as an
/// empty array; any other non-array value is rejected.
pub fn apply_array_op(document: &mut Document, field: &str, op: &ArrayOp) -> AppResult<()> {
    let slot = document
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(vec![]));
    if slot.is_null() {
        *slot = Value::Array(vec![]);
    }
    let Value::Array(items) = slot else {
        return Err(AppError::InvalidInput {
            description: format!("field '{field}' is not an array"),
        });
    };
    match op {
        ArrayOp::AddToSet(value) => {
            if !items.contains(value) {
                items.push(value.clone());
            }
        }
        ArrayOp::Pull(value) => items.retain(|item| item != value),
    }
    Ok(())
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that string
/// ordering in any store matches chronological ordering.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Current time, ready to go into a patch.
    pub fn now_value() -> Value {
        Value::String(format(&Utc::now()))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
