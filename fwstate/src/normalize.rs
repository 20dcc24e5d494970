//! Shape normalization of device objects.
//!
//! The management API returns xmltodict-style objects where a repeated
//! element is an array and a single occurrence is a bare value. The normalizer
//! takes cardinality from the schema instead: a sequence field with one item
//! is still a one-element sequence.

use log::{debug, warn};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use xml_object_core::object::{ATTRIBUTE_PREFIX, TEXT_KEY};

use crate::schema::{FieldKind, FieldSchema, Fields, ItemKind, ResourceSchema};
use crate::value::{FieldPath, Observed, Record, Value};

/// Observed data does not have the shape the schema declares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shape mismatch at {path}: expected {expected}, found {found}")]
pub struct ShapeMismatch {
    pub path: FieldPath,
    pub expected: &'static str,
    pub found: &'static str,
}

/// Normalize a raw device object against `schema`.
///
/// A raw value that is not an object at all (a status string, `null`) is the
/// API's placeholder for "nothing configured" and yields [`Observed::Absent`].
/// Fields the schema does not mention are carried through loosely so they
/// survive into the resolved object.
pub fn normalize(raw: &JsonValue, schema: &ResourceSchema) -> Result<Observed, ShapeMismatch> {
    let JsonValue::Object(map) = raw else {
        debug!(
            "{}: placeholder {} instead of an object, treating as absent",
            schema.name(),
            json_shape(raw)
        );
        return Ok(Observed::Absent);
    };
    normalize_record(map, &schema.fields, &FieldPath::root()).map(Observed::Present)
}

fn normalize_record(
    map: &Map<String, JsonValue>,
    fields: &Fields,
    path: &FieldPath,
) -> Result<Record, ShapeMismatch> {
    let mut out = Record::new();
    for (key, raw) in map {
        let field_path = path.child(key);
        let value = match fields.get(key) {
            Some(field) => normalize_field(raw, field, &field_path)?,
            None => Some(loose(raw)),
        };
        if let Some(value) = value {
            out.insert(key.clone(), value);
        }
    }
    Ok(out)
}

fn normalize_field(
    raw: &JsonValue,
    field: &FieldSchema,
    path: &FieldPath,
) -> Result<Option<Value>, ShapeMismatch> {
    match field.kind {
        FieldKind::Scalar => {
            if raw.is_null() {
                return Ok(None);
            }
            scalar(raw, path).map(Some)
        }
        FieldKind::Record => match raw {
            JsonValue::Null => Ok(None),
            JsonValue::Object(map) => normalize_record(map, &field.fields, path)
                .map(Value::Record)
                .map(Some),
            other => Err(mismatch(path, "record", other)),
        },
        FieldKind::Sequence => normalize_sequence(raw, field, path)
            .map(Value::Sequence)
            .map(Some),
    }
}

fn normalize_sequence(
    raw: &JsonValue,
    field: &FieldSchema,
    path: &FieldPath,
) -> Result<Vec<Value>, ShapeMismatch> {
    let items = match &field.item_tag {
        Some(tag) => match raw {
            JsonValue::Null => return Ok(Vec::new()),
            JsonValue::Object(map) => match map.get(tag) {
                Some(inner) => inner,
                None => return Ok(Vec::new()),
            },
            other => return Err(mismatch(path, "object wrapping list items", other)),
        },
        None => raw,
    };

    let items: Vec<&JsonValue> = match items {
        JsonValue::Array(values) => values.iter().collect(),
        JsonValue::Null if field.item_tag.is_none() => Vec::new(),
        single => vec![single],
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let item_path = path.index(idx);
        match field.item_kind() {
            ItemKind::Scalar => {
                if item.is_null() {
                    warn!("{item_path}: skipping empty list item");
                    continue;
                }
                out.push(scalar(item, &item_path)?);
            }
            ItemKind::Record => match item {
                JsonValue::Object(map) => {
                    out.push(Value::Record(normalize_record(map, &field.fields, &item_path)?));
                }
                JsonValue::Null => out.push(Value::Record(Record::new())),
                other => return Err(mismatch(&item_path, "record", other)),
            },
        }
    }
    Ok(out)
}

fn scalar(raw: &JsonValue, path: &FieldPath) -> Result<Value, ShapeMismatch> {
    match raw {
        JsonValue::String(s) => Ok(Value::Scalar(s.clone())),
        JsonValue::Number(n) => Ok(Value::Scalar(n.to_string())),
        JsonValue::Bool(b) => Ok(Value::Scalar(b.to_string())),
        // Attributes ride along with the text so a full replacement keeps them.
        JsonValue::Object(map) => match map.get(TEXT_KEY) {
            Some(text) if !text.is_object() && !text.is_array() => {
                if map.len() == 1 {
                    return scalar(text, path);
                }
                if !map
                    .keys()
                    .all(|key| key == TEXT_KEY || key.starts_with(ATTRIBUTE_PREFIX))
                {
                    return Err(mismatch(path, "scalar", raw));
                }
                Ok(loose(raw))
            }
            _ => Err(mismatch(path, "scalar", raw)),
        },
        other => Err(mismatch(path, "scalar", other)),
    }
}

/// Schema-less conversion for fields the schema does not manage.
fn loose(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Record(Record::new()),
        JsonValue::Bool(b) => Value::Scalar(b.to_string()),
        JsonValue::Number(n) => Value::Scalar(n.to_string()),
        JsonValue::String(s) => Value::Scalar(s.clone()),
        JsonValue::Array(items) => Value::Sequence(items.iter().map(loose).collect()),
        JsonValue::Object(map) => Value::Record(
            map.iter()
                .map(|(key, value)| (key.clone(), loose(value)))
                .collect(),
        ),
    }
}

fn mismatch(path: &FieldPath, expected: &'static str, found: &JsonValue) -> ShapeMismatch {
    ShapeMismatch {
        path: path.clone(),
        expected,
        found: json_shape(found),
    }
}

fn json_shape(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
