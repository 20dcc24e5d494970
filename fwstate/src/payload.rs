//! Update payload construction.
//!
//! The device replaces the whole object on update, so the payload starts from
//! everything that was observed and overlays only what the caller declared.

use serde_json::{Map, Value as JsonValue};
use xml_object_core::{from_object_element, ObjectError, XmlNode};

use crate::decision::ChangeSet;
use crate::declared::DeclaredState;
use crate::schema::{FieldKind, FieldSchema, Fields, ItemKind, ResourceSchema, ValueType};
use crate::value::{FieldPath, Observed, Record, Value};

/// Build the resolved object: a deep copy of `observed` with every declared
/// field overlaid. Sequence fields take the reconciled list from
/// `change_set`, not the raw declared list. Fields neither declared nor
/// observed stay absent.
pub fn build(
    declared: &DeclaredState,
    observed: &Observed,
    change_set: &ChangeSet,
    schema: &ResourceSchema,
) -> Record {
    let mut resolved = observed.record().cloned().unwrap_or_default();
    overlay(
        &mut resolved,
        declared.fields(),
        &schema.fields,
        change_set,
        &FieldPath::root(),
    );
    resolved
}

fn overlay(
    target: &mut Record,
    declared: &Record,
    fields: &Fields,
    change_set: &ChangeSet,
    path: &FieldPath,
) {
    for (name, value) in declared {
        let field_path = path.child(name);
        let kind = fields.get(name).map(|field| field.kind);

        match (kind, value) {
            (Some(FieldKind::Record), Value::Record(declared_record)) => {
                if declared_record.is_empty() && !target.contains_key(name) {
                    continue;
                }
                let slot = target
                    .entry(name.clone())
                    .or_insert_with(|| Value::Record(Record::new()));
                if !matches!(slot, Value::Record(_)) {
                    *slot = Value::Record(Record::new());
                }
                if let (Value::Record(sub), Some(field)) = (slot, fields.get(name)) {
                    overlay(sub, declared_record, &field.fields, change_set, &field_path);
                }
            }
            (Some(FieldKind::Sequence), _) => {
                let items = match change_set.resolved_list(&field_path) {
                    Some(items) => Value::Sequence(items.to_vec()),
                    None => value.clone(),
                };
                target.insert(name.clone(), items);
            }
            _ => {
                target
                    .entry(name.clone())
                    .and_modify(|slot| slot.assign(value))
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

/// Placeholder written in place of secret values.
pub const REDACTED: &str = "(secret)";

/// Copy of a resolved object with every secret field masked, for reports.
pub fn redact(record: &Record, schema: &ResourceSchema) -> Record {
    redact_record(record, &schema.fields)
}

fn redact_record(record: &Record, fields: &Fields) -> Record {
    record
        .iter()
        .map(|(name, value)| {
            let value = match fields.get(name) {
                Some(field) => redact_field(value, field),
                None => value.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

fn redact_field(value: &Value, field: &FieldSchema) -> Value {
    match (field.kind, value) {
        (FieldKind::Record, Value::Record(record)) => {
            Value::Record(redact_record(record, &field.fields))
        }
        (FieldKind::Sequence, Value::Sequence(items)) => Value::Sequence(
            items
                .iter()
                .map(|item| match item {
                    Value::Record(record) if field.item_kind() == ItemKind::Record => {
                        Value::Record(redact_record(record, &field.fields))
                    }
                    _ if field.value_type == ValueType::Secret => Value::scalar(REDACTED),
                    other => other.clone(),
                })
                .collect(),
        ),
        _ if field.value_type == ValueType::Secret => Value::scalar(REDACTED),
        _ => value.clone(),
    }
}

/// Convert a resolved object back into the wire object model, re-wrapping
/// list items in their item tags.
pub fn to_wire(record: &Record, schema: &ResourceSchema) -> JsonValue {
    record_to_wire(record, &schema.fields)
}

/// Render a resolved object as the XML element the device expects, with the
/// resource key in the schema's key attribute.
pub fn render_element(
    record: &Record,
    schema: &ResourceSchema,
    key: &str,
) -> Result<XmlNode, ObjectError> {
    let node = from_object_element(&schema.resource.element, &to_wire(record, schema))?;
    Ok(match &schema.resource.key_attribute {
        Some(attribute) => node.with_attribute(attribute.clone(), key),
        None => node,
    })
}

fn record_to_wire(record: &Record, fields: &Fields) -> JsonValue {
    let map: Map<String, JsonValue> = record
        .iter()
        .map(|(name, value)| {
            let wire = match fields.get(name) {
                Some(field) => field_to_wire(value, field),
                None => loose_to_wire(value),
            };
            (name.clone(), wire)
        })
        .collect();
    JsonValue::Object(map)
}

fn field_to_wire(value: &Value, field: &FieldSchema) -> JsonValue {
    match (field.kind, value) {
        (FieldKind::Record, Value::Record(record)) => record_to_wire(record, &field.fields),
        (FieldKind::Sequence, Value::Sequence(items)) => {
            let rendered: Vec<JsonValue> = items
                .iter()
                .map(|item| match (field.item_kind(), item) {
                    (ItemKind::Record, Value::Record(record)) => {
                        record_to_wire(record, &field.fields)
                    }
                    _ => loose_to_wire(item),
                })
                .collect();
            match &field.item_tag {
                Some(_) if rendered.is_empty() => JsonValue::Null,
                Some(tag) => {
                    let mut wrapper = Map::new();
                    wrapper.insert(tag.clone(), JsonValue::Array(rendered));
                    JsonValue::Object(wrapper)
                }
                None => JsonValue::Array(rendered),
            }
        }
        _ => loose_to_wire(value),
    }
}

fn loose_to_wire(value: &Value) -> JsonValue {
    match value {
        Value::Scalar(s) => JsonValue::String(s.clone()),
        Value::Sequence(items) => JsonValue::Array(items.iter().map(loose_to_wire).collect()),
        Value::Record(record) => JsonValue::Object(
            record
                .iter()
                .map(|(name, value)| (name.clone(), loose_to_wire(value)))
                .collect(),
        ),
    }
}
