//! Caller-declared desired state.
//!
//! Declared state is read from TOML whose keys are schema field names:
//!
//! ```toml
//! port = 1514
//! facility = "DAEMON"
//! hosts = ["10.0.0.2"]
//!
//! [auth]
//! password = "s3cret"
//! ```
//!
//! A key that is left out means "leave this field alone", never "clear it".

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::schema::{FieldKind, FieldSchema, Fields, ItemKind, ResourceSchema, ValueType};
use crate::value::{FieldPath, Record, Value};

/// Errors raised while building or using declared state.
#[derive(Debug, Error)]
pub enum DeclaredError {
    #[error("failed to read declared state {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse declared state {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("unknown field {path}")]
    UnknownField { path: FieldPath },
    #[error("declared {path} must be a {expected}, got a {found}")]
    Shape {
        path: FieldPath,
        expected: &'static str,
        found: &'static str,
    },
    #[error("declared {path} = '{value}' is not one of: {}", choices.join(", "))]
    InvalidChoice {
        path: FieldPath,
        value: String,
        choices: Vec<String>,
    },
}

/// Validated desired state for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeclaredState(Record);

impl DeclaredState {
    /// Declared state with no fields; never causes a change on an existing resource.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `record` against `schema`.
    pub fn new(record: Record, schema: &ResourceSchema) -> Result<Self, DeclaredError> {
        check_record(&record, &schema.fields, &FieldPath::root())?;
        Ok(Self(record))
    }

    /// Parse declared state from a TOML document.
    pub fn from_toml_str(raw: &str, schema: &ResourceSchema) -> Result<Self, DeclaredError> {
        Self::parse(raw, "<inline>".to_string(), schema)
    }

    /// Read declared state from a TOML file.
    pub fn load(path: &Path, schema: &ResourceSchema) -> Result<Self, DeclaredError> {
        let raw = fs::read_to_string(path).map_err(|source| DeclaredError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path.display().to_string(), schema)
    }

    fn parse(raw: &str, path: String, schema: &ResourceSchema) -> Result<Self, DeclaredError> {
        let table: toml::Table =
            toml::from_str(raw).map_err(|source| DeclaredError::Parse { path, source })?;
        let record = table
            .iter()
            .map(|(key, value)| (key.clone(), from_toml(value)))
            .collect();
        Self::new(record, schema)
    }

    pub fn fields(&self) -> &Record {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Convert a TOML value into the engine's value model. Booleans use the
/// management API's `yes`/`no` spelling.
fn from_toml(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Scalar(s.clone()),
        toml::Value::Integer(i) => Value::Scalar(i.to_string()),
        toml::Value::Float(f) => Value::Scalar(f.to_string()),
        toml::Value::Boolean(b) => Value::scalar(if *b { "yes" } else { "no" }),
        toml::Value::Datetime(dt) => Value::Scalar(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Record(
            table
                .iter()
                .map(|(key, value)| (key.clone(), from_toml(value)))
                .collect(),
        ),
    }
}

/// Check declared values against the schema, returning the first problem found.
pub(crate) fn check_record(
    record: &Record,
    fields: &Fields,
    path: &FieldPath,
) -> Result<(), DeclaredError> {
    for (name, value) in record {
        let field_path = path.child(name);
        let field = fields.get(name).ok_or_else(|| DeclaredError::UnknownField {
            path: field_path.clone(),
        })?;
        check_field(value, field, &field_path)?;
    }
    Ok(())
}

fn check_field(value: &Value, field: &FieldSchema, path: &FieldPath) -> Result<(), DeclaredError> {
    match (field.kind, value) {
        (FieldKind::Scalar, Value::Scalar(s)) => check_choice(s, field, path),
        (FieldKind::Record, Value::Record(record)) => check_record(record, &field.fields, path),
        (FieldKind::Sequence, Value::Sequence(items)) => {
            for (idx, item) in items.iter().enumerate() {
                let item_path = path.index(idx);
                match (field.item_kind(), item) {
                    (ItemKind::Scalar, Value::Scalar(s)) => check_choice(s, field, &item_path)?,
                    (ItemKind::Record, Value::Record(record)) => {
                        check_record(record, &field.fields, &item_path)?;
                    }
                    (ItemKind::Scalar, other) => return Err(shape(&item_path, "scalar", other)),
                    (ItemKind::Record, other) => return Err(shape(&item_path, "record", other)),
                }
            }
            Ok(())
        }
        (FieldKind::Scalar, other) => Err(shape(path, "scalar", other)),
        (FieldKind::Record, other) => Err(shape(path, "record", other)),
        (FieldKind::Sequence, other) => Err(shape(path, "sequence", other)),
    }
}

fn check_choice(value: &str, field: &FieldSchema, path: &FieldPath) -> Result<(), DeclaredError> {
    if field.value_type != ValueType::Enum || field.choices.iter().any(|c| c == value) {
        return Ok(());
    }
    Err(DeclaredError::InvalidChoice {
        path: path.clone(),
        value: value.to_string(),
        choices: field.choices.clone(),
    })
}

fn shape(path: &FieldPath, expected: &'static str, found: &Value) -> DeclaredError {
    DeclaredError::Shape {
        path: path.clone(),
        expected,
        found: found.shape(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DeclaredError, DeclaredState};
    use crate::schema::embedded_schema;
    use crate::value::Value;

    #[test]
    fn parses_toml_into_typed_values() {
        let schema = embedded_schema("syslog").expect("schema");
        let declared = DeclaredState::from_toml_str(
            r#"
port = 1514
facility = "DAEMON"
hosts = ["10.0.0.2"]

[auth]
username = "collector"
"#,
            &schema,
        )
        .expect("declared");

        assert_eq!(declared.get("port"), Some(&Value::scalar("1514")));
        assert_eq!(
            declared.get("hosts"),
            Some(&Value::Sequence(vec![Value::scalar("10.0.0.2")]))
        );
        assert!(matches!(declared.get("auth"), Some(Value::Record(_))));
    }

    #[test]
    fn booleans_use_yes_no() {
        let schema = crate::schema::parse_schema(
            r#"
[resource]
name = "flags"

[fields.disabled]
kind = "scalar"
"#,
            "inline".to_string(),
        )
        .expect("schema");
        let declared = DeclaredState::from_toml_str("disabled = true", &schema).expect("declared");
        assert_eq!(declared.get("disabled"), Some(&Value::scalar("yes")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let schema = embedded_schema("syslog").expect("schema");
        let err = DeclaredState::from_toml_str("[auth]\ntoken = \"x\"", &schema)
            .expect_err("unknown");
        assert!(
            matches!(err, DeclaredError::UnknownField { ref path } if path.as_str() == "auth.token")
        );
    }

    #[test]
    fn enum_choices_are_case_sensitive() {
        let schema = embedded_schema("syslog").expect("schema");
        let err =
            DeclaredState::from_toml_str("facility = \"daemon\"", &schema).expect_err("choice");
        assert!(err.to_string().contains("is not one of"));
    }

    #[test]
    fn sequence_fields_require_arrays() {
        let schema = embedded_schema("syslog").expect("schema");
        let err = DeclaredState::from_toml_str("hosts = \"10.0.0.1\"", &schema)
            .expect_err("shape");
        assert!(matches!(
            err,
            DeclaredError::Shape {
                expected: "sequence",
                found: "scalar",
                ..
            }
        ));
    }

    #[test]
    fn empty_document_is_empty_state() {
        let schema = embedded_schema("syslog").expect("schema");
        let declared = DeclaredState::from_toml_str("", &schema).expect("declared");
        assert!(declared.is_empty());
        assert_eq!(declared, DeclaredState::empty());
    }
}
