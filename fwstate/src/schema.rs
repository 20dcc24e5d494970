//! Per-resource field schemas.
//!
//! A schema fixes, for every field the engine manages, its cardinality
//! (scalar, record, or sequence), how scalars compare, and how sequences
//! reconcile. Schemas are TOML documents; a few are embedded in the binary and
//! any of them can be overridden from a directory or replaced by a file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::FieldPath;

/// Field map shared by resources, records, and record sequences.
pub type Fields = BTreeMap<String, FieldSchema>;

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Scalar,
    Record,
    Sequence,
}

/// Comparison semantics for scalar values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Text,
    /// Numbers transported as strings.
    Numeric,
    /// Closed, case-sensitive set of strings.
    Enum,
    /// Write-only; the device never echoes it back in comparable form.
    Secret,
}

/// Element shape of a sequence field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Scalar,
    Record,
}

/// How a declared list is applied to the observed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStrategy {
    /// Append declared items that are not present yet.
    #[default]
    Add,
    /// Drop observed items that match a declared item.
    Remove,
    /// Declared list supersedes the observed one.
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSchema {
    #[serde(default)]
    pub kind: FieldKind,
    /// Scalar comparison type; for scalar sequences it applies to each item.
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    /// Allowed values for [`ValueType::Enum`].
    #[serde(default)]
    pub choices: Vec<String>,
    /// Element shape for sequences.
    #[serde(default)]
    pub item: Option<ItemKind>,
    /// Wrapper element carrying each item on the wire (`member`, `entry`).
    #[serde(default)]
    pub item_tag: Option<String>,
    /// Per-field list strategy; falls back to [`ListStrategy::Add`].
    #[serde(default)]
    pub strategy: Option<ListStrategy>,
    /// Item fields that identify a record in a record sequence.
    #[serde(default)]
    pub match_on: Vec<String>,
    /// Nested fields for records and record sequences.
    #[serde(default)]
    pub fields: Fields,
}

impl FieldSchema {
    pub fn scalar(value_type: ValueType) -> Self {
        Self {
            value_type,
            ..Self::default()
        }
    }

    pub fn enumeration<S: AsRef<str>>(choices: &[S]) -> Self {
        Self {
            value_type: ValueType::Enum,
            choices: choices.iter().map(|c| c.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn record(fields: Fields) -> Self {
        Self {
            kind: FieldKind::Record,
            fields,
            ..Self::default()
        }
    }

    pub fn sequence(item: ItemKind) -> Self {
        Self {
            kind: FieldKind::Sequence,
            item: Some(item),
            ..Self::default()
        }
    }

    pub fn with_item_tag(mut self, tag: impl Into<String>) -> Self {
        self.item_tag = Some(tag.into());
        self
    }

    pub fn with_strategy(mut self, strategy: ListStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_match_on<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.match_on = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self
    }

    /// Element shape, defaulting to scalar for sequences that omit `item`.
    pub fn item_kind(&self) -> ItemKind {
        self.item.unwrap_or_default()
    }

    fn validate(&self, path: &FieldPath) -> Result<(), (FieldPath, String)> {
        let fail = |reason: &str| Err((path.clone(), reason.to_string()));

        if self.value_type == ValueType::Enum && self.choices.is_empty() {
            return fail("enum fields must list their choices");
        }
        if self.value_type != ValueType::Enum && !self.choices.is_empty() {
            return fail("choices are only valid on enum fields");
        }
        if self.kind != FieldKind::Sequence
            && (self.item.is_some() || self.item_tag.is_some() || self.strategy.is_some())
        {
            return fail("item, item_tag and strategy are only valid on sequences");
        }

        match self.kind {
            FieldKind::Scalar => {
                if !self.fields.is_empty() {
                    return fail("scalar fields cannot declare nested fields");
                }
            }
            FieldKind::Record => {
                if self.fields.is_empty() {
                    return fail("record fields must declare at least one field");
                }
                if self.value_type != ValueType::Text {
                    return fail("type is only valid on scalars and scalar sequences");
                }
            }
            FieldKind::Sequence => match self.item_kind() {
                ItemKind::Scalar => {
                    if !self.fields.is_empty() || !self.match_on.is_empty() {
                        return fail("fields and match_on require item = \"record\"");
                    }
                }
                ItemKind::Record => {
                    if self.fields.is_empty() {
                        return fail("record sequences must declare item fields");
                    }
                    let unknown = self
                        .match_on
                        .iter()
                        .find(|key| !self.fields.contains_key(*key));
                    if let Some(missing) = unknown {
                        return fail(&format!("match_on names unknown item field '{missing}'"));
                    }
                }
            },
        }
        if self.kind != FieldKind::Sequence && !self.match_on.is_empty() {
            return fail("match_on is only valid on record sequences");
        }

        validate_fields(&self.fields, path)
    }
}

/// Identity and wire rendering hints for a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceInfo {
    pub name: String,
    /// Element name the resolved object is rendered as.
    #[serde(default = "default_element")]
    pub element: String,
    /// Attribute that carries the resource key (`<entry name="...">`).
    #[serde(default)]
    pub key_attribute: Option<String>,
}

fn default_element() -> String {
    "entry".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSchema {
    pub resource: ResourceInfo,
    #[serde(default)]
    pub fields: Fields,
}

impl ResourceSchema {
    /// Schema rendered as `<entry name="...">` with the given fields.
    pub fn new(name: impl Into<String>, fields: Fields) -> Self {
        Self {
            resource: ResourceInfo {
                name: name.into(),
                element: default_element(),
                key_attribute: Some("name".to_string()),
            },
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    /// Check the structural rules a loaded schema must satisfy.
    pub fn validate(&self) -> Result<(), (FieldPath, String)> {
        if self.fields.is_empty() {
            return Err((FieldPath::root(), "schema declares no fields".to_string()));
        }
        validate_fields(&self.fields, &FieldPath::root())
    }
}

fn validate_fields(fields: &Fields, path: &FieldPath) -> Result<(), (FieldPath, String)> {
    for (name, field) in fields {
        field.validate(&path.child(name))?;
    }
    Ok(())
}

/// Errors returned when loading schemas.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse schema {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid schema {path}: field {field}: {reason}")]
    Invalid {
        path: String,
        field: FieldPath,
        reason: String,
    },
    #[error("unknown resource schema '{0}'")]
    UnknownResource(String),
}

const EMBEDDED: &[(&str, &str)] = &[
    (
        "address_group",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/address_group.toml")),
    ),
    (
        "syslog",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/syslog.toml")),
    ),
];

/// Names of the schemas compiled into the binary.
pub fn embedded_schema_names() -> Vec<&'static str> {
    EMBEDDED.iter().map(|(name, _)| *name).collect()
}

/// Load a compiled-in schema by resource name.
pub fn embedded_schema(name: &str) -> Result<ResourceSchema, SchemaLoadError> {
    let (_, raw) = EMBEDDED
        .iter()
        .find(|(embedded, _)| *embedded == name)
        .ok_or_else(|| SchemaLoadError::UnknownResource(name.to_string()))?;
    parse_schema(raw, format!("embedded:{name}"))
}

/// Load a schema from a TOML file.
pub fn load_schema_file(path: &Path) -> Result<ResourceSchema, SchemaLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_schema(&raw, path.display().to_string())
}

/// Resolve a schema by resource name, preferring `<schemas_dir>/<name>.toml`
/// over the embedded copy. Returns the schema and a source label
/// (`file:<path>` or `embedded`).
pub fn resolve_schema(
    name: &str,
    schemas_dir: Option<&Path>,
) -> Result<(ResourceSchema, String), SchemaLoadError> {
    if let Some(dir) = schemas_dir {
        let path = dir.join(format!("{name}.toml"));
        if path.exists() {
            let schema = load_schema_file(&path)?;
            return Ok((schema, format!("file:{}", path.display())));
        }
    }
    embedded_schema(name).map(|schema| (schema, "embedded".to_string()))
}

/// Parse and validate a schema document.
pub fn parse_schema(raw: &str, path: String) -> Result<ResourceSchema, SchemaLoadError> {
    let schema: ResourceSchema = toml::from_str(raw).map_err(|source| SchemaLoadError::Parse {
        path: path.clone(),
        source,
    })?;
    schema
        .validate()
        .map_err(|(field, reason)| SchemaLoadError::Invalid {
            path,
            field,
            reason,
        })?;
    Ok(schema)
}
