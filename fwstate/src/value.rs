use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use xml_object_core::object::{ATTRIBUTE_PREFIX, TEXT_KEY};

/// Field name -> value mapping used for resources and nested groups.
pub type Record = BTreeMap<String, Value>;

/// A normalized configuration value.
///
/// Every value the engine compares has one of three shapes. Which shape a
/// field takes comes from the resource schema, never from the wire data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    Sequence(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Comparable text of a scalar.
    ///
    /// A scalar element that carries XML attributes is kept as a record of
    /// its `@` attributes plus `#text`; its text is the `#text` entry.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Scalar(text) => Some(text),
            Self::Record(record) => match record.get(TEXT_KEY) {
                Some(Self::Scalar(text))
                    if record
                        .keys()
                        .all(|key| key == TEXT_KEY || key.starts_with(ATTRIBUTE_PREFIX)) =>
                {
                    Some(text)
                }
                _ => None,
            },
            Self::Sequence(_) => None,
        }
    }

    /// Write `declared` into this slot. An attributed scalar keeps its
    /// attributes and only has its text replaced.
    pub fn assign(&mut self, declared: &Value) {
        if let (Self::Record(record), Self::Scalar(text)) = (&mut *self, declared) {
            if matches!(record.get(TEXT_KEY), Some(Self::Scalar(_))) {
                record.insert(TEXT_KEY.to_string(), Self::Scalar(text.clone()));
                return;
            }
        }
        *self = declared.clone();
    }

    /// Shape name used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Sequence(_) => "sequence",
            Self::Record(_) => "record",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

/// A resource as seen on the device.
///
/// `Absent` is the explicit "does not exist" sentinel; it is never
/// represented by an empty record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "object", rename_all = "snake_case")]
pub enum Observed {
    Absent,
    Present(Record),
}

impl Observed {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Absent => None,
            Self::Present(record) => Some(record),
        }
    }
}

/// Dotted location of a field inside a resource, e.g. `auth.username` or
/// `servers[1].port`. The root path renders as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    pub fn index(&self, idx: usize) -> Self {
        Self(format!("{}[{idx}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
