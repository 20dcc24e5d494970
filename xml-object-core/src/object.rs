//! Bridge between [`XmlNode`] trees and the loosely typed object model that
//! XML management SDKs hand to callers.
//!
//! The mapping follows the xmltodict convention:
//!
//! - attributes become `@name` keys,
//! - text becomes a string, or a `#text` key when the element also has
//!   attributes or children,
//! - a child tag that occurs once becomes a single value, a child tag that
//!   repeats becomes an array,
//! - an element with no content becomes `null`.
//!
//! The single-versus-array ambiguity is intentional: it is what the remote
//! side produces, and resolving it needs a schema the object layer does not
//! have.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::tree::XmlNode;

/// Key prefix used for XML attributes.
pub const ATTRIBUTE_PREFIX: char = '@';
/// Key used for element text when the element also carries attributes or children.
pub const TEXT_KEY: &str = "#text";

/// Errors raised when an object value cannot be expressed as XML.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectError {
    /// Arrays directly inside arrays have no XML representation.
    #[error("nested array under <{tag}> cannot be rendered as XML")]
    NestedArray { tag: String },
    /// Attribute values must be strings, numbers, or booleans.
    #[error("attribute {attribute} on <{tag}> is not a scalar")]
    AttributeNotScalar { tag: String, attribute: String },
    /// `#text` must be a scalar.
    #[error("text of <{tag}> is not a scalar")]
    TextNotScalar { tag: String },
    /// The value expanded to zero or several elements where exactly one was required.
    #[error("value for <{tag}> does not describe exactly one element")]
    NotSingleElement { tag: String },
}

/// Convert an element into its object value (without the enclosing tag).
pub fn to_object(node: &XmlNode) -> Value {
    if node.attributes.is_empty() && node.children.is_empty() {
        return match &node.text {
            Some(text) => Value::String(text.clone()),
            None => Value::Null,
        };
    }

    let mut map = Map::new();
    for (key, value) in &node.attributes {
        map.insert(format!("{ATTRIBUTE_PREFIX}{key}"), Value::String(value.clone()));
    }
    if let Some(text) = &node.text {
        map.insert(TEXT_KEY.to_string(), Value::String(text.clone()));
    }

    for tag in child_tags(node) {
        let values: Vec<Value> = node
            .children
            .iter()
            .filter(|child| child.tag == tag)
            .map(to_object)
            .collect();
        let value = if values.len() == 1 {
            values.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(values)
        };
        map.insert(tag, value);
    }

    Value::Object(map)
}

/// Expand an object value into the elements it describes under `tag`.
///
/// Arrays expand into repeated sibling elements, so the result may hold any
/// number of nodes.
pub fn from_object(tag: &str, value: &Value) -> Result<Vec<XmlNode>, ObjectError> {
    match value {
        Value::Null => Ok(vec![XmlNode::new(tag)]),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Ok(vec![XmlNode::new(tag).with_text(scalar_text(value).unwrap_or_default())])
        }
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                if item.is_array() {
                    return Err(ObjectError::NestedArray {
                        tag: tag.to_string(),
                    });
                }
                nodes.extend(from_object(tag, item)?);
            }
            Ok(nodes)
        }
        Value::Object(map) => {
            let mut node = XmlNode::new(tag);
            for (key, child) in map {
                if key == TEXT_KEY {
                    let text = scalar_text(child).ok_or_else(|| ObjectError::TextNotScalar {
                        tag: tag.to_string(),
                    })?;
                    node.text = Some(text);
                } else if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    let text =
                        scalar_text(child).ok_or_else(|| ObjectError::AttributeNotScalar {
                            tag: tag.to_string(),
                            attribute: attribute.to_string(),
                        })?;
                    node.attributes.insert(attribute.to_string(), text);
                } else {
                    node.children.extend(from_object(key, child)?);
                }
            }
            Ok(vec![node])
        }
    }
}

/// Like [`from_object`] but requires the value to describe exactly one element.
pub fn from_object_element(tag: &str, value: &Value) -> Result<XmlNode, ObjectError> {
    let mut nodes = from_object(tag, value)?;
    if nodes.len() != 1 {
        return Err(ObjectError::NotSingleElement {
            tag: tag.to_string(),
        });
    }
    nodes.pop().ok_or_else(|| ObjectError::NotSingleElement {
        tag: tag.to_string(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Child tags in order of first appearance.
fn child_tags(node: &XmlNode) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for child in &node.children {
        if !tags.iter().any(|t| t == &child.tag) {
            tags.push(child.tag.clone());
        }
    }
    tags
}
