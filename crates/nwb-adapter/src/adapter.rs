//! The interface a host database calls into.
//!
//! Hosts persist whatever `put` returns in place of the object and hand it
//! back to `get` when the row is read. Adapters never talk to the database.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{AdapterError, Result};

/// An inline stored value: a mapping of primitive fields.
pub type InlineValue = Map<String, Value>;

/// How the host stores an adapter's token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// A path string managed under the named store's stage directory.
    Filepath { store: String },
    /// A structured value serialized into the row itself.
    Longblob,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Filepath { store } => write!(f, "filepath@{store}"),
            AttributeType::Longblob => f.write_str("longblob"),
        }
    }
}

pub trait AttributeAdapter {
    /// What `put` serializes.
    type Value;
    /// What `get` hands back; for file-backed adapters this carries the open
    /// read session alongside the object.
    type Output;
    /// What the host stores.
    type Token;

    fn attribute_type(&self) -> AttributeType;

    fn put(&self, value: &Self::Value) -> Result<Self::Token>;

    fn get(&self, token: &Self::Token) -> Result<Self::Output>;
}

/// Fetch a string field from an inline value.
pub(crate) fn str_field<'a>(value: &'a InlineValue, field: &str) -> Result<&'a str> {
    field_value(value, field)?
        .as_str()
        .ok_or_else(|| AdapterError::MalformedField {
            field: field.to_string(),
            expected: "a string",
        })
}

/// Fetch a nested mapping from an inline value.
pub(crate) fn map_field<'a>(value: &'a InlineValue, field: &str) -> Result<&'a InlineValue> {
    field_value(value, field)?
        .as_object()
        .ok_or_else(|| AdapterError::MalformedField {
            field: field.to_string(),
            expected: "a mapping",
        })
}

fn field_value<'a>(value: &'a InlineValue, field: &str) -> Result<&'a Value> {
    value.get(field).ok_or_else(|| AdapterError::MissingField {
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inline(value: Value) -> InlineValue {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_attribute_type_display() {
        let filepath = AttributeType::Filepath {
            store: "nwb_store".to_string(),
        };
        assert_eq!(filepath.to_string(), "filepath@nwb_store");
        assert_eq!(AttributeType::Longblob.to_string(), "longblob");
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        let value = inline(json!({"name": 3, "device": "amp1"}));

        assert!(matches!(
            str_field(&value, "location"),
            Err(AdapterError::MissingField { ref field }) if field == "location"
        ));
        assert!(matches!(
            str_field(&value, "name"),
            Err(AdapterError::MalformedField { expected: "a string", .. })
        ));
        assert!(matches!(
            map_field(&value, "device"),
            Err(AdapterError::MalformedField { expected: "a mapping", .. })
        ));
    }
}
