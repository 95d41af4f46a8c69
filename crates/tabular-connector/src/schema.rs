//! Wire-level OpenAPI schema model
//!
//! [`SchemaNode`] is a lenient, immutable view over an OpenAPI/Swagger schema
//! object. Only the root is required to be a JSON object; a malformed nested
//! property is kept as a node with [`SchemaNode::malformed`] set so the resolver
//! can degrade that one field instead of failing the whole table.
//!
//! Recognized vendor extensions:
//! - `x-ms-visibility: "internal"` marks a field internal
//! - `x-ms-keyType: "primary"` / `x-ms-keyOrder` mark key fields
//! - `x-ms-display-name` (falling back to `title`) sets the display name
//! - `x-ms-enum-values` and `x-ms-enum` carry enumeration display names
//!
//! Any other `x-*` key is preserved in [`SchemaNode::extensions`].

use crate::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Primitive kind declared by the `type` keyword
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Missing or unsupported `type`
    Unknown,
}

impl SchemaKind {
    fn parse(s: &str) -> Self {
        match s {
            "string" => SchemaKind::String,
            "integer" => SchemaKind::Integer,
            "number" => SchemaKind::Number,
            "boolean" => SchemaKind::Boolean,
            "object" => SchemaKind::Object,
            "array" => SchemaKind::Array,
            _ => SchemaKind::Unknown,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::String => write!(f, "string"),
            SchemaKind::Integer => write!(f, "integer"),
            SchemaKind::Number => write!(f, "number"),
            SchemaKind::Boolean => write!(f, "boolean"),
            SchemaKind::Object => write!(f, "object"),
            SchemaKind::Array => write!(f, "array"),
            SchemaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// One enumeration member: wire value plus optional display name
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: String,
    pub display_name: Option<String>,
}

/// Wire-level schema unit
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    /// The `type` keyword as written, kept for diagnostics
    pub declared_type: Option<String>,
    pub format: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Nested properties in document order
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    pub items: Option<Box<SchemaNode>>,
    pub internal: bool,
    pub is_key: bool,
    pub key_order: Option<u32>,
    /// Explicit enumeration name from `x-ms-enum.name`
    pub enum_name: Option<String>,
    pub enum_values: Vec<EnumValue>,
    /// Unrecognized vendor extensions, verbatim
    pub extensions: BTreeMap<String, Value>,
    /// Set when this node could not be read as a schema object
    pub malformed: Option<String>,
}

impl SchemaNode {
    /// Create an empty node of the given kind
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            declared_type: Some(kind.to_string()),
            format: None,
            display_name: None,
            description: None,
            properties: Vec::new(),
            required: Vec::new(),
            items: None,
            internal: false,
            is_key: false,
            key_order: None,
            enum_name: None,
            enum_values: Vec::new(),
            extensions: BTreeMap::new(),
            malformed: None,
        }
    }

    /// Parse a schema object. Fails only when the root is not a JSON object.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ConnectorError::schema(format!(
                "expected a schema object, found {}",
                json_kind(value)
            )));
        }
        Ok(Self::parse_lenient(value))
    }

    /// Parse a schema fragment from raw JSON text
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ConnectorError::schema(format!("invalid schema JSON: {}", e)))?;
        Self::from_json(&value)
    }

    fn parse_lenient(value: &Value) -> Self {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                let mut node = SchemaNode::new(SchemaKind::Unknown);
                node.declared_type = None;
                node.malformed = Some(format!("expected a schema object, found {}", json_kind(value)));
                return node;
            }
        };

        let declared_type = obj.get("type").and_then(Value::as_str).map(str::to_string);
        let mut kind = declared_type
            .as_deref()
            .map(SchemaKind::parse)
            .unwrap_or(SchemaKind::Unknown);

        // Untyped fragments that still describe a shape
        if declared_type.is_none() {
            if obj.contains_key("properties") {
                kind = SchemaKind::Object;
            } else if obj.contains_key("items") {
                kind = SchemaKind::Array;
            }
        }

        let mut node = SchemaNode::new(kind);
        node.declared_type = declared_type;
        node.format = obj.get("format").and_then(Value::as_str).map(str::to_string);
        node.description = obj.get("description").and_then(Value::as_str).map(str::to_string);
        node.display_name = obj
            .get("x-ms-display-name")
            .or_else(|| obj.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match obj.get("properties") {
            Some(Value::Object(props)) => {
                node.properties = props
                    .iter()
                    .map(|(name, child)| (name.clone(), SchemaNode::parse_lenient(child)))
                    .collect();
            }
            Some(other) => {
                node.malformed = Some(format!("'properties' must be an object, found {}", json_kind(other)));
            }
            None => {}
        }

        if let Some(Value::Array(required)) = obj.get("required") {
            node.required = required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        if let Some(items) = obj.get("items") {
            node.items = Some(Box::new(SchemaNode::parse_lenient(items)));
        }

        node.internal = obj
            .get("x-ms-visibility")
            .and_then(Value::as_str)
            .map(|v| v.eq_ignore_ascii_case("internal"))
            .unwrap_or(false);

        node.is_key = obj
            .get("x-ms-keyType")
            .and_then(Value::as_str)
            .map(|v| v.eq_ignore_ascii_case("primary"))
            .unwrap_or(false);
        node.key_order = obj
            .get("x-ms-keyOrder")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok());

        node.read_enum_metadata(obj);

        for (key, value) in obj {
            if key.starts_with("x-") && !is_recognized_extension(key) {
                node.extensions.insert(key.clone(), value.clone());
            }
        }

        node
    }

    fn read_enum_metadata(&mut self, obj: &serde_json::Map<String, Value>) {
        if let Some(Value::Array(values)) = obj.get("enum") {
            self.enum_values = values
                .iter()
                .filter_map(scalar_to_string)
                .map(|value| EnumValue {
                    value,
                    display_name: None,
                })
                .collect();
        }

        // x-ms-enum-values: [{ "value": ..., "displayName": ... }]
        if let Some(Value::Array(values)) = obj.get("x-ms-enum-values") {
            for entry in values {
                self.merge_enum_entry(entry, "displayName");
            }
        }

        // x-ms-enum: { "name": ..., "values": [{ "value": ..., "name": ... }] }
        if let Some(Value::Object(ms_enum)) = obj.get("x-ms-enum") {
            self.enum_name = ms_enum.get("name").and_then(Value::as_str).map(str::to_string);
            if let Some(Value::Array(values)) = ms_enum.get("values") {
                for entry in values {
                    self.merge_enum_entry(entry, "name");
                }
            }
        }
    }

    fn merge_enum_entry(&mut self, entry: &Value, display_key: &str) {
        let Some(value) = entry.get("value").and_then(scalar_to_string) else {
            return;
        };
        let display = entry
            .get(display_key)
            .and_then(Value::as_str)
            .map(str::to_string);

        match self.enum_values.iter_mut().find(|e| e.value == value) {
            Some(existing) => {
                if existing.display_name.is_none() {
                    existing.display_name = display;
                }
            }
            None => self.enum_values.push(EnumValue {
                value,
                display_name: display,
            }),
        }
    }

    /// `format: "enum"` is declared explicitly
    pub fn has_enum_format(&self) -> bool {
        self.format
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("enum"))
            .unwrap_or(false)
    }

    /// Carries enumeration members (from `enum` or vendor extensions)
    pub fn has_enum_metadata(&self) -> bool {
        !self.enum_values.is_empty()
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }
}

fn is_recognized_extension(key: &str) -> bool {
    matches!(
        key,
        "x-ms-visibility"
            | "x-ms-keyType"
            | "x-ms-keyOrder"
            | "x-ms-display-name"
            | "x-ms-enum-values"
            | "x-ms-enum"
    )
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_properties_keep_document_order() {
        let node = SchemaNode::from_json(&json!({
            "type": "object",
            "properties": {
                "zeta": { "type": "string" },
                "alpha": { "type": "integer" },
                "mid": { "type": "boolean" }
            }
        }))
        .unwrap();

        let names: Vec<&str> = node.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_vendor_extensions() {
        let node = SchemaNode::from_json(&json!({
            "type": "string",
            "title": "Fallback",
            "x-ms-display-name": "Shown",
            "x-ms-visibility": "internal",
            "x-ms-keyType": "primary",
            "x-ms-keyOrder": 2,
            "x-ms-sort": "none"
        }))
        .unwrap();

        assert_eq!(node.display_name.as_deref(), Some("Shown"));
        assert!(node.internal);
        assert!(node.is_key);
        assert_eq!(node.key_order, Some(2));
        assert_eq!(node.extensions.get("x-ms-sort"), Some(&json!("none")));
        assert!(!node.extensions.contains_key("x-ms-visibility"));
    }

    #[test]
    fn test_enum_metadata_merges_display_names() {
        let node = SchemaNode::from_json(&json!({
            "type": "string",
            "enum": ["1", "2"],
            "x-ms-enum-values": [
                { "value": "1", "displayName": "High" },
                { "value": "3", "displayName": "Low" }
            ]
        }))
        .unwrap();

        assert!(node.has_enum_metadata());
        assert!(!node.has_enum_format());
        assert_eq!(node.enum_values.len(), 3);
        assert_eq!(node.enum_values[0].display_name.as_deref(), Some("High"));
        assert_eq!(node.enum_values[1].display_name, None);
        assert_eq!(node.enum_values[2].value, "3");
    }

    #[test]
    fn test_malformed_property_is_kept() {
        let node = SchemaNode::from_json(&json!({
            "type": "object",
            "properties": {
                "ok": { "type": "string" },
                "bad": 42
            }
        }))
        .unwrap();

        assert!(node.property("ok").unwrap().malformed.is_none());
        let bad = node.property("bad").unwrap();
        assert_eq!(bad.kind, SchemaKind::Unknown);
        assert!(bad.malformed.as_deref().unwrap().contains("number"));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            SchemaNode::from_json(&json!([1, 2])),
            Err(ConnectorError::SchemaParse(_))
        ));
        assert!(SchemaNode::from_str("{not json").is_err());
    }

    #[test]
    fn test_shape_inferred_without_type() {
        let node = SchemaNode::from_json(&json!({ "properties": {} })).unwrap();
        assert_eq!(node.kind, SchemaKind::Object);
        let node = SchemaNode::from_json(&json!({ "items": { "type": "string" } })).unwrap();
        assert_eq!(node.kind, SchemaKind::Array);
    }
}
