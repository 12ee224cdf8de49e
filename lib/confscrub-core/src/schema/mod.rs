//! Entity schemas and the providers that supply them.
//!
//! Only the parts of a schema that matter for exemption inference are kept: field names,
//! declared types, nested records and element schemas, and whether a field's domain is
//! enumerated (`one_of` / `enum`).
//!
//! Two wire shapes are understood:
//!
//! - the gateway's native shape, where `fields` is an array of single-key objects:
//!   `{"fields": [{"config": {"type": "record", "fields": [...]}}]}`
//! - the JSON Schema shape served in Konnect mode:
//!   `{"properties": {"config": {"type": "object", "properties": {...}}}}`

use serde_json::{Map, Value};

use crate::error::SchemaError;

mod provider;
pub use self::provider::{
    OfflineSchemaProvider, SchemaProvider, StaticSchemaProvider, konnect_entity_name,
};

#[cfg(feature = "admin-api")]
mod admin;
#[cfg(feature = "admin-api")]
pub use self::admin::{AdminSchemaProvider, AdminSchemaProviderBuilder, AdminToken};

/// What a schema is requested for: the dynamic configuration of a named plugin, partial or
/// vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SchemaTarget {
    /// A plugin, by plugin name (e.g. `rate-limiting`).
    #[display("plugins/{_0}")]
    Plugin(String),
    /// A partial, by partial type (e.g. `redis-ee`).
    #[display("partials/{_0}")]
    Partial(String),
    /// A vault, by vault name (e.g. `env`).
    #[display("vaults/{_0}")]
    Vault(String),
}

impl SchemaTarget {
    /// The entity collection this target belongs to, as named in the gateway admin API.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Plugin(_) => "plugins",
            Self::Partial(_) => "partials",
            Self::Vault(_) => "vaults",
        }
    }

    /// The plugin name, partial type or vault name.
    pub fn name(&self) -> &str {
        match self {
            Self::Plugin(name) | Self::Partial(name) | Self::Vault(name) => name,
        }
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldType {
    /// `string`
    String,
    /// `array`
    Array,
    /// `set`
    Set,
    /// `record` (gateway) or `object` (JSON Schema)
    Record,
    /// `map`
    Map,
    /// `number` or `integer`
    Number,
    /// `boolean`
    Boolean,
    /// Anything else (`foreign`, `json`, unknown types).
    #[default]
    Other,
}

impl FieldType {
    fn parse(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "array" => Self::Array,
            "set" => Self::Set,
            "record" | "object" => Self::Record,
            "map" => Self::Map,
            "number" | "integer" => Self::Number,
            "boolean" => Self::Boolean,
            _ => Self::Other,
        }
    }
}

/// A named field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Field name, as written in the schema.
    pub name: String,
    /// The field's type description.
    pub node: SchemaNode,
}

/// Type description of a single schema field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// Declared type.
    pub kind: FieldType,
    /// Whether the domain is a closed list of values.
    pub enumerated: bool,
    /// Element schema of arrays and sets.
    pub elements: Option<Box<SchemaNode>>,
    /// Nested fields of records.
    pub fields: Vec<SchemaField>,
}

impl SchemaNode {
    /// A string node, enumerated or not.
    pub fn string(enumerated: bool) -> Self {
        Self {
            kind: FieldType::String,
            enumerated,
            ..Self::default()
        }
    }

    /// An array node with the given element schema.
    pub fn array(elements: Self) -> Self {
        Self {
            kind: FieldType::Array,
            elements: Some(Box::new(elements)),
            ..Self::default()
        }
    }

    /// A record node with the given fields.
    pub fn record(fields: Vec<SchemaField>) -> Self {
        Self {
            kind: FieldType::Record,
            fields,
            ..Self::default()
        }
    }
}

/// Description of an entity type's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySchema {
    /// Top-level fields.
    pub fields: Vec<SchemaField>,
}

impl EntitySchema {
    /// Builds a schema from its top-level fields.
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Parses a schema payload in either the gateway or the JSON Schema shape.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the payload is neither shape.
    pub fn from_json(target: &SchemaTarget, payload: &Value) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::Invalid {
            target: target.clone(),
            reason: reason.to_string(),
        };

        let Some(object) = payload.as_object() else {
            return Err(invalid("expected a JSON object"));
        };

        if let Some(fields) = object.get("fields") {
            let fields = fields
                .as_array()
                .ok_or_else(|| invalid("'fields' must be an array"))?;
            Ok(Self::new(parse_field_list(fields)))
        } else if let Some(properties) = object.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| invalid("'properties' must be an object"))?;
            Ok(Self::new(parse_properties(properties)))
        } else {
            Err(invalid("expected 'fields' or 'properties'"))
        }
    }
}

impl SchemaField {
    /// Creates a named field.
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

// gateway shape: [{"name": {...}}, ...]
fn parse_field_list(fields: &[Value]) -> Vec<SchemaField> {
    fields
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|entry| entry.iter())
        .map(|(name, node)| SchemaField::new(name.clone(), parse_node(node)))
        .collect()
}

// JSON Schema shape: {"name": {...}, ...}
fn parse_properties(properties: &Map<String, Value>) -> Vec<SchemaField> {
    properties
        .iter()
        .map(|(name, node)| SchemaField::new(name.clone(), parse_node(node)))
        .collect()
}

fn parse_node(node: &Value) -> SchemaNode {
    let Some(object) = node.as_object() else {
        return SchemaNode::default();
    };

    let kind = match object.get("type") {
        Some(Value::String(name)) => FieldType::parse(name),
        // JSON Schema allows ["string", "null"]
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null")
            .map_or(FieldType::Other, FieldType::parse),
        _ if object.contains_key("properties") => FieldType::Record,
        _ => FieldType::Other,
    };

    let enumerated = ["one_of", "enum"]
        .iter()
        .any(|marker| object.get(*marker).is_some_and(|it| !it.is_null()));

    let elements = object
        .get("elements")
        .or_else(|| object.get("items"))
        .map(|it| Box::new(parse_node(it)));

    let fields = match (object.get("fields"), object.get("properties")) {
        (Some(Value::Array(fields)), _) => parse_field_list(fields),
        (_, Some(Value::Object(properties))) => parse_properties(properties),
        _ => Vec::new(),
    };

    SchemaNode {
        kind,
        enumerated,
        elements,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> SchemaTarget {
        SchemaTarget::Plugin("rate-limiting".to_string())
    }

    #[test]
    fn should_display_targets() {
        assert_eq!(target().to_string(), "plugins/rate-limiting");
        assert_eq!(
            SchemaTarget::Partial("redis-ee".to_string()).to_string(),
            "partials/redis-ee"
        );
        assert_eq!(SchemaTarget::Vault("env".to_string()).collection(), "vaults");
    }

    #[test]
    fn should_parse_gateway_schema() {
        let payload = json!({
            "fields": [
                {"protocols": {"type": "set", "elements": {"type": "string", "one_of": ["http", "https"]}}},
                {"config": {
                    "type": "record",
                    "fields": [
                        {"policy": {"type": "string", "one_of": ["local", "redis"]}},
                        {"limit_by": {"type": "string", "default": "consumer"}},
                        {"minute": {"type": "number"}}
                    ]
                }}
            ]
        });

        let schema = EntitySchema::from_json(&target(), &payload).expect("valid schema");

        let expected = EntitySchema::new(vec![
            SchemaField::new(
                "protocols",
                SchemaNode {
                    kind: FieldType::Set,
                    elements: Some(Box::new(SchemaNode::string(true))),
                    ..SchemaNode::default()
                },
            ),
            SchemaField::new(
                "config",
                SchemaNode::record(vec![
                    SchemaField::new("policy", SchemaNode::string(true)),
                    SchemaField::new("limit_by", SchemaNode::string(false)),
                    SchemaField::new(
                        "minute",
                        SchemaNode {
                            kind: FieldType::Number,
                            ..SchemaNode::default()
                        },
                    ),
                ]),
            ),
        ]);
        assert_eq!(schema, expected);
    }

    #[test]
    fn should_parse_json_schema() {
        let payload = json!({
            "properties": {
                "config": {
                    "type": "object",
                    "properties": {
                        "strategy": {"type": ["string", "null"], "enum": ["memory", "redis"]},
                        "header_names": {"type": "array", "items": {"type": "string"}}
                    }
                }
            }
        });

        let schema = EntitySchema::from_json(&target(), &payload).expect("valid schema");

        let expected = EntitySchema::new(vec![SchemaField::new(
            "config",
            SchemaNode::record(vec![
                SchemaField::new("strategy", SchemaNode::string(true)),
                SchemaField::new("header_names", SchemaNode::array(SchemaNode::string(false))),
            ]),
        )]);
        assert_eq!(schema, expected);
    }

    #[test]
    fn should_ignore_null_enumeration_marker() {
        let payload = json!({"fields": [{"name": {"type": "string", "one_of": null}}]});

        let schema = EntitySchema::from_json(&target(), &payload).expect("valid schema");

        assert_eq!(
            schema.fields,
            vec![SchemaField::new("name", SchemaNode::string(false))]
        );
    }

    #[test]
    fn should_reject_unknown_payload() {
        let result = EntitySchema::from_json(&target(), &json!({"message": "Not found"}));

        let error = result.expect_err("should be invalid");
        insta::assert_snapshot!(
            error,
            @"Invalid schema for 'plugins/rate-limiting': expected 'fields' or 'properties'"
        );
    }

    #[test]
    fn should_reject_non_object_payload() {
        let result = EntitySchema::from_json(&target(), &json!([1, 2, 3]));

        assert!(matches!(result, Err(SchemaError::Invalid { .. })));
    }
}
