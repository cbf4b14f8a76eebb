//! Canonical schema tree produced by every conversion path.
//!
//! A [`Schema`] is a JSON-Schema-like node with the OpenAPI 3.0 flavour of nullability
//! (`nullable: true`). Keywords the tree does not model explicitly are kept in
//! [`Schema::extensions`], so raw JSON Schema passes through without loss.
//!
//! Transforms take the tree by value and hand back a new one. Callers that need to keep
//! the source around clone it first, which keeps repeated conversions of the same source
//! independent of each other.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::upload::UploadKind;

/// A node of the canonical schema tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the node (object, array, string, number, boolean)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format hint for primitive types (e.g. "date-time", "email", "binary")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Human readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object nodes, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Names of the properties that must be present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Whether undeclared properties are accepted
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    /// Items schema for array nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// OpenAPI 3.0 nullability flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Internal file upload marker, removed by [`crate::upload::strip_markers`]
    #[serde(rename = "x-upload-marker", skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadKind>,
    /// Any other keyword, kept verbatim
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// `additionalProperties` is either a flag or a schema for the extra values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

impl Schema {
    /// Create a node of the given type with no other keywords
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        Self::of_type("object")
    }

    pub fn string() -> Self {
        Self::of_type("string")
    }

    pub fn number() -> Self {
        Self::of_type("number")
    }

    pub fn boolean() -> Self {
        Self::of_type("boolean")
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }

    /// Placeholder returned when a source schema cannot be converted
    pub fn fallback(label: &str) -> Self {
        Self::object().with_description(format!("{} schema (conversion failed)", label))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Add a property, keeping insertion order
    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), schema);
        self
    }

    pub fn is_type(&self, schema_type: &str) -> bool {
        self.schema_type.as_deref() == Some(schema_type)
    }

    /// `nullable: true` is set on this node
    pub fn is_nullable(&self) -> bool {
        self.nullable == Some(true)
    }

    /// One of the `anyOf` branches is a bare `{"type": "null"}`
    pub fn has_null_branch(&self) -> bool {
        self.any_of
            .as_ref()
            .map(|branches| branches.iter().any(Schema::is_bare_null))
            .unwrap_or(false)
    }

    fn is_bare_null(&self) -> bool {
        self.is_type("null") && self.properties.is_none() && self.items.is_none()
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties.as_ref().and_then(|props| props.get(name))
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required
            .as_ref()
            .map(|required| required.iter().any(|r| r == name))
            .unwrap_or(false)
    }

    /// Rewrite every node of the tree bottom-up.
    ///
    /// Children reachable through `properties`, `items`, `anyOf`, `oneOf` and `allOf`
    /// are rewritten before their parent is handed to `f`.
    pub fn map_nodes<F>(self, f: &F) -> Schema
    where
        F: Fn(Schema) -> Schema,
    {
        let mut node = self;
        node.properties = node.properties.map(|props| {
            props
                .into_iter()
                .map(|(name, child)| (name, child.map_nodes(f)))
                .collect()
        });
        node.items = node.items.map(|items| Box::new(items.map_nodes(f)));
        node.any_of = node.any_of.map(|branches| map_all(branches, f));
        node.one_of = node.one_of.map(|branches| map_all(branches, f));
        node.all_of = node.all_of.map(|branches| map_all(branches, f));
        f(node)
    }

    /// True when `pred` holds for this node or any node below it
    pub fn any_node<P>(&self, pred: &P) -> bool
    where
        P: Fn(&Schema) -> bool,
    {
        if pred(self) {
            return true;
        }
        let in_props = self
            .properties
            .as_ref()
            .map(|props| props.values().any(|child| child.any_node(pred)))
            .unwrap_or(false);
        let in_items = self
            .items
            .as_ref()
            .map(|items| items.any_node(pred))
            .unwrap_or(false);
        let in_branches = [&self.any_of, &self.one_of, &self.all_of]
            .into_iter()
            .flatten()
            .any(|branches| branches.iter().any(|child| child.any_node(pred)));
        in_props || in_items || in_branches
    }

    /// Drop from every object's `required` list the properties for which `admits_null`
    /// holds. An emptied list is removed altogether.
    pub fn prune_required<P>(self, admits_null: &P) -> Schema
    where
        P: Fn(&Schema) -> bool,
    {
        self.map_nodes(&|mut node: Schema| {
            let kept: Option<Vec<String>> = match (&node.required, &node.properties) {
                (Some(required), Some(props)) => Some(
                    required
                        .iter()
                        .filter(|name| props.get(*name).map(|p| !admits_null(p)).unwrap_or(true))
                        .cloned()
                        .collect(),
                ),
                _ => None,
            };
            if let Some(kept) = kept {
                node.required = if kept.is_empty() { None } else { Some(kept) };
            }
            node
        })
    }
}

fn map_all<F>(branches: Vec<Schema>, f: &F) -> Vec<Schema>
where
    F: Fn(Schema) -> Schema,
{
    branches.into_iter().map(|branch| branch.map_nodes(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_serialize_skips_empty_keywords() {
        let schema = Schema::object().with_property("name", Schema::string());
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({"type": "object", "properties": {"name": {"type": "string"}}})
        );
    }

    #[test]
    fn test_unknown_keywords_survive_round_trip() {
        let raw = json!({
            "type": "integer",
            "exclusiveMinimum": true,
            "x-order": 3
        });
        let schema: Schema = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(schema.extensions.get("x-order"), Some(&json!(3)));
        assert_eq!(serde_json::to_value(&schema).unwrap(), raw);
    }

    #[test]
    fn test_additional_properties_accepts_schema() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "additionalProperties": {"type": "string"}
        }))
        .unwrap();
        assert!(matches!(
            schema.additional_properties,
            Some(AdditionalProperties::Schema(_))
        ));
    }

    #[test]
    fn test_fallback_describes_the_failure() {
        let schema = Schema::fallback("shape");
        assert!(schema.is_type("object"));
        assert_eq!(
            schema.description.as_deref(),
            Some("shape schema (conversion failed)")
        );
    }

    #[test]
    fn test_map_nodes_reaches_nested_branches() {
        let schema = Schema::object().with_property(
            "tags",
            Schema::array(Schema {
                any_of: Some(vec![Schema::string(), Schema::number()]),
                ..Schema::default()
            }),
        );
        let described = schema.map_nodes(&|node: Schema| node.with_description("seen"));
        let items = described.property("tags").unwrap().items.as_ref().unwrap();
        assert_eq!(items.description.as_deref(), Some("seen"));
        for branch in items.any_of.as_ref().unwrap() {
            assert_eq!(branch.description.as_deref(), Some("seen"));
        }
    }

    #[test]
    fn test_prune_required_keeps_unknown_names() {
        let schema = Schema {
            required: Some(vec!["a".to_string(), "b".to_string(), "ghost".to_string()]),
            ..Schema::object()
        }
        .with_property("a", Schema::string())
        .with_property(
            "b",
            Schema {
                nullable: Some(true),
                ..Schema::string()
            },
        );
        let pruned = schema.prune_required(&Schema::is_nullable);
        assert_eq!(
            pruned.required,
            Some(vec!["a".to_string(), "ghost".to_string()])
        );
    }

    #[test]
    fn test_has_null_branch() {
        let schema = Schema {
            any_of: Some(vec![Schema::string(), Schema::of_type("null")]),
            ..Schema::default()
        };
        assert!(schema.has_null_branch());
        assert!(!Schema::string().has_null_branch());
    }
}
