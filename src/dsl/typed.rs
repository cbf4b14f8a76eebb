//! Typed validator library.
//!
//! A typed schema is JSON Schema by construction: every builder produces the keywords a
//! JSON Schema validator expects. On top of those keywords a schema carries members that
//! only make sense in process: internal markers (keys starting with `~`, such as the
//! schema kind or the optional flag) and check closures. Nullability is expressed as a
//! union with `null`, never as a flag.
//!
//! With the `typed` feature, [`of`] derives a schema from any Rust type implementing
//! `schemars::JsonSchema`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::upload::{FileField, UPLOAD_MARKER_KEY};

/// Marker holding the schema kind
pub const KIND_KEY: &str = "~kind";
/// Marker set on properties that may be left out
pub const OPTIONAL_KEY: &str = "~optional";

/// Prefix shared by all internal marker keys
pub const MARKER_PREFIX: char = '~';

/// A check closure attached to a schema
#[derive(Clone)]
pub struct Method(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl Method {
    pub fn call(&self, value: &Value) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

/// A member of a typed schema
#[derive(Debug, Clone)]
pub enum Member {
    Value(Value),
    Schema(Box<Schema>),
    List(Vec<Schema>),
    Properties(IndexMap<String, Schema>),
    Method(Method),
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    members: IndexMap<String, Member>,
}

fn kind(name: &str, json_type: Option<&str>) -> Schema {
    let mut schema = Schema::default();
    schema.set(KIND_KEY, Member::Value(json!(name)));
    if let Some(json_type) = json_type {
        schema.set("type", Member::Value(json!(json_type)));
    }
    schema
}

pub fn string() -> Schema {
    kind("String", Some("string"))
}

pub fn number() -> Schema {
    kind("Number", Some("number"))
}

pub fn integer() -> Schema {
    kind("Integer", Some("integer"))
}

pub fn boolean() -> Schema {
    kind("Boolean", Some("boolean"))
}

pub fn null() -> Schema {
    kind("Null", Some("null"))
}

pub fn literal(value: impl Into<Value>) -> Schema {
    let value = value.into();
    let json_type = match &value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        _ => "string",
    };
    kind("Literal", Some(json_type)).with("enum", json!([value]))
}

/// An object; every property not wrapped in [`optional`] is listed in `required`
pub fn object<I, K>(properties: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    let properties: IndexMap<String, Schema> = properties
        .into_iter()
        .map(|(name, schema)| (name.into(), schema))
        .collect();
    let required: Vec<&String> = properties
        .iter()
        .filter(|(_, schema)| !schema.is_optional())
        .map(|(name, _)| name)
        .collect();
    let required = json!(required);

    let mut schema = kind("Object", Some("object"));
    if required.as_array().map(|r| !r.is_empty()).unwrap_or(false) {
        schema.set("required", Member::Value(required));
    }
    schema.set("properties", Member::Properties(properties));
    schema
}

pub fn array(items: Schema) -> Schema {
    let mut schema = kind("Array", Some("array"));
    schema.set("items", Member::Schema(Box::new(items)));
    schema
}

pub fn union<I>(variants: I) -> Schema
where
    I: IntoIterator<Item = Schema>,
{
    let mut schema = kind("Union", None);
    schema.set("anyOf", Member::List(variants.into_iter().collect()));
    schema
}

/// `schema` or `null`
pub fn nullable(schema: Schema) -> Schema {
    union([schema, null()])
}

/// Mark a property as optional within its object
pub fn optional(mut schema: Schema) -> Schema {
    schema.set(OPTIONAL_KEY, Member::Value(json!(true)));
    schema
}

/// A file field, carried as its marked upload node
pub fn file(field: FileField) -> Schema {
    let node = field.to_schema();
    let mut schema = match serde_json::to_value(&node) {
        Ok(value) => Schema::from_json(value),
        Err(_) => Schema::default(),
    };
    schema.set(KIND_KEY, Member::Value(json!("File")));
    if field.optional {
        schema.set(OPTIONAL_KEY, Member::Value(json!(true)));
    }
    schema
}

/// The schema `schemars` generates for `T` with OpenAPI 3.0 settings, inlined so the
/// result carries no `$ref`s
#[cfg(feature = "typed")]
pub fn of<T: schemars::JsonSchema>() -> Schema {
    let mut settings = schemars::generate::SchemaSettings::openapi3();
    settings.inline_subschemas = true;
    let root = settings.into_generator().into_root_schema_for::<T>();

    let mut schema = match serde_json::to_value(&root) {
        Ok(Value::Object(mut map)) => {
            map.retain(|key, _| key != "$schema");
            Schema::from_json(Value::Object(map))
        }
        _ => Schema::default(),
    };
    schema.set(KIND_KEY, Member::Value(json!(T::schema_name())));
    schema
}

impl Schema {
    /// Wrap plain JSON Schema. Nested values are kept as they are.
    pub fn from_json(value: Value) -> Schema {
        let mut schema = Schema::default();
        match value {
            Value::Object(map) => {
                for (key, member) in map {
                    schema.set(&key, Member::Value(member));
                }
            }
            other => schema.set("const", Member::Value(other)),
        }
        schema
    }

    /// Set a JSON Schema keyword
    pub fn with(mut self, keyword: &str, value: impl Into<Value>) -> Self {
        self.set(keyword, Member::Value(value.into()));
        self
    }

    pub fn describe(self, description: impl Into<String>) -> Self {
        self.with("description", description.into())
    }

    /// Attach a check closure under `name`
    pub fn check<F>(mut self, name: &str, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.set(name, Member::Method(Method(Arc::new(check))));
        self
    }

    fn set(&mut self, key: &str, member: Member) {
        self.members.insert(key.to_string(), member);
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(key, member)| (key.as_str(), member))
    }

    pub fn get(&self, key: &str) -> Option<&Member> {
        self.members.get(key)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.members.get(OPTIONAL_KEY), Some(Member::Value(Value::Bool(true))))
    }

    /// Run the check closures attached directly to this schema
    pub fn accepts(&self, value: &Value) -> bool {
        self.members.values().all(|member| match member {
            Member::Method(method) => method.call(value),
            _ => true,
        })
    }
}

/// True for keys that only make sense in process
pub fn is_marker(key: &str) -> bool {
    key.starts_with(MARKER_PREFIX)
}

/// Whether a key is the upload marker, which is kept until the final cleanup
pub fn is_upload_marker(key: &str) -> bool {
    key == UPLOAD_MARKER_KEY
}
