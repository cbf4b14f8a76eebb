//! Validator schema libraries understood by the normalizer.
//!
//! Each library describes request and response shapes in its own way:
//!
//! - [`rules`]: schema-first rules that compile into a field tree whose constraints live
//!   in a separate refs table
//! - [`shape`]: structural shapes with a JSON Schema emitter built on `schemars`
//! - [`typed`]: schemas that are JSON Schema by construction, decorated with internal
//!   markers and check closures
//!
//! The normalizer in [`crate::normalizer`] turns any of them into a canonical
//! [`crate::schema::Schema`].

pub mod rules;
pub mod shape;
pub mod typed;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A schema as handed to the documentation builders, in whichever library it was written
#[derive(Debug, Clone)]
pub enum SourceSchema {
    Rules(rules::Schema),
    Shape(shape::Schema),
    Typed(typed::Schema),
    /// Plain JSON Schema
    Json(Value),
}

impl SourceSchema {
    /// Short name of the library the schema was written with
    pub fn label(&self) -> &'static str {
        match self {
            SourceSchema::Rules(_) => "rules",
            SourceSchema::Shape(_) => "shape",
            SourceSchema::Typed(_) => "typed",
            SourceSchema::Json(_) => "json",
        }
    }
}

impl From<rules::Schema> for SourceSchema {
    fn from(schema: rules::Schema) -> Self {
        SourceSchema::Rules(schema)
    }
}

impl From<shape::Schema> for SourceSchema {
    fn from(schema: shape::Schema) -> Self {
        SourceSchema::Shape(schema)
    }
}

impl From<typed::Schema> for SourceSchema {
    fn from(schema: typed::Schema) -> Self {
        SourceSchema::Typed(schema)
    }
}

impl From<Value> for SourceSchema {
    fn from(value: Value) -> Self {
        SourceSchema::Json(value)
    }
}

/// Manifests on disk can only carry JSON, so that is what deserializes
impl<'de> Deserialize<'de> for SourceSchema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(SourceSchema::Json)
    }
}
