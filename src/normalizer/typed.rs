//! Conversion path for the typed validator.
//!
//! Typed schemas are already JSON Schema, so conversion is a walk that drops what cannot
//! go on the wire (marker members and check closures) followed by a `required` fixup:
//! a property whose `anyOf` admits a bare `null` is not required.

use serde_json::{Map, Value};

use super::{mismatch, SchemaConverter, ValidatorKind};
use crate::dsl::typed::{is_marker, Member, Schema as TypedSchema};
use crate::dsl::SourceSchema;
use crate::error::Result;
use crate::schema::Schema;

pub struct TypedConverter;

impl SchemaConverter for TypedConverter {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Typed
    }

    fn convert(&self, source: &SourceSchema) -> Result<Schema> {
        let wire = match source {
            SourceSchema::Typed(schema) => to_wire(schema),
            SourceSchema::Json(value) => strip_json_markers(value),
            other => return Err(mismatch(ValidatorKind::Typed, other)),
        };
        let converted: Schema = serde_json::from_value(wire)?;
        Ok(converted.prune_required(&Schema::has_null_branch))
    }
}

/// The JSON form of a typed schema without markers or methods
pub fn to_wire(schema: &TypedSchema) -> Value {
    let mut out = Map::new();
    for (key, member) in schema.members() {
        if is_marker(key) {
            continue;
        }
        let value = match member {
            Member::Value(value) => strip_json_markers(value),
            Member::Schema(inner) => to_wire(inner),
            Member::List(variants) => Value::Array(variants.iter().map(to_wire).collect()),
            Member::Properties(properties) => Value::Object(
                properties
                    .iter()
                    .map(|(name, property)| (name.clone(), to_wire(property)))
                    .collect(),
            ),
            Member::Method(_) => continue,
        };
        out.insert(key.to_string(), value);
    }
    Value::Object(out)
}

fn strip_json_markers(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_marker(key))
                .map(|(key, inner)| (key.clone(), strip_json_markers(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_json_markers).collect()),
        other => other.clone(),
    }
}
