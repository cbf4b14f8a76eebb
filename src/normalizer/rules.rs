//! Conversion path for the rules validator.
//!
//! The schema is compiled and the resulting field tree is walked. Rule options are looked
//! up in the compiled refs table and mapped onto the JSON Schema keyword that fits the
//! field's subtype. Object nodes are closed with `additionalProperties: false`.

use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use super::{mismatch, SchemaConverter, ValidatorKind};
use crate::dsl::rules::{Compiled, Node, NodeType, Schema as RulesSchema, Subtype, Validation};
use crate::dsl::SourceSchema;
use crate::error::Result;
use crate::schema::{AdditionalProperties, Schema};
use crate::upload;

pub struct RulesConverter;

impl SchemaConverter for RulesConverter {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Rules
    }

    fn convert(&self, source: &SourceSchema) -> Result<Schema> {
        match source {
            SourceSchema::Rules(schema) => convert_rules(schema),
            other => Err(mismatch(ValidatorKind::Rules, other)),
        }
    }
}

/// File fields are taken out before compiling and put back afterwards
fn convert_rules(schema: &RulesSchema) -> Result<Schema> {
    let (compilable, uploads) = schema.split_uploads();
    if !uploads.is_empty() {
        debug!("Extracted {} file field(s) before compiling", uploads.len());
    }

    let compiled = compilable.compile()?;
    let converted = node_to_schema(&compiled, &compiled.root);
    Ok(upload::merge_uploads(converted, uploads))
}

fn node_to_schema(compiled: &Compiled, node: &Node) -> Schema {
    let mut schema = match node.node_type {
        NodeType::Object => object_schema(compiled, node),
        NodeType::Array => {
            let items = node
                .each
                .as_ref()
                .map(|each| node_to_schema(compiled, each))
                .unwrap_or_default();
            Schema::array(items)
        }
        NodeType::Literal => literal_schema(node.subtype),
    };

    for validation in &node.validations {
        apply_validation(&mut schema, node, validation, compiled.options(validation));
    }
    if node.allow_null {
        schema.nullable = Some(true);
    }
    schema
}

fn object_schema(compiled: &Compiled, node: &Node) -> Schema {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();
    for child in &node.properties {
        properties.insert(child.field_name.clone(), node_to_schema(compiled, child));
        if !child.is_optional && !child.allow_null {
            required.push(child.field_name.clone());
        }
    }

    Schema {
        properties: Some(properties),
        required: if required.is_empty() { None } else { Some(required) },
        additional_properties: Some(AdditionalProperties::Allowed(false)),
        ..Schema::object()
    }
}

fn literal_schema(subtype: Option<Subtype>) -> Schema {
    match subtype {
        Some(Subtype::Number) => Schema::number(),
        Some(Subtype::Boolean) => Schema::boolean(),
        Some(Subtype::Date) => Schema::string().with_format("date-time"),
        Some(Subtype::String) | None => Schema::string(),
    }
}

fn apply_validation(
    schema: &mut Schema,
    node: &Node,
    validation: &Validation,
    options: Option<&Value>,
) {
    let option = |key: &str| options.and_then(|o| o.get(key)).cloned();
    let is_array = node.node_type == NodeType::Array;
    let is_number = node.subtype == Some(Subtype::Number);

    match validation.rule.as_str() {
        "min" => {
            if let Some(Value::Number(min)) = option("min") {
                if is_number {
                    schema.minimum = Some(min);
                } else if is_array {
                    schema.min_items = min.as_u64();
                } else {
                    schema.min_length = min.as_u64();
                }
            }
        }
        "max" => {
            if let Some(Value::Number(max)) = option("max") {
                if is_number {
                    schema.maximum = Some(max);
                } else if is_array {
                    schema.max_items = max.as_u64();
                } else {
                    schema.max_length = max.as_u64();
                }
            }
        }
        "fixedLength" => {
            let size = option("size").and_then(|size| size.as_u64());
            if is_array {
                schema.min_items = size;
                schema.max_items = size;
            } else {
                schema.min_length = size;
                schema.max_length = size;
            }
        }
        "email" => schema.format = Some("email".to_string()),
        "url" => schema.format = Some("uri".to_string()),
        "uuid" => schema.format = Some("uuid".to_string()),
        "regex" => {
            schema.pattern = option("pattern").and_then(|p| p.as_str().map(str::to_string));
        }
        "enum" => {
            if let Some(Value::Array(choices)) = option("choices") {
                schema.enum_values = Some(choices);
            }
        }
        other => debug!("Ignoring unknown rule `{}` on `{}`", other, node.field_name),
    }
}
