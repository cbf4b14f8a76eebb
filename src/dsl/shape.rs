//! Shape validator library.
//!
//! Shapes describe values structurally and already look a lot like JSON Schema. With the
//! `shape` feature the library emits JSON Schema through [`Schema::to_json_schema`],
//! built on `schemars`: the shape is written out as a draft 2020-12 schema and then run
//! through the transforms of the chosen `SchemaSettings`, so the OpenAPI 3.0 flavour
//! carries `nullable: true` where plain JSON Schema has a `null` type.

#![cfg_attr(not(feature = "shape"), allow(dead_code))]

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::upload::{ExtractedUpload, FieldPath, FileField, PathSegment};

#[cfg(feature = "shape")]
pub use emit::{Target, DATETIME_PATTERN};

#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    optional: bool,
    nullable: bool,
    description: Option<String>,
    default: Option<Value>,
}

#[derive(Debug, Clone)]
enum Kind {
    String(StringChecks),
    Number(Bounds, bool),
    Boolean,
    Enum(Vec<String>),
    Literal(Value),
    Object(IndexMap<String, Schema>),
    Array(Box<Schema>, Bounds),
    Union(Vec<Schema>),
    File(FileField),
}

#[derive(Debug, Clone, Default)]
struct Bounds {
    min: Option<Number>,
    max: Option<Number>,
}

#[derive(Debug, Clone, Default)]
struct StringChecks {
    bounds: Bounds,
    format: Option<&'static str>,
    regex: Option<String>,
}

fn shape(kind: Kind) -> Schema {
    Schema {
        kind,
        optional: false,
        nullable: false,
        description: None,
        default: None,
    }
}

pub fn string() -> Schema {
    shape(Kind::String(StringChecks::default()))
}

/// An ISO 8601 date-time string
pub fn datetime() -> Schema {
    string().datetime()
}

pub fn number() -> Schema {
    shape(Kind::Number(Bounds::default(), false))
}

pub fn int() -> Schema {
    shape(Kind::Number(Bounds::default(), true))
}

pub fn boolean() -> Schema {
    shape(Kind::Boolean)
}

pub fn enumeration<I, S>(values: I) -> Schema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    shape(Kind::Enum(values.into_iter().map(Into::into).collect()))
}

pub fn literal(value: impl Into<Value>) -> Schema {
    shape(Kind::Literal(value.into()))
}

pub fn object<I, K>(fields: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    shape(Kind::Object(
        fields.into_iter().map(|(name, field)| (name.into(), field)).collect(),
    ))
}

pub fn array(item: Schema) -> Schema {
    shape(Kind::Array(Box::new(item), Bounds::default()))
}

pub fn union<I>(options: I) -> Schema
where
    I: IntoIterator<Item = Schema>,
{
    shape(Kind::Union(options.into_iter().collect()))
}

/// A file field; the emitter rejects it
pub fn file(field: FileField) -> Schema {
    shape(Kind::File(field))
}

impl Schema {
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Minimum value, length or item count depending on the shape
    pub fn min(mut self, min: impl Into<Number>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.min = Some(min.into());
        }
        self
    }

    /// Maximum value, length or item count depending on the shape
    pub fn max(mut self, max: impl Into<Number>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.max = Some(max.into());
        }
        self
    }

    pub fn email(self) -> Self {
        self.string_format("email")
    }

    pub fn url(self) -> Self {
        self.string_format("uri")
    }

    pub fn uuid(self) -> Self {
        self.string_format("uuid")
    }

    pub fn datetime(self) -> Self {
        self.string_format("date-time")
    }

    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        if let Kind::String(checks) = &mut self.kind {
            checks.regex = Some(pattern.into());
        }
        self
    }

    fn string_format(mut self, format: &'static str) -> Self {
        if let Kind::String(checks) = &mut self.kind {
            checks.format = Some(format);
        }
        self
    }

    fn bounds_mut(&mut self) -> Option<&mut Bounds> {
        match &mut self.kind {
            Kind::String(checks) => Some(&mut checks.bounds),
            Kind::Number(bounds, _) | Kind::Array(_, bounds) => Some(bounds),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The object's fields, in declaration order
    pub fn fields(&self) -> Option<&IndexMap<String, Schema>> {
        match &self.kind {
            Kind::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn file_field(&self) -> Option<&FileField> {
        match &self.kind {
            Kind::File(field) => Some(field),
            _ => None,
        }
    }

    /// A copy of this shape with every file field taken out, at any depth, together
    /// with the fields taken. Unions are not searched.
    pub fn split_uploads(&self) -> (Schema, Vec<ExtractedUpload>) {
        let mut copy = self.clone();
        let mut found = Vec::new();
        copy.take_uploads(&FieldPath::default(), &mut found);
        (copy, found)
    }

    fn take_uploads(&mut self, path: &FieldPath, found: &mut Vec<ExtractedUpload>) {
        match &mut self.kind {
            Kind::Object(fields) => fields.retain(|name, field| {
                let path = path.child(PathSegment::Property(name.clone()));
                if let Some(file) = field.file_field() {
                    found.push(ExtractedUpload::new(path, file, field.optional));
                    return false;
                }
                field.take_uploads(&path, found);
                true
            }),
            Kind::Array(item, _) => {
                let path = path.child(PathSegment::Items);
                if let Some(file) = item.file_field() {
                    found.push(ExtractedUpload::new(path, file, false));
                    **item = string();
                } else {
                    item.take_uploads(&path, found);
                }
            }
            _ => {}
        }
    }
}

#[cfg(feature = "shape")]
mod emit {
    use schemars::generate::SchemaSettings;
    use schemars::transform::Transform;
    use serde_json::{json, Map, Value};

    use super::{Bounds, Kind, Schema};
    use crate::error::{Error, Result};

    const VALIDATOR: &str = "shape";

    /// Pattern attached to date-time strings by the emitter
    pub const DATETIME_PATTERN: &str =
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$";

    /// Output flavour of the emitter
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Target {
        OpenApi3,
        JsonSchema7,
    }

    impl Target {
        /// Settings whose transforms turn emitted shapes into this flavour
        pub fn settings(self) -> SchemaSettings {
            match self {
                Target::OpenApi3 => SchemaSettings::openapi3(),
                Target::JsonSchema7 => SchemaSettings::draft07(),
            }
        }
    }

    impl Schema {
        /// Emit a JSON Schema document for this shape
        pub fn to_json_schema(&self, target: Target) -> Result<Value> {
            let mut schema = schemars::Schema::from(self.emit(target)?);
            let mut settings = target.settings();
            for transform in settings.transforms.iter_mut() {
                transform.transform(&mut schema);
            }
            Ok(serde_json::to_value(&schema)?)
        }

        fn emit(&self, target: Target) -> Result<Map<String, Value>> {
            let mut out = self.emit_kind(target)?;
            if let Some(description) = &self.description {
                out.insert("description".to_string(), json!(description));
            }
            if let Some(default) = &self.default {
                out.insert("default".to_string(), default.clone());
            }
            if self.nullable {
                admit_null(&mut out, target);
            }
            Ok(out)
        }

        fn emit_kind(&self, target: Target) -> Result<Map<String, Value>> {
            let mut out = Map::new();
            match &self.kind {
                Kind::String(checks) => {
                    out.insert("type".to_string(), json!("string"));
                    insert_bounds(&mut out, &checks.bounds, "minLength", "maxLength");
                    if let Some(format) = checks.format {
                        out.insert("format".to_string(), json!(format));
                        if format == "date-time" {
                            out.insert("pattern".to_string(), json!(DATETIME_PATTERN));
                        }
                    }
                    if let Some(pattern) = &checks.regex {
                        out.insert("pattern".to_string(), json!(pattern));
                    }
                }
                Kind::Number(bounds, integer) => {
                    let name = if *integer { "integer" } else { "number" };
                    out.insert("type".to_string(), json!(name));
                    insert_bounds(&mut out, bounds, "minimum", "maximum");
                }
                Kind::Boolean => {
                    out.insert("type".to_string(), json!("boolean"));
                }
                Kind::Enum(values) => {
                    out.insert("type".to_string(), json!("string"));
                    out.insert("enum".to_string(), json!(values));
                }
                Kind::Literal(value) => {
                    out.insert("type".to_string(), json!(json_type(value)));
                    out.insert("const".to_string(), value.clone());
                }
                Kind::Object(fields) => {
                    let mut properties = Map::new();
                    let mut required = Vec::new();
                    for (name, field) in fields {
                        properties.insert(name.clone(), Value::Object(field.emit(target)?));
                        if !field.optional {
                            required.push(name.clone());
                        }
                    }
                    out.insert("type".to_string(), json!("object"));
                    out.insert("properties".to_string(), Value::Object(properties));
                    if !required.is_empty() {
                        out.insert("required".to_string(), json!(required));
                    }
                }
                Kind::Array(item, bounds) => {
                    out.insert("type".to_string(), json!("array"));
                    out.insert("items".to_string(), Value::Object(item.emit(target)?));
                    insert_bounds(&mut out, bounds, "minItems", "maxItems");
                }
                Kind::Union(options) => {
                    if options.is_empty() {
                        return Err(Error::SchemaCompile {
                            validator: VALIDATOR.to_string(),
                            message: "union without options".to_string(),
                        });
                    }
                    let branches = options
                        .iter()
                        .map(|option| option.emit(target).map(Value::Object))
                        .collect::<Result<Vec<_>>>()?;
                    out.insert("anyOf".to_string(), Value::Array(branches));
                }
                Kind::File(_) => {
                    return Err(Error::UnsupportedNode(
                        "file fields have no JSON Schema representation".to_string(),
                    ));
                }
            }
            Ok(out)
        }
    }

    /// Widen a node to accept `null`. Typed nodes get `null` added to their type, which
    /// the OpenAPI transforms turn into `nullable: true`.
    fn admit_null(out: &mut Map<String, Value>, target: Target) {
        if let Some(constant) = out.remove("const") {
            out.insert("enum".to_string(), json!([constant]));
        }
        if let Some(Value::Array(values)) = out.get_mut("enum") {
            values.push(Value::Null);
        }

        match out.get_mut("type") {
            Some(schema_type) => {
                let single = schema_type.take();
                *schema_type = json!([single, "null"]);
            }
            None if target == Target::OpenApi3 => {
                out.insert("nullable".to_string(), json!(true));
            }
            None => {
                if let Some(Value::Array(branches)) = out.get_mut("anyOf") {
                    branches.push(json!({"type": "null"}));
                }
            }
        }
    }

    fn insert_bounds(out: &mut Map<String, Value>, bounds: &Bounds, min_key: &str, max_key: &str) {
        if let Some(min) = &bounds.min {
            out.insert(min_key.to_string(), Value::Number(min.clone()));
        }
        if let Some(max) = &bounds.max {
            out.insert(max_key.to_string(), Value::Number(max.clone()));
        }
    }

    fn json_type(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_uploads_reaches_nested_fields() {
        let schema = object([
            ("title", string()),
            ("owner", object([("avatar", file(upload::file()).optional())])),
            ("pages", array(object([("scan", file(upload::file()))]))),
        ]);
        let (trimmed, uploads) = schema.split_uploads();

        let paths: Vec<String> = uploads.iter().map(|u| u.path.to_string()).collect();
        assert_eq!(paths, vec!["owner.avatar", "pages[].scan"]);
        assert!(uploads[0].field.optional);

        let owner = &trimmed.fields().unwrap()["owner"];
        assert!(owner.fields().unwrap().is_empty());
        // the source keeps its file fields
        assert!(schema.fields().unwrap()["owner"].fields().unwrap().contains_key("avatar"));
    }
}
