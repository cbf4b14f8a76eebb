//! Rules validator library.
//!
//! Schemas are declared field by field and compiled before use. The compiled form is a
//! tree of [`Node`]s; each node lists the rules applied to it as [`Validation`]s whose
//! options are stored out of line in [`Compiled::refs`] and looked up by id.
//!
//! ```
//! use openapi_from_routes::dsl::rules;
//!
//! let schema = rules::object([
//!     ("email", rules::string().email()),
//!     ("age", rules::number().min(18).optional()),
//! ]);
//! let compiled = schema.compile().unwrap();
//! assert_eq!(compiled.root.properties.len(), 2);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Number, Value};

use crate::error::{Error, Result};
use crate::upload::{ExtractedUpload, FieldPath, FileField, PathSegment};

const VALIDATOR: &str = "rules";

/// A rules schema under construction
#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    optional: bool,
    nullable: bool,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
enum Kind {
    String,
    Number,
    Boolean,
    Date,
    Enum(Vec<Value>),
    Object(Vec<(String, Schema)>),
    Array(Box<Schema>),
    File(FileField),
}

#[derive(Debug, Clone)]
enum Rule {
    Min(Number),
    Max(Number),
    FixedLength(u64),
    Email,
    Url,
    Uuid,
    Regex(String),
    In(Vec<Value>),
}

fn leaf(kind: Kind) -> Schema {
    Schema {
        kind,
        optional: false,
        nullable: false,
        rules: Vec::new(),
    }
}

pub fn string() -> Schema {
    leaf(Kind::String)
}

pub fn number() -> Schema {
    leaf(Kind::Number)
}

pub fn boolean() -> Schema {
    leaf(Kind::Boolean)
}

/// A date, transported as an ISO 8601 string
pub fn date() -> Schema {
    leaf(Kind::Date)
}

/// One of a fixed set of values
pub fn enumeration<I, V>(choices: I) -> Schema
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    leaf(Kind::Enum(choices.into_iter().map(Into::into).collect()))
}

pub fn object<I, K>(fields: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    leaf(Kind::Object(
        fields.into_iter().map(|(name, field)| (name.into(), field)).collect(),
    ))
}

pub fn array(each: Schema) -> Schema {
    leaf(Kind::Array(Box::new(each)))
}

/// A file field. The compiler does not accept these; they must be taken out before
/// compiling.
pub fn file(field: FileField) -> Schema {
    leaf(Kind::File(field))
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

    /// Lower bound: value for numbers, length for strings, item count for arrays
    pub fn min(mut self, min: impl Into<Number>) -> Self {
        self.rules.push(Rule::Min(min.into()));
        self
    }

    /// Upper bound: value for numbers, length for strings, item count for arrays
    pub fn max(mut self, max: impl Into<Number>) -> Self {
        self.rules.push(Rule::Max(max.into()));
        self
    }

    pub fn fixed_length(mut self, size: u64) -> Self {
        self.rules.push(Rule::FixedLength(size));
        self
    }

    pub fn email(mut self) -> Self {
        self.rules.push(Rule::Email);
        self
    }

    pub fn url(mut self) -> Self {
        self.rules.push(Rule::Url);
        self
    }

    pub fn uuid(mut self) -> Self {
        self.rules.push(Rule::Uuid);
        self
    }

    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push(Rule::Regex(pattern.into()));
        self
    }

    /// Restrict the value to the given choices
    pub fn in_list<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rules
            .push(Rule::In(choices.into_iter().map(Into::into).collect()));
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The declared fields when this is an object schema
    pub fn fields(&self) -> Option<&[(String, Schema)]> {
        match &self.kind {
            Kind::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// The file field when this schema is one
    pub fn file_field(&self) -> Option<&FileField> {
        match &self.kind {
            Kind::File(field) => Some(field),
            _ => None,
        }
    }

    /// A copy of this schema with every file field taken out, at any depth, together
    /// with the fields taken. A file used as an array's element leaves a string in its
    /// place.
    pub fn split_uploads(&self) -> (Schema, Vec<ExtractedUpload>) {
        let mut copy = self.clone();
        let mut found = Vec::new();
        copy.take_uploads(&FieldPath::default(), &mut found);
        (copy, found)
    }

    fn take_uploads(&mut self, path: &FieldPath, found: &mut Vec<ExtractedUpload>) {
        match &mut self.kind {
            Kind::Object(fields) => fields.retain_mut(|(name, field)| {
                let path = path.child(PathSegment::Property(name.clone()));
                if let Some(file) = field.file_field() {
                    found.push(ExtractedUpload::new(path, file, field.optional));
                    return false;
                }
                field.take_uploads(&path, found);
                true
            }),
            Kind::Array(each) => {
                let path = path.child(PathSegment::Items);
                if let Some(file) = each.file_field() {
                    found.push(ExtractedUpload::new(path, file, false));
                    **each = string();
                } else {
                    each.take_uploads(&path, found);
                }
            }
            _ => {}
        }
    }

    /// Compile into a field tree
    pub fn compile(&self) -> Result<Compiled> {
        let mut compiler = Compiler::default();
        let root = compiler.node("", self)?;
        Ok(Compiled {
            root,
            refs: compiler.refs,
        })
    }
}

/// The compiled form of a rules schema
#[derive(Debug, Clone)]
pub struct Compiled {
    pub root: Node,
    /// Rule options keyed by the ids referenced from [`Validation::options_ref`]
    pub refs: BTreeMap<String, Value>,
}

impl Compiled {
    /// Options record for a validation, if it has one
    pub fn options(&self, validation: &Validation) -> Option<&Value> {
        validation
            .options_ref
            .as_ref()
            .and_then(|id| self.refs.get(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtype {
    String,
    Number,
    Boolean,
    Date,
}

/// A compiled field
#[derive(Debug, Clone)]
pub struct Node {
    pub node_type: NodeType,
    pub field_name: String,
    /// Set on literal nodes only
    pub subtype: Option<Subtype>,
    pub is_optional: bool,
    pub allow_null: bool,
    /// Child fields of an object node
    pub properties: Vec<Node>,
    /// Element node of an array node
    pub each: Option<Box<Node>>,
    pub validations: Vec<Validation>,
}

/// A rule applied to a compiled node
#[derive(Debug, Clone)]
pub struct Validation {
    /// Rule name: min, max, fixedLength, email, url, uuid, regex, enum
    pub rule: String,
    pub options_ref: Option<String>,
}

#[derive(Default)]
struct Compiler {
    refs: BTreeMap<String, Value>,
}

impl Compiler {
    fn store(&mut self, options: Value) -> String {
        let id = format!("ref://{}", self.refs.len() + 1);
        self.refs.insert(id.clone(), options);
        id
    }

    fn node(&mut self, field_name: &str, schema: &Schema) -> Result<Node> {
        let mut node = Node {
            node_type: NodeType::Literal,
            field_name: field_name.to_string(),
            subtype: None,
            is_optional: schema.optional,
            allow_null: schema.nullable,
            properties: Vec::new(),
            each: None,
            validations: Vec::new(),
        };

        match &schema.kind {
            Kind::String => node.subtype = Some(Subtype::String),
            Kind::Number => node.subtype = Some(Subtype::Number),
            Kind::Boolean => node.subtype = Some(Subtype::Boolean),
            Kind::Date => node.subtype = Some(Subtype::Date),
            Kind::Enum(choices) => {
                node.subtype = Some(enum_subtype(choices));
                node.validations.push(self.choices(field_name, choices)?);
            }
            Kind::Object(fields) => {
                node.node_type = NodeType::Object;
                let mut seen = HashSet::new();
                for (name, field) in fields {
                    if !seen.insert(name.as_str()) {
                        return Err(compile_error(format!("duplicate field `{}`", name)));
                    }
                    node.properties.push(self.node(name, field)?);
                }
            }
            Kind::Array(each) => {
                node.node_type = NodeType::Array;
                node.each = Some(Box::new(self.node(field_name, each)?));
            }
            Kind::File(_) => {
                return Err(Error::UnsupportedNode(format!(
                    "file field `{}` cannot be compiled",
                    field_name
                )));
            }
        }

        self.check_bounds(field_name, &schema.rules)?;
        for rule in &schema.rules {
            let validation = self.validation(field_name, &schema.kind, rule)?;
            node.validations.push(validation);
        }
        Ok(node)
    }

    fn choices(&mut self, field_name: &str, choices: &[Value]) -> Result<Validation> {
        if choices.is_empty() {
            return Err(compile_error(format!(
                "field `{}` has an empty list of choices",
                field_name
            )));
        }
        Ok(Validation {
            rule: "enum".to_string(),
            options_ref: Some(self.store(json!({ "choices": choices }))),
        })
    }

    fn validation(&mut self, field_name: &str, kind: &Kind, rule: &Rule) -> Result<Validation> {
        let sized = matches!(kind, Kind::String | Kind::Number | Kind::Array(_));
        let textual = matches!(kind, Kind::String);

        let (name, options) = match rule {
            Rule::Min(min) if sized => ("min", Some(json!({ "min": min }))),
            Rule::Max(max) if sized => ("max", Some(json!({ "max": max }))),
            Rule::FixedLength(size) if textual || matches!(kind, Kind::Array(_)) => {
                ("fixedLength", Some(json!({ "size": size })))
            }
            Rule::Email if textual => ("email", None),
            Rule::Url if textual => ("url", None),
            Rule::Uuid if textual => ("uuid", None),
            Rule::Regex(pattern) if textual => {
                regex::Regex::new(pattern).map_err(|e| {
                    compile_error(format!("field `{}` has an invalid regex: {}", field_name, e))
                })?;
                ("regex", Some(json!({ "pattern": pattern })))
            }
            Rule::In(choices) if textual || matches!(kind, Kind::Number) => {
                return self.choices(field_name, choices);
            }
            other => {
                return Err(compile_error(format!(
                    "rule {:?} does not apply to field `{}`",
                    other, field_name
                )));
            }
        };

        Ok(Validation {
            rule: name.to_string(),
            options_ref: options.map(|options| self.store(options)),
        })
    }

    fn check_bounds(&self, field_name: &str, rules: &[Rule]) -> Result<()> {
        let min = rules.iter().find_map(|rule| match rule {
            Rule::Min(n) => n.as_f64(),
            _ => None,
        });
        let max = rules.iter().find_map(|rule| match rule {
            Rule::Max(n) => n.as_f64(),
            _ => None,
        });
        match (min, max) {
            (Some(min), Some(max)) if min > max => Err(compile_error(format!(
                "field `{}` has min {} greater than max {}",
                field_name, min, max
            ))),
            _ => Ok(()),
        }
    }
}

fn enum_subtype(choices: &[Value]) -> Subtype {
    if !choices.is_empty() && choices.iter().all(Value::is_number) {
        Subtype::Number
    } else if !choices.is_empty() && choices.iter().all(Value::is_boolean) {
        Subtype::Boolean
    } else {
        Subtype::String
    }
}

fn compile_error(message: String) -> Error {
    Error::SchemaCompile {
        validator: VALIDATOR.to_string(),
        message,
    }
}
