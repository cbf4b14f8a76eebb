//! Schema normalization.
//!
//! [`Normalizer::normalize`] turns a [`SourceSchema`] into a canonical [`Schema`]. The
//! caller names the validator library the source was written with; there is no
//! detection. Without a validator the source must already be JSON Schema and is passed
//! through as is.
//!
//! Conversion never fails from the caller's point of view: a schema that cannot be
//! converted, or whose validator library is not available, comes back as
//! [`Schema::fallback`]. Each library's conversion path is behind a cargo feature of the
//! same name (`rules`, `shape`, `typed`, all on by default); a library whose feature is
//! off counts as not installed.

#[cfg(feature = "rules")]
pub mod rules;
#[cfg(feature = "shape")]
pub mod shape;
#[cfg(feature = "typed")]
pub mod typed;

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::dsl::SourceSchema;
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::upload;

/// The validator library a source schema is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    Rules,
    Shape,
    Typed,
}

impl ValidatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ValidatorKind::Rules => "rules",
            ValidatorKind::Shape => "shape",
            ValidatorKind::Typed => "typed",
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A conversion path for one validator library.
///
/// Implementations return the canonical tree with upload markers still in place; the
/// normalizer decides when to strip them.
pub trait SchemaConverter: Send + Sync {
    /// The validator library this converter handles
    fn kind(&self) -> ValidatorKind;

    /// Convert a source schema written with this converter's library
    fn convert(&self, source: &SourceSchema) -> Result<Schema>;
}

/// Converts source schemas from any available validator library
pub struct Normalizer {
    converters: Vec<Box<dyn SchemaConverter>>,
}

impl Normalizer {
    /// A normalizer with every validator library compiled into this build
    pub fn new() -> Self {
        let mut converters: Vec<Box<dyn SchemaConverter>> = Vec::new();
        #[cfg(feature = "rules")]
        converters.push(Box::new(rules::RulesConverter));
        #[cfg(feature = "shape")]
        converters.push(Box::new(shape::ShapeConverter));
        #[cfg(feature = "typed")]
        converters.push(Box::new(typed::TypedConverter));
        Self::with_converters(converters)
    }

    pub fn with_converters(converters: Vec<Box<dyn SchemaConverter>>) -> Self {
        debug!(
            "Initializing Normalizer with {:?}",
            converters.iter().map(|c| c.kind()).collect::<Vec<_>>()
        );
        Self { converters }
    }

    pub fn is_available(&self, kind: ValidatorKind) -> bool {
        self.converter(kind).is_some()
    }

    fn converter(&self, kind: ValidatorKind) -> Option<&dyn SchemaConverter> {
        self.converters
            .iter()
            .find(|converter| converter.kind() == kind)
            .map(|converter| converter.as_ref())
    }

    /// Convert `source` into the canonical tree, ready to be emitted
    pub fn normalize(&self, source: &SourceSchema, kind: Option<ValidatorKind>) -> Schema {
        upload::strip_markers(self.convert(source, kind))
    }

    /// Like [`Normalizer::normalize`] but upload markers are left in the tree, so the
    /// caller can still tell file fields apart.
    pub fn convert(&self, source: &SourceSchema, kind: Option<ValidatorKind>) -> Schema {
        let kind = match kind {
            Some(kind) => kind,
            None => return passthrough(source),
        };

        let converter = match self.converter(kind) {
            Some(converter) => converter,
            None => {
                debug!("Validator {} is not available, using fallback schema", kind);
                return Schema::fallback(kind.label());
            }
        };

        match converter.convert(source) {
            Ok(schema) => schema,
            Err(e) => {
                warn!("Failed to convert {} schema: {}", kind, e);
                Schema::fallback(kind.label())
            }
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn passthrough(source: &SourceSchema) -> Schema {
    let result = match source {
        SourceSchema::Json(value) => {
            serde_json::from_value::<Schema>(value.clone()).map_err(Error::from)
        }
        other => Err(Error::InvalidArgument(format!(
            "{} schema given without naming its validator",
            other.label()
        ))),
    };
    match result {
        Ok(schema) => schema,
        Err(e) => {
            warn!("Failed to pass schema through: {}", e);
            Schema::fallback(source.label())
        }
    }
}

/// Error for a source handed to the wrong converter
pub(crate) fn mismatch(expected: ValidatorKind, source: &SourceSchema) -> Error {
    Error::SchemaCompile {
        validator: expected.label().to_string(),
        message: format!("expected a {} schema, got a {} schema", expected, source.label()),
    }
}

#[cfg(all(test, feature = "rules", feature = "shape", feature = "typed"))]
mod tests {
    use super::*;
    use crate::dsl::{rules as r, shape as s, typed as t};
    use serde_json::json;

    fn nullable_cases() -> Vec<(ValidatorKind, SourceSchema)> {
        vec![
            (
                ValidatorKind::Rules,
                r::object([("title", r::string()), ("note", r::string().nullable())]).into(),
            ),
            (
                ValidatorKind::Shape,
                s::object([("title", s::string()), ("note", s::string().nullable())]).into(),
            ),
            (
                ValidatorKind::Typed,
                t::object([("title", t::string()), ("note", t::nullable(t::string()))]).into(),
            ),
        ]
    }

    #[test]
    fn test_nullable_fields_are_never_required() {
        let normalizer = Normalizer::new();
        for (kind, source) in nullable_cases() {
            let schema = normalizer.normalize(&source, Some(kind));
            assert!(schema.is_required("title"), "{}: title must be required", kind);
            assert!(!schema.is_required("note"), "{}: note must not be required", kind);
        }
    }

    #[test]
    fn test_passthrough_without_validator() {
        let normalizer = Normalizer::new();
        let raw = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let schema = normalizer.normalize(&SourceSchema::Json(raw.clone()), None);
        assert_eq!(serde_json::to_value(&schema).unwrap(), raw);
    }

    #[test]
    fn test_malformed_passthrough_falls_back() {
        let normalizer = Normalizer::new();
        let schema = normalizer.normalize(&SourceSchema::Json(json!({"type": 42})), None);
        assert!(schema.is_type("object"));
        assert!(schema.description.is_some());
    }

    #[test]
    fn test_dsl_source_without_validator_falls_back() {
        let normalizer = Normalizer::new();
        let schema = normalizer.normalize(&r::string().into(), None);
        assert_eq!(
            schema.description.as_deref(),
            Some("rules schema (conversion failed)")
        );
    }

    #[test]
    fn test_missing_library_falls_back() {
        let normalizer = Normalizer::with_converters(vec![
            Box::new(rules::RulesConverter),
            Box::new(typed::TypedConverter),
        ]);
        assert!(!normalizer.is_available(ValidatorKind::Shape));
        assert!(normalizer.is_available(ValidatorKind::Rules));

        let schema = normalizer.normalize(&s::string().into(), Some(ValidatorKind::Shape));
        assert_eq!(
            schema.description.as_deref(),
            Some("shape schema (conversion failed)")
        );
    }

    #[test]
    fn test_throwing_sources_fall_back() {
        let normalizer = Normalizer::new();
        let cases: Vec<(ValidatorKind, SourceSchema)> = vec![
            (ValidatorKind::Rules, r::number().min(5).max(1).into()),
            (ValidatorKind::Shape, s::union(Vec::new()).into()),
            (ValidatorKind::Typed, t::string().with("type", 7).into()),
            (ValidatorKind::Rules, s::string().into()),
        ];
        for (kind, source) in cases {
            let schema = normalizer.normalize(&source, Some(kind));
            assert!(schema.is_type("object"), "{}", kind);
            assert!(
                schema.description.as_deref().map(|d| !d.is_empty()).unwrap_or(false),
                "{}",
                kind
            );
        }
    }

    #[test]
    fn test_same_source_converts_twice() {
        let normalizer = Normalizer::new();
        let source: SourceSchema = s::object([("at", s::datetime())]).into();
        let first = normalizer.normalize(&source, Some(ValidatorKind::Shape));
        let second = normalizer.normalize(&source, Some(ValidatorKind::Shape));
        assert_eq!(first, second);
    }
}

#[cfg(all(test, not(feature = "shape")))]
mod without_shape {
    use super::*;
    use crate::dsl::shape as s;

    #[test]
    fn test_shape_sources_fall_back_when_feature_is_off() {
        let normalizer = Normalizer::new();
        assert!(!normalizer.is_available(ValidatorKind::Shape));

        let schema = normalizer.normalize(&s::string().into(), Some(ValidatorKind::Shape));
        assert_eq!(
            schema.description.as_deref(),
            Some("shape schema (conversion failed)")
        );
    }
}
