//! Conversion path for the shape validator.
//!
//! Shapes go through the library's own emitter with the OpenAPI 3.0 target. Two fixups
//! follow: date-time strings lose the pattern the emitter attaches to them, and fields
//! flagged `nullable` are removed from `required`. File fields, which the emitter
//! rejects, are lifted out first and put back at their paths afterwards.

use log::debug;

use super::{mismatch, SchemaConverter, ValidatorKind};
use crate::dsl::shape::{Schema as ShapeSchema, Target};
use crate::dsl::SourceSchema;
use crate::error::Result;
use crate::schema::Schema;
use crate::upload;

pub struct ShapeConverter;

impl SchemaConverter for ShapeConverter {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Shape
    }

    fn convert(&self, source: &SourceSchema) -> Result<Schema> {
        match source {
            SourceSchema::Shape(schema) => convert_shape(schema),
            other => Err(mismatch(ValidatorKind::Shape, other)),
        }
    }
}

fn convert_shape(schema: &ShapeSchema) -> Result<Schema> {
    let (emittable, uploads) = schema.split_uploads();
    if !uploads.is_empty() {
        debug!("Extracted {} file field(s) before emitting", uploads.len());
    }

    let emitted = emittable.to_json_schema(Target::OpenApi3)?;
    let converted: Schema = serde_json::from_value(emitted)?;
    let converted = strip_datetime_patterns(converted).prune_required(&Schema::is_nullable);
    Ok(upload::merge_uploads(converted, uploads))
}

/// Keep `format: date-time` but drop the regex the emitter pairs with it
fn strip_datetime_patterns(schema: Schema) -> Schema {
    schema.map_nodes(&|mut node: Schema| {
        if node.format.as_deref() == Some("date-time") {
            node.pattern = None;
        }
        node
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::shape::{array, datetime, file, int, object, string, union};
    use pretty_assertions::assert_eq;

    fn convert(schema: ShapeSchema) -> Schema {
        ShapeConverter.convert(&SourceSchema::Shape(schema)).unwrap()
    }

    #[test]
    fn test_datetime_patterns_are_stripped_everywhere() {
        let schema = convert(object([
            ("createdAt", datetime()),
            ("history", array(datetime())),
            ("either", union([datetime(), int()])),
            ("code", string().regex("^[A-Z]{3}$")),
        ]));

        let created = schema.property("createdAt").unwrap();
        assert_eq!(created.format.as_deref(), Some("date-time"));
        assert_eq!(created.pattern, None);

        let history = schema.property("history").unwrap().items.as_ref().unwrap();
        assert_eq!(history.pattern, None);

        let branches = schema.property("either").unwrap().any_of.as_ref().unwrap();
        assert_eq!(branches[0].pattern, None);

        // patterns the author wrote stay
        assert_eq!(
            schema.property("code").unwrap().pattern.as_deref(),
            Some("^[A-Z]{3}$")
        );
    }

    #[test]
    fn test_nullable_fields_leave_required_in_nested_objects() {
        let schema = convert(object([(
            "profile",
            object([("name", string()), ("bio", string().nullable())]),
        )]));
        assert_eq!(schema.required, Some(vec!["profile".to_string()]));

        let profile = schema.property("profile").unwrap();
        assert_eq!(profile.required, Some(vec!["name".to_string()]));
        assert!(profile.property("bio").unwrap().is_nullable());
    }

    #[test]
    fn test_file_fields_are_merged_back() {
        let schema = convert(object([
            ("caption", string().optional()),
            ("photos", file(upload::files())),
        ]));

        let photos = schema.property("photos").unwrap();
        assert!(photos.is_type("array"));
        assert_eq!(
            photos.items.as_ref().unwrap().format.as_deref(),
            Some("binary")
        );
        assert_eq!(schema.required, Some(vec!["photos".to_string()]));
    }

    #[test]
    fn test_nested_file_fields_return_to_their_paths() {
        let schema = convert(object([
            ("title", string()),
            ("owner", object([("name", string()), ("avatar", file(upload::file()))])),
            (
                "pages",
                array(object([("scan", file(upload::file())), ("note", string().nullable())])),
            ),
        ]));
        assert_eq!(
            schema.required,
            Some(vec!["title".to_string(), "owner".to_string(), "pages".to_string()])
        );

        let owner = schema.property("owner").unwrap();
        assert_eq!(owner.property("avatar").unwrap().format.as_deref(), Some("binary"));
        assert_eq!(
            owner.required,
            Some(vec!["name".to_string(), "avatar".to_string()])
        );

        let page = schema.property("pages").unwrap().items.as_ref().unwrap();
        assert_eq!(page.property("scan").unwrap().upload, Some(upload::UploadKind::Single));
        assert_eq!(page.required, Some(vec!["scan".to_string()]));
        assert!(upload::contains_upload(&schema));
    }
}
