//! File upload fields.
//!
//! A file field is not something any of the validator libraries understand, so it is
//! carried as a marked canonical node: `{type: string, format: binary}` for a single file
//! and an array of those for several. The marker lets the request body resolver detect
//! uploads after conversion; [`strip_markers`] removes it before anything is emitted.
//!
//! Libraries that reject file fields have them lifted out first. Each lifted field keeps
//! the path it was found at, and [`merge_uploads`] puts it back at that path once the
//! rest of the schema is converted.

use std::fmt;

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Key under which the marker is serialized while a tree is in flight
pub const UPLOAD_MARKER_KEY: &str = "x-upload-marker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Single,
    Multiple,
}

/// A file upload field as declared inside a source schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub kind: UploadKind,
    pub optional: bool,
    pub description: Option<String>,
}

/// A single file field
pub fn file() -> FileField {
    FileField {
        kind: UploadKind::Single,
        optional: false,
        description: None,
    }
}

/// A field accepting several files
pub fn files() -> FileField {
    FileField {
        kind: UploadKind::Multiple,
        ..file()
    }
}

impl FileField {
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The marked canonical node for this field
    pub fn to_schema(&self) -> Schema {
        let binary = Schema::string().with_format("binary");
        let mut node = match self.kind {
            UploadKind::Single => binary,
            UploadKind::Multiple => Schema::array(binary),
        };
        node.description = self.description.clone();
        node.upload = Some(self.kind);
        node
    }
}

/// True when any node of the tree carries the upload marker
pub fn contains_upload(schema: &Schema) -> bool {
    schema.any_node(&|node: &Schema| {
        node.upload.is_some() || node.extensions.contains_key(UPLOAD_MARKER_KEY)
    })
}

/// Remove the upload marker from every node, leaving the visible OpenAPI fields intact
pub fn strip_markers(schema: Schema) -> Schema {
    schema.map_nodes(&|mut node: Schema| {
        node.upload = None;
        node.extensions.shift_remove(UPLOAD_MARKER_KEY);
        node
    })
}

/// One step from a node down to a child node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Property(String),
    /// The item schema of an array
    Items,
}

/// Where a file field sat in its source schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    pub fn child(&self, segment: PathSegment) -> FieldPath {
        let mut path = self.0.clone();
        path.push(segment);
        FieldPath(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Property(name) if i == 0 => f.write_str(name)?,
                PathSegment::Property(name) => write!(f, ".{}", name)?,
                PathSegment::Items => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// A file field lifted out of a source schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUpload {
    pub path: FieldPath,
    pub field: FileField,
}

impl ExtractedUpload {
    /// `optional` is the flag of the property holding the field, on top of the field's own
    pub fn new(path: FieldPath, field: &FileField, optional: bool) -> Self {
        let mut field = field.clone();
        field.optional = field.optional || optional;
        ExtractedUpload { path, field }
    }
}

/// Put extracted file fields back into the converted tree, each at its own path.
///
/// A field that is not optional is added to `required` of the object holding it. Paths
/// that no longer lead anywhere are logged and skipped.
pub fn merge_uploads(schema: Schema, uploads: Vec<ExtractedUpload>) -> Schema {
    let mut schema = schema;
    for upload in uploads {
        if !insert_at(&mut schema, &upload.path.0, &upload.field) {
            warn!("No node left at `{}` for its file field", upload.path);
        }
    }
    schema
}

fn insert_at(node: &mut Schema, path: &[PathSegment], field: &FileField) -> bool {
    match path {
        [] => false,
        [PathSegment::Property(name)] => {
            if !field.optional && !node.is_required(name) {
                node.required.get_or_insert_with(Vec::new).push(name.clone());
            }
            node.properties
                .get_or_insert_with(IndexMap::new)
                .insert(name.clone(), field.to_schema());
            true
        }
        [PathSegment::Items] => {
            node.items = Some(Box::new(field.to_schema()));
            true
        }
        [PathSegment::Property(name), rest @ ..] => {
            match node.properties.as_mut().and_then(|p| p.get_mut(name)) {
                Some(child) => insert_at(child, rest, field),
                None => false,
            }
        }
        [PathSegment::Items, rest @ ..] => match node.items.as_deref_mut() {
            Some(items) => insert_at(items, rest, field),
            None => false,
        },
    }
}
