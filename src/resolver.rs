//! Late resolution of raw metadata placeholders.
//!
//! Fragments are declared long before any schema is converted. [`Resolver::resolve`] is
//! the step that runs at generation time: every [`Deferred::Raw`] response, request body
//! and parameter is normalized and wrapped in the matching OpenAPI object. Entries that
//! are already resolved are left alone, so resolving twice changes nothing.

use indexmap::IndexMap;
use log::debug;

use crate::metadata::{
    BodyContentType, Deferred, Fragment, ParameterLocation, RawParameter, RawRequestBody,
    RawResponse,
};
use crate::normalizer::Normalizer;
use crate::openapi_builder::{MediaType, Parameter, RequestBody, Response};
use crate::schema::Schema;
use crate::upload;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub struct Resolver<'a> {
    normalizer: &'a Normalizer,
}

impl<'a> Resolver<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self {
        Self { normalizer }
    }

    /// A copy of `fragment` with no raw placeholder left
    pub fn resolve(&self, fragment: &Fragment) -> Fragment {
        if fragment.is_resolved() {
            return fragment.clone();
        }

        let parameters = fragment
            .parameters
            .iter()
            .map(|entry| match entry {
                Deferred::Raw(raw) => Deferred::Resolved(self.resolve_parameter(raw)),
                resolved => resolved.clone(),
            })
            .collect();

        let request_body = fragment.request_body.as_ref().map(|entry| match entry {
            Deferred::Raw(raw) => Deferred::Resolved(self.resolve_request_body(raw)),
            resolved => resolved.clone(),
        });

        let responses = fragment
            .responses
            .iter()
            .map(|(status, entry)| {
                let entry = match entry {
                    Deferred::Raw(raw) => Deferred::Resolved(self.resolve_response(raw)),
                    resolved => resolved.clone(),
                };
                (status.clone(), entry)
            })
            .collect();

        Fragment {
            parameters,
            request_body,
            responses,
            ..fragment.clone()
        }
    }

    pub fn resolve_response(&self, raw: &RawResponse) -> Response {
        let content = raw.schema.as_ref().map(|source| {
            let schema = self.normalizer.normalize(source, raw.validator);
            let content_type = raw
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            single_content(content_type, schema)
        });
        Response {
            description: raw.description.clone(),
            content,
        }
    }

    /// An explicit content type always wins. Otherwise a body with file fields is sent as
    /// `multipart/form-data` only, and any other body is offered as both JSON and
    /// url-encoded form.
    pub fn resolve_request_body(&self, raw: &RawRequestBody) -> RequestBody {
        let converted = self.normalizer.convert(&raw.schema, raw.validator);
        let has_uploads = upload::contains_upload(&converted);
        let schema = upload::strip_markers(converted);

        let content = match raw.content_type {
            Some(content_type) => single_content(content_type.mime().to_string(), schema),
            None if has_uploads => {
                debug!("Request body carries file fields, using multipart/form-data");
                single_content(BodyContentType::Multipart.mime().to_string(), schema)
            }
            None => {
                let mut content = single_content(
                    BodyContentType::Json.mime().to_string(),
                    schema.clone(),
                );
                content.insert(
                    BodyContentType::FormUrlEncoded.mime().to_string(),
                    MediaType { schema },
                );
                content
            }
        };

        RequestBody {
            description: raw.description.clone(),
            required: raw.required,
            content,
        }
    }

    pub fn resolve_parameter(&self, raw: &RawParameter) -> Parameter {
        let schema = raw
            .schema
            .as_ref()
            .map(|source| self.normalizer.normalize(source, raw.validator))
            .unwrap_or_else(Schema::string);
        Parameter {
            name: raw.name.clone(),
            location: raw.location,
            required: raw.required || raw.location == ParameterLocation::Path,
            schema,
            description: raw.description.clone(),
        }
    }
}

fn single_content(content_type: String, schema: Schema) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(content_type, MediaType { schema });
    content
}
