//! Documentation metadata attached to handler members.
//!
//! Metadata is declared with the `api_*` builder functions. Each returns a partial
//! [`Fragment`]; applying several of them to the same member merges the partials (see
//! [`Fragment::merge`]). Schemas given to the builders are not converted here. They are
//! stored as [`Deferred::Raw`] placeholders and only turned into canonical trees by
//! [`crate::resolver::Resolver`] when a document is generated.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dsl::SourceSchema;
use crate::normalizer::ValidatorKind;
use crate::openapi_builder::{Parameter, RequestBody, Response};

/// A value that is either still raw or already resolved
#[derive(Debug, Clone)]
pub enum Deferred<R, T> {
    Raw(R),
    Resolved(T),
}

impl<R, T> Deferred<R, T> {
    pub fn is_raw(&self) -> bool {
        matches!(self, Deferred::Raw(_))
    }

    /// The resolved value, if resolution already happened
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Deferred::Resolved(value) => Some(value),
            Deferred::Raw(_) => None,
        }
    }
}

pub type ResponseEntry = Deferred<RawResponse, Response>;
pub type RequestBodyEntry = Deferred<RawRequestBody, RequestBody>;
pub type ParameterEntry = Deferred<RawParameter, Parameter>;

/// Scheme name to required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub description: String,
    pub schema: Option<SourceSchema>,
    pub validator: Option<ValidatorKind>,
    /// Defaults to `application/json`
    pub content_type: Option<String>,
}

/// Content types a request body may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "multipart/form-data")]
    Multipart,
    #[serde(rename = "application/x-www-form-urlencoded")]
    FormUrlEncoded,
}

impl BodyContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            BodyContentType::Json => "application/json",
            BodyContentType::Multipart => "multipart/form-data",
            BodyContentType::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawRequestBody {
    pub description: Option<String>,
    pub schema: SourceSchema,
    pub validator: Option<ValidatorKind>,
    /// When absent the resolver picks the envelope from the schema
    pub content_type: Option<BodyContentType>,
    pub required: bool,
}

/// Where a parameter is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RawParameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
    /// Defaults to a plain string schema
    pub schema: Option<SourceSchema>,
    pub validator: Option<ValidatorKind>,
}

/// Everything documented about one handler member
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub parameters: Vec<ParameterEntry>,
    pub request_body: Option<RequestBodyEntry>,
    pub responses: IndexMap<String, ResponseEntry>,
    pub security: Option<Vec<SecurityRequirement>>,
    pub deprecated: Option<bool>,
}

impl Fragment {
    /// Fold a later partial into this fragment.
    ///
    /// Scalars, `tags`, `security` and `requestBody` from `other` replace what is here.
    /// `parameters` are appended. `responses` merge status by status, a later entry
    /// replacing an earlier one with the same status.
    pub fn merge(&mut self, other: Fragment) {
        let Fragment {
            summary,
            description,
            tags,
            parameters,
            request_body,
            responses,
            security,
            deprecated,
        } = other;

        if summary.is_some() {
            self.summary = summary;
        }
        if description.is_some() {
            self.description = description;
        }
        if tags.is_some() {
            self.tags = tags;
        }
        self.parameters.extend(parameters);
        if request_body.is_some() {
            self.request_body = request_body;
        }
        self.responses.extend(responses);
        if security.is_some() {
            self.security = security;
        }
        if deprecated.is_some() {
            self.deprecated = deprecated;
        }
    }

    /// No raw placeholder is left anywhere in the fragment
    pub fn is_resolved(&self) -> bool {
        self.parameters.iter().all(|p| !p.is_raw())
            && self.request_body.as_ref().map(|b| !b.is_raw()).unwrap_or(true)
            && self.responses.values().all(|r| !r.is_raw())
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// Options for [`api_operation`]
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deprecated: Option<bool>,
}

impl OperationOptions {
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = Some(true);
        self
    }
}

/// Options for [`api_response`]
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    pub schema: Option<SourceSchema>,
    pub validator: Option<ValidatorKind>,
    pub content_type: Option<String>,
}

impl ResponseOptions {
    pub fn schema(mut self, schema: impl Into<SourceSchema>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn validator(mut self, validator: ValidatorKind) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Options for [`api_body`]
#[derive(Debug, Clone)]
pub struct BodyOptions {
    pub description: Option<String>,
    pub validator: Option<ValidatorKind>,
    pub content_type: Option<BodyContentType>,
    pub required: bool,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            description: None,
            validator: None,
            content_type: None,
            required: true,
        }
    }
}

impl BodyOptions {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validator(mut self, validator: ValidatorKind) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn content_type(mut self, content_type: BodyContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Options for [`api_param`] and its shorthands
#[derive(Debug, Clone, Default)]
pub struct ParamOptions {
    pub description: Option<String>,
    pub required: Option<bool>,
    pub schema: Option<SourceSchema>,
    pub validator: Option<ValidatorKind>,
}

impl ParamOptions {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn schema(mut self, schema: impl Into<SourceSchema>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn validator(mut self, validator: ValidatorKind) -> Self {
        self.validator = Some(validator);
        self
    }
}

pub fn api_operation(options: OperationOptions) -> Fragment {
    Fragment {
        summary: options.summary,
        description: options.description,
        tags: options.tags,
        deprecated: options.deprecated,
        ..Fragment::default()
    }
}

/// Document one response; `status` is usually a code but `"default"` works too
pub fn api_response(
    status: impl ToString,
    description: impl Into<String>,
    options: ResponseOptions,
) -> Fragment {
    let raw = RawResponse {
        description: description.into(),
        schema: options.schema,
        validator: options.validator,
        content_type: options.content_type,
    };
    let mut responses = IndexMap::new();
    responses.insert(status.to_string(), Deferred::Raw(raw));
    Fragment {
        responses,
        ..Fragment::default()
    }
}

pub fn api_body(schema: impl Into<SourceSchema>, options: BodyOptions) -> Fragment {
    Fragment {
        request_body: Some(Deferred::Raw(RawRequestBody {
            description: options.description,
            schema: schema.into(),
            validator: options.validator,
            content_type: options.content_type,
            required: options.required,
        })),
        ..Fragment::default()
    }
}

/// Document one parameter. Path parameters are always required; others default to
/// optional.
pub fn api_param(
    name: impl Into<String>,
    location: ParameterLocation,
    options: ParamOptions,
) -> Fragment {
    let required = location == ParameterLocation::Path || options.required.unwrap_or(false);
    Fragment {
        parameters: vec![Deferred::Raw(RawParameter {
            name: name.into(),
            location,
            required,
            description: options.description,
            schema: options.schema,
            validator: options.validator,
        })],
        ..Fragment::default()
    }
}

pub fn api_query(name: impl Into<String>, options: ParamOptions) -> Fragment {
    api_param(name, ParameterLocation::Query, options)
}

pub fn api_header(name: impl Into<String>, options: ParamOptions) -> Fragment {
    api_param(name, ParameterLocation::Header, options)
}

pub fn api_path_param(name: impl Into<String>, options: ParamOptions) -> Fragment {
    api_param(name, ParameterLocation::Path, options)
}

/// Require `scheme` with the given scopes. A later call replaces the whole list.
pub fn api_security<I, S>(scheme: impl Into<String>, scopes: I) -> Fragment
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut requirement = SecurityRequirement::new();
    requirement.insert(scheme.into(), scopes.into_iter().map(Into::into).collect());
    Fragment {
        security: Some(vec![requirement]),
        ..Fragment::default()
    }
}

pub fn api_tags<I, S>(tags: I) -> Fragment
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    api_operation(OperationOptions::default().tags(tags))
}

pub fn api_deprecated() -> Fragment {
    api_operation(OperationOptions::default().deprecated())
}
