use std::path::PathBuf;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compiler::RouteCompiler;
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::metadata::{ParameterLocation, SecurityRequirement};
use crate::router::{HttpMethod, RouterIntrospection};
use crate::scanner::SchemaScanner;
use crate::schema::Schema;

/// Version written to the `openapi` field
pub const OPENAPI_VERSION: &str = "3.0.3";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    servers: Vec<Server>,
    tags: Vec<Tag>,
    security_schemes: IndexMap<String, SecurityScheme>,
    security: Vec<SecurityRequirement>,
    /// Directory scanned for component schemas
    components_dir: Option<PathBuf>,
    /// Merged over the generated document as the last step
    overlay: Option<Value>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Security scheme as written in the configuration.
///
/// Schemes matching one of the [`KnownScheme`] shapes exactly are typed; anything else,
/// vendor types and extension keys included, is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityScheme {
    Known(KnownScheme),
    Other(Value),
}

impl From<KnownScheme> for SecurityScheme {
    fn from(scheme: KnownScheme) -> Self {
        SecurityScheme::Known(scheme)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum KnownScheme {
    #[serde(rename = "http")]
    Http {
        scheme: String,
        #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ParameterLocation,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        flows: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    /// Store `operation` under `method`, returning the one it replaced
    pub fn set(&mut self, method: HttpMethod, operation: Operation) -> Option<Operation> {
        self.slot(method).replace(operation)
    }

    pub fn get(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: IndexMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Schema>,
    #[serde(
        rename = "securitySchemes",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

/// Complete OpenAPI document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: None,
            },
            servers: Vec::new(),
            tags: Vec::new(),
            security_schemes: IndexMap::new(),
            security: Vec::new(),
            components_dir: None,
            overlay: None,
        }
    }

    /// Everything the configuration says about the document; route filters belong to
    /// the [`RouteCompiler`]
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            info: config.info.clone(),
            servers: config.servers.clone(),
            tags: config.tags.clone(),
            security_schemes: config.security_schemes.clone(),
            security: config.security.clone(),
            components_dir: config.components_dir.clone(),
            overlay: config.overlay.clone(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(
        mut self,
        title: String,
        version: String,
        description: Option<String>,
    ) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    pub fn add_server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    pub fn add_tag(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.tags.push(Tag {
            name: name.into(),
            description,
        });
        self
    }

    pub fn add_security_scheme(
        mut self,
        name: impl Into<String>,
        scheme: impl Into<SecurityScheme>,
    ) -> Self {
        self.security_schemes.insert(name.into(), scheme.into());
        self
    }

    /// Require `scheme` on every operation that does not say otherwise
    pub fn require_security(mut self, requirement: SecurityRequirement) -> Self {
        self.security.push(requirement);
        self
    }

    pub fn with_components_dir(mut self, dir: PathBuf) -> Self {
        self.components_dir = Some(dir);
        self
    }

    pub fn with_overlay(mut self, overlay: Value) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Build the typed document.
    ///
    /// Component scanning and route compilation are both best effort: a failure in
    /// either leaves its part of the document empty and is only logged.
    pub fn build(
        &self,
        router: &dyn RouterIntrospection,
        compiler: &RouteCompiler,
    ) -> OpenApiDocument {
        debug!("Building OpenAPI document");

        let mut components = Components {
            schemas: IndexMap::new(),
            security_schemes: self.security_schemes.clone(),
        };
        if let Some(dir) = &self.components_dir {
            match SchemaScanner::new(dir.clone()).scan() {
                Ok(scan) => {
                    info!("Found {} component schemas", scan.schemas.len());
                    components.schemas = scan.schemas;
                }
                Err(e) => warn!("Skipping component schemas: {:#}", e),
            }
        }

        let paths = match router.to_json() {
            Ok(table) => compiler.compile(&table.flatten()),
            Err(e) => {
                warn!("Router unavailable, generating an empty paths map: {:#}", e);
                IndexMap::new()
            }
        };

        let mut tags = self.tags.clone();
        for path_item in paths.values() {
            for operation in path_item.operations() {
                for tag in &operation.tags {
                    if !tags.iter().any(|known| &known.name == tag) {
                        debug!("Adding tag {} used by an operation", tag);
                        tags.push(Tag {
                            name: tag.clone(),
                            description: None,
                        });
                    }
                }
            }
        }

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info.clone(),
            servers: self.servers.clone(),
            security: self.security.clone(),
            tags,
            paths,
            components: if components.is_empty() {
                None
            } else {
                Some(components)
            },
        }
    }

    /// Build the document and merge the overlay over it
    pub fn generate(
        &self,
        router: &dyn RouterIntrospection,
        compiler: &RouteCompiler,
    ) -> Result<Value> {
        let document = serde_json::to_value(self.build(router, compiler))?;
        Ok(match &self.overlay {
            Some(overlay) => apply_overlay(document, overlay),
            None => document,
        })
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `overlay` over a generated document.
///
/// `paths` are merged path by path and `components` section by section, then name by
/// name. Every other top-level key of the overlay replaces the generated one.
pub fn apply_overlay(document: Value, overlay: &Value) -> Value {
    let (mut document, overlay) = match (document, overlay) {
        (Value::Object(document), Value::Object(overlay)) => (document, overlay),
        (document, _) => return document,
    };

    for (key, value) in overlay {
        match key.as_str() {
            "paths" => union_into(&mut document, key, value, false),
            "components" => union_into(&mut document, key, value, true),
            _ => {
                document.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(document)
}

fn union_into(target: &mut Map<String, Value>, key: &str, value: &Value, nested: bool) {
    let (existing, incoming) = match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => (existing, incoming),
        _ => {
            target.insert(key.to_string(), value.clone());
            return;
        }
    };
    for (name, entry) in incoming {
        if nested {
            union_into(existing, name, entry, false);
        } else {
            existing.insert(name.clone(), entry.clone());
        }
    }
}
