//! Generator configuration and documentation manifests.
//!
//! Both are plain serde types read from YAML or JSON files with [`load_config`]. The
//! manifest is how documentation reaches the generator when it runs as a command line
//! tool: it names the controllers behind module specifiers and carries the fragments
//! that would otherwise be declared in code with the `api_*` builders.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::FilterConfig;
use crate::dsl::SourceSchema;
use crate::handler::{HandlerResolver, Loaded, ModuleTable, ServiceContainer};
use crate::metadata::{
    api_body, api_operation, api_param, api_response, BodyContentType, BodyOptions, Fragment,
    OperationOptions, ParamOptions, ParameterLocation, ResponseOptions, SecurityRequirement,
};
use crate::normalizer::ValidatorKind;
use crate::openapi_builder::{Info, SecurityScheme, Server, Tag};
use crate::registry::{MetadataRegistry, OwnerId};

/// Read a YAML or JSON file, picking the format from the extension
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON file: {}", path.display())),
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display())),
    }
}

fn default_info() -> Info {
    Info {
        title: "Generated API".to_string(),
        version: "1.0.0".to_string(),
        description: None,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default = "default_info")]
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub security_schemes: IndexMap<String, SecurityScheme>,
    /// Requirements applied to the whole document
    #[serde(default)]
    pub security: Vec<SecurityRequirement>,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub components_dir: Option<PathBuf>,
    /// Merged over the generated document
    #[serde(default)]
    pub overlay: Option<Value>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            info: default_info(),
            servers: Vec::new(),
            tags: Vec::new(),
            security_schemes: IndexMap::new(),
            security: Vec::new(),
            filter: FilterConfig::default(),
            components_dir: None,
            overlay: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocsManifest {
    /// Module specifier to the controller it exports
    pub controllers: IndexMap<String, String>,
    /// Container key to controller
    pub bindings: IndexMap<String, String>,
    /// Extensions tried on import candidates
    pub extensions: Vec<String>,
    pub base_dir: Option<String>,
    /// Controller to member to documentation
    pub docs: IndexMap<String, IndexMap<String, FragmentDoc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FragmentDoc {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deprecated: Option<bool>,
    pub parameters: Vec<ParameterDoc>,
    pub request_body: Option<RequestBodyDoc>,
    pub responses: IndexMap<String, ResponseDoc>,
    pub security: Option<Vec<SecurityRequirement>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDoc {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<SourceSchema>,
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDoc {
    pub schema: SourceSchema,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
    #[serde(default)]
    pub content_type: Option<BodyContentType>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDoc {
    pub description: String,
    #[serde(default)]
    pub schema: Option<SourceSchema>,
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl FragmentDoc {
    /// The partials the `api_*` builders would have produced for this entry
    pub fn into_partials(self) -> Vec<Fragment> {
        let mut partials = vec![api_operation(OperationOptions {
            summary: self.summary,
            description: self.description,
            tags: self.tags,
            deprecated: self.deprecated,
        })];

        for param in self.parameters {
            partials.push(api_param(
                param.name,
                param.location,
                ParamOptions {
                    description: param.description,
                    required: param.required,
                    schema: param.schema,
                    validator: param.validator,
                },
            ));
        }

        if let Some(body) = self.request_body {
            partials.push(api_body(
                body.schema,
                BodyOptions {
                    description: body.description,
                    validator: body.validator,
                    content_type: body.content_type,
                    required: body.required.unwrap_or(true),
                },
            ));
        }

        for (status, response) in self.responses {
            partials.push(api_response(
                status,
                response.description,
                ResponseOptions {
                    schema: response.schema,
                    validator: response.validator,
                    content_type: response.content_type,
                },
            ));
        }

        if let Some(security) = self.security {
            partials.push(Fragment {
                security: Some(security),
                ..Fragment::default()
            });
        }
        partials
    }
}

impl DocsManifest {
    /// Apply every documented member to `registry`
    pub fn register(&self, registry: &mut MetadataRegistry) {
        for (controller, members) in &self.docs {
            let owner = OwnerId::new(controller.as_str());
            for (member, doc) in members {
                registry.apply(&owner, member, doc.clone().into_partials());
            }
        }
        debug!("Registered documentation for {} members", registry.len());
    }

    /// A handler resolver that finds the manifest's controllers
    pub fn handler_resolver(&self) -> HandlerResolver {
        let modules = self
            .controllers
            .iter()
            .fold(ModuleTable::new(), |table, (specifier, controller)| {
                table.register(
                    specifier.as_str(),
                    Loaded::Module {
                        default: Some(OwnerId::new(controller.as_str())),
                    },
                )
            });
        let container = self
            .bindings
            .iter()
            .fold(ServiceContainer::new(), |container, (key, controller)| {
                container.bind(key.as_str(), OwnerId::new(controller.as_str()))
            });

        let mut resolver = HandlerResolver::new()
            .with_container(container)
            .with_loader(modules);
        if !self.extensions.is_empty() {
            resolver = resolver.with_extensions(self.extensions.iter().cloned());
        }
        if let Some(base_dir) = &self.base_dir {
            resolver = resolver.with_base_dir(base_dir.as_str());
        }
        resolver
    }
}
