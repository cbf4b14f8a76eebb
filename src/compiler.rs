//! Route-to-operation compilation.
//!
//! [`RouteCompiler::compile`] turns flattened routes into the `paths` map: it filters
//! them, converts their path syntax, finds and resolves their documentation and builds
//! one [`Operation`] per surviving `(path, method)`. Routes without documentation are
//! left out entirely.

use indexmap::IndexMap;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handler::HandlerResolver;
use crate::metadata::{Deferred, Fragment, ParameterLocation};
use crate::normalizer::Normalizer;
use crate::openapi_builder::{Operation, Parameter, PathItem};
use crate::registry::MetadataRegistry;
use crate::resolver::Resolver;
use crate::router::{HttpMethod, RouteDescriptor};
use crate::schema::Schema;

/// Which routes end up in the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// When non-empty, only patterns matching one of these are kept
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Method names, compared case-insensitively
    pub ignore_methods: Vec<String>,
}

impl FilterConfig {
    pub fn allows(&self, route: &RouteDescriptor) -> bool {
        if self
            .exclude
            .iter()
            .any(|pattern| matches_pattern(pattern, &route.pattern))
        {
            debug!("Excluding {} {}", route.method, route.pattern);
            return false;
        }
        if !self.include.is_empty()
            && !self
                .include
                .iter()
                .any(|pattern| matches_pattern(pattern, &route.pattern))
        {
            debug!("{} {} is not included", route.method, route.pattern);
            return false;
        }
        !self.ignores(route.method)
    }

    fn ignores(&self, method: HttpMethod) -> bool {
        self.ignore_methods
            .iter()
            .any(|ignored| ignored.to_ascii_uppercase() == method.as_str())
    }
}

/// A pattern with `*` is a wildcard match anywhere in the path; anything else is a
/// substring match.
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return path.contains(pattern);
    }
    let expression = regex::escape(pattern).replace(r"\*", ".*");
    match Regex::new(&expression) {
        Ok(re) => re.is_match(path),
        Err(e) => {
            warn!("Ignoring route filter `{}`: {}", pattern, e);
            false
        }
    }
}

/// Rewrite `:name` (and optional `:name?`) segments as `{name}`
pub fn convert_path(pattern: &str) -> Result<String> {
    let converted: Vec<String> = pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(param) => {
                let name = param.trim_end_matches('?');
                if name.is_empty() {
                    Err(Error::InvalidArgument(format!(
                        "empty path parameter in `{}`",
                        pattern
                    )))
                } else {
                    Ok(format!("{{{}}}", name))
                }
            }
            None => Ok(segment.to_string()),
        })
        .collect::<Result<_>>()?;
    Ok(converted.join("/"))
}

/// The route name with dots as underscores, or `<method>_<path>` built from the
/// converted path.
pub fn operation_id(method: HttpMethod, path: &str, name: Option<&str>) -> String {
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        return name.replace('.', "_");
    }

    let sanitized = path
        .to_lowercase()
        .trim_start_matches('/')
        .replace('/', "_")
        .replace(':', "");
    let sanitized = sanitized
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let sanitized = if sanitized.is_empty() { "root".to_string() } else { sanitized };

    format!("{}_{}", method.as_str().to_lowercase(), sanitized)
}

/// Names of the `{name}` segments of a converted path
fn path_params(path: &str) -> impl Iterator<Item = &str> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
}

pub struct RouteCompiler<'a> {
    registry: &'a MetadataRegistry,
    handlers: &'a HandlerResolver,
    resolver: Resolver<'a>,
    filter: FilterConfig,
}

impl<'a> RouteCompiler<'a> {
    pub fn new(
        registry: &'a MetadataRegistry,
        handlers: &'a HandlerResolver,
        normalizer: &'a Normalizer,
    ) -> Self {
        Self {
            registry,
            handlers,
            resolver: Resolver::new(normalizer),
            filter: FilterConfig::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn compile(&self, routes: &[RouteDescriptor]) -> IndexMap<String, PathItem> {
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        let mut documented = 0;

        for route in routes.iter().filter(|route| self.filter.allows(route)) {
            match self.compile_route(route) {
                Ok(Some((path, operation))) => {
                    documented += 1;
                    let item = paths.entry(path.clone()).or_default();
                    if item.set(route.method, operation).is_some() {
                        warn!(
                            "{} {} is documented twice, keeping the last one",
                            route.method, path
                        );
                    }
                }
                Ok(None) => debug!("No documentation for {} {}", route.method, route.pattern),
                Err(e) => warn!("Skipping {} {}: {}", route.method, route.pattern, e),
            }
        }

        info!("Documented {} of {} routes", documented, routes.len());
        paths
    }

    fn compile_route(&self, route: &RouteDescriptor) -> Result<Option<(String, Operation)>> {
        let path = convert_path(&route.pattern)?;

        let handler = match self.handlers.resolve_route(route) {
            Some(handler) => handler,
            None => return Ok(None),
        };
        let fragment = match self.registry.get(&handler.owner, &handler.member) {
            Some(fragment) => self.resolver.resolve(fragment),
            None => return Ok(None),
        };

        let operation = build_operation(route, &path, fragment)?;
        Ok(Some((path, operation)))
    }
}

fn build_operation(route: &RouteDescriptor, path: &str, fragment: Fragment) -> Result<Operation> {
    let declared = fragment
        .parameters
        .into_iter()
        .map(|entry| match entry {
            Deferred::Resolved(parameter) => Ok(parameter),
            Deferred::Raw(raw) => Err(Error::InvalidArgument(format!(
                "parameter `{}` was left unresolved",
                raw.name
            ))),
        })
        .collect::<Result<Vec<Parameter>>>()?;

    let mut parameters: Vec<Parameter> = path_params(path)
        .filter(|name| {
            !declared
                .iter()
                .any(|p| p.location == ParameterLocation::Path && p.name == *name)
        })
        .map(|name| Parameter {
            name: name.to_string(),
            location: ParameterLocation::Path,
            required: true,
            schema: Schema::string(),
            description: None,
        })
        .collect();
    parameters.extend(declared);

    let request_body = match fragment.request_body {
        Some(Deferred::Resolved(body)) => Some(body),
        Some(Deferred::Raw(_)) => {
            return Err(Error::InvalidArgument("request body was left unresolved".into()))
        }
        None => None,
    };

    let responses = fragment
        .responses
        .into_iter()
        .map(|(status, entry)| match entry {
            Deferred::Resolved(response) => Ok((status, response)),
            Deferred::Raw(_) => Err(Error::InvalidArgument(format!(
                "response `{}` was left unresolved",
                status
            ))),
        })
        .collect::<Result<IndexMap<_, _>>>()?;

    Ok(Operation {
        summary: fragment.summary,
        description: fragment.description,
        operation_id: Some(operation_id(route.method, path, route.name.as_deref())),
        tags: fragment.tags.unwrap_or_default(),
        parameters,
        request_body,
        responses,
        security: fragment.security,
        deprecated: fragment.deprecated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::metadata::{
        api_operation, api_path_param, api_response, OperationOptions, ParamOptions,
        ResponseOptions,
    };
    use crate::registry::OwnerId;
    use crate::router::{RouteEntry, RouteTable};
    use pretty_assertions::assert_eq;

    struct UsersController;

    fn route(method: HttpMethod, pattern: &str) -> RouteDescriptor {
        RouteDescriptor {
            method,
            pattern: pattern.to_string(),
            handler: Handler::class(OwnerId::of::<UsersController>(), "index"),
            middleware: Vec::new(),
            name: None,
            domain: None,
        }
    }

    #[test]
    fn test_convert_path() {
        assert_eq!(convert_path("/users/:id").unwrap(), "/users/{id}");
        assert_eq!(
            convert_path("/posts/:post_id/comments/:id?").unwrap(),
            "/posts/{post_id}/comments/{id}"
        );
        assert_eq!(convert_path("/files/*").unwrap(), "/files/*");
        assert_eq!(convert_path("/").unwrap(), "/");
        assert!(convert_path("/users/:").is_err());
    }

    #[test]
    fn test_operation_ids() {
        assert_eq!(operation_id(HttpMethod::Get, "/users", Some("users.index")), "users_index");
        assert_eq!(operation_id(HttpMethod::Get, "/users/{id}", None), "get_users_{id}");
        assert_eq!(operation_id(HttpMethod::Post, "/", None), "post_root");
        assert_eq!(
            operation_id(HttpMethod::Delete, "/Admin//Users/", None),
            "delete_admin_users"
        );
        assert_eq!(operation_id(HttpMethod::Get, "/x", Some("")), "get_x");
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("/admin", "/api/admin/users"));
        assert!(!matches_pattern("/admin", "/api/users"));
        assert!(matches_pattern("/api/*/users", "/api/v2/users"));
        assert!(matches_pattern("/internal*", "/internal/health"));
        assert!(!matches_pattern("/api/*/users", "/api/v2/posts"));
        // regex metacharacters are literal
        assert!(!matches_pattern("/a.c*", "/abc"));
    }

    #[test]
    fn test_filter_order() {
        let filter = FilterConfig {
            include: vec!["/api".to_string()],
            exclude: vec!["/api/internal*".to_string()],
            ignore_methods: vec!["head".to_string()],
        };

        assert!(filter.allows(&route(HttpMethod::Get, "/api/users")));
        assert!(!filter.allows(&route(HttpMethod::Get, "/api/internal/stats")));
        assert!(!filter.allows(&route(HttpMethod::Get, "/health")));
        assert!(!filter.allows(&route(HttpMethod::Head, "/api/users")));
    }

    #[test]
    fn test_ignore_methods_removes_only_listed_methods() {
        let routes: Vec<RouteDescriptor> = [
            HttpMethod::Get,
            HttpMethod::Head,
            HttpMethod::Options,
            HttpMethod::Post,
        ]
        .into_iter()
        .map(|method| route(method, "/users"))
        .collect();

        let none = FilterConfig::default();
        assert_eq!(routes.iter().filter(|r| none.allows(r)).count(), 4);

        let filter = FilterConfig {
            ignore_methods: vec!["Head".to_string(), "OPTIONS".to_string()],
            ..FilterConfig::default()
        };
        let kept: Vec<HttpMethod> = routes
            .iter()
            .filter(|r| filter.allows(r))
            .map(|r| r.method)
            .collect();
        assert_eq!(kept, vec![HttpMethod::Get, HttpMethod::Post]);
    }

    #[test]
    fn test_compile_drops_undocumented_and_adds_path_params() {
        let mut registry = MetadataRegistry::new();
        registry.document::<UsersController, _>(
            "show",
            [
                api_operation(OperationOptions::default().summary("Show user").tags(["Users"])),
                api_path_param("id", ParamOptions::default().description("User id")),
                api_response(200, "The user", ResponseOptions::default()),
            ],
        );
        let handlers = HandlerResolver::new();
        let normalizer = Normalizer::new();
        let compiler = RouteCompiler::new(&registry, &handlers, &normalizer);

        let owner = OwnerId::of::<UsersController>();
        let table = RouteTable::Flat(vec![
            RouteEntry::new(
                "GET",
                "/orgs/:org/users/:id",
                Handler::class(owner.clone(), "show"),
            ),
            RouteEntry::new("GET", "/users", Handler::class(owner.clone(), "index")),
            RouteEntry::new("GET", "/broken/:", Handler::class(owner, "show")),
        ]);

        let paths = compiler.compile(&table.flatten());
        assert_eq!(paths.keys().collect::<Vec<_>>(), vec!["/orgs/{org}/users/{id}"]);

        let operation = paths["/orgs/{org}/users/{id}"].get(HttpMethod::Get).unwrap();
        assert_eq!(operation.summary.as_deref(), Some("Show user"));
        assert_eq!(operation.operation_id.as_deref(), Some("get_orgs_{org}_users_{id}"));

        let params: Vec<(&str, bool, Option<&str>)> = operation
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.required, p.description.as_deref()))
            .collect();
        assert_eq!(
            params,
            vec![("org", true, None), ("id", true, Some("User id"))]
        );
    }
}
