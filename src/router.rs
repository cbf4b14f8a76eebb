//! Route tables as reported by the hosting router.
//!
//! The router is a black box; all the generator needs is [`RouterIntrospection::to_json`],
//! which hands back the table in one of its serialized shapes. Entries are flattened into
//! one [`RouteDescriptor`] per `(pattern, method)` before anything else happens.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::handler::Handler;

/// Key of the default domain in per-domain tables
pub const ROOT_DOMAIN: &str = "root";

/// HTTP methods an operation can be documented under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Case-insensitive parse of a method name
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a route table, possibly covering several methods
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    #[serde(alias = "route")]
    pub pattern: String,
    #[serde(alias = "method", deserialize_with = "one_or_many")]
    pub methods: Vec<String>,
    #[serde(alias = "action")]
    pub handler: Handler,
    #[serde(default, deserialize_with = "middleware_names")]
    pub middleware: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl RouteEntry {
    pub fn new(method: &str, pattern: impl Into<String>, handler: Handler) -> Self {
        Self {
            pattern: pattern.into(),
            methods: vec![method.to_string()],
            handler,
            middleware: Vec::new(),
            name: None,
            domain: None,
        }
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(method) => vec![method],
        OneOrMany::Many(methods) => methods,
    })
}

/// Middleware names only; entries of any other shape are dropped
fn middleware_names<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => vec![name],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A route table in either of the shapes routers serialize to
#[derive(Debug, Clone)]
pub enum RouteTable {
    Flat(Vec<RouteEntry>),
    /// Entries grouped per domain, the default one under [`ROOT_DOMAIN`]
    Domains(IndexMap<String, Vec<RouteEntry>>),
}

/// Entries that do not parse are logged and skipped, so one bad route never costs the rest
/// of the table.
fn parse_entries(domain: &str, entries: Vec<Value>) -> Vec<RouteEntry> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<RouteEntry>(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping route #{} of {}: {}", index, domain, e);
                None
            }
        })
        .collect()
}

impl<'de> Deserialize<'de> for RouteTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Array(entries) => Ok(RouteTable::Flat(parse_entries(ROOT_DOMAIN, entries))),
            Value::Object(domains) => {
                let mut table = IndexMap::new();
                for (domain, entries) in domains {
                    match entries {
                        Value::Array(entries) => {
                            let entries = parse_entries(&domain, entries);
                            table.insert(domain, entries);
                        }
                        other => {
                            warn!("Skipping domain {}: expected a list, got {}", domain, other)
                        }
                    }
                }
                Ok(RouteTable::Domains(table))
            }
            other => Err(D::Error::custom(format!(
                "expected a list of routes or a map of domains, got {}",
                other
            ))),
        }
    }
}

/// A single `(pattern, method)` pair and how to reach its handler
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub pattern: String,
    pub handler: Handler,
    pub middleware: Vec<String>,
    pub name: Option<String>,
    pub domain: Option<String>,
}

impl RouteTable {
    pub fn entries(&self) -> Vec<(Option<&str>, &RouteEntry)> {
        match self {
            RouteTable::Flat(entries) => entries.iter().map(|entry| (None, entry)).collect(),
            RouteTable::Domains(domains) => domains
                .iter()
                .flat_map(|(domain, entries)| {
                    let domain = Some(domain.as_str()).filter(|d| *d != ROOT_DOMAIN);
                    entries.iter().map(move |entry| (domain, entry))
                })
                .collect(),
        }
    }

    /// One descriptor per `(pattern, method)` across all domains. Unknown method names
    /// are skipped.
    pub fn flatten(&self) -> Vec<RouteDescriptor> {
        let mut routes = Vec::new();
        for (domain, entry) in self.entries() {
            for method in &entry.methods {
                let parsed = match HttpMethod::parse(method) {
                    Some(parsed) => parsed,
                    None => {
                        warn!("Skipping {} {}: unknown HTTP method", method, entry.pattern);
                        continue;
                    }
                };
                routes.push(RouteDescriptor {
                    method: parsed,
                    pattern: entry.pattern.clone(),
                    handler: entry.handler.clone(),
                    middleware: entry.middleware.clone(),
                    name: entry.name.clone(),
                    domain: entry.domain.clone().or_else(|| domain.map(str::to_string)),
                });
            }
        }
        debug!("Flattened route table into {} routes", routes.len());
        routes
    }
}

/// What the generator needs from the hosting router
pub trait RouterIntrospection {
    fn to_json(&self) -> Result<RouteTable>;
}

impl RouterIntrospection for RouteTable {
    fn to_json(&self) -> Result<RouteTable> {
        Ok(self.clone())
    }
}

/// A route table serialized to a JSON file, read when the document is generated
pub struct RouteFile {
    path: PathBuf,
}

impl RouteFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RouterIntrospection for RouteFile {
    fn to_json(&self) -> Result<RouteTable> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read route table: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse route table: {}", self.path.display()))
    }
}
