//! Handler resolution.
//!
//! Routers report handlers in several shapes. [`HandlerResolver::resolve`] turns any of
//! them into the `(owner, member)` pair the metadata registry is keyed by, loading the
//! owner through a [`Container`] or a [`ModuleLoader`] when only a name is known.
//!
//! Resolution never fails loudly. A handler that cannot be resolved is reported as
//! `None` and its route ends up undocumented.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use log::{debug, warn};
use serde::{Deserialize, Deserializer};

use crate::registry::OwnerId;
use crate::router::RouteDescriptor;

/// Member used when a reference names no method
pub const DEFAULT_MEMBER: &str = "handle";

/// Prefix of logical module specifiers
pub const ALIAS_PREFIX: char = '#';

/// What a module loader hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// A module; its default export is the controller, if any
    Module { default: Option<OwnerId> },
    /// The controller itself
    Class(OwnerId),
}

impl Loaded {
    fn into_owner(self) -> Option<OwnerId> {
        match self {
            Loaded::Module { default } => default,
            Loaded::Class(owner) => Some(owner),
        }
    }
}

/// A closure that materializes a controller on demand
#[derive(Clone)]
pub struct LazyLoader(Arc<dyn Fn() -> Result<Loaded> + Send + Sync>);

impl LazyLoader {
    pub fn new<F>(load: F) -> Self
    where
        F: Fn() -> Result<Loaded> + Send + Sync + 'static,
    {
        LazyLoader(Arc::new(load))
    }

    pub fn load(&self) -> Result<Loaded> {
        (self.0)()
    }
}

impl fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("LazyLoader(..)")
    }
}

/// First element of a `(target, member)` handler pair
#[derive(Debug, Clone)]
pub enum HandlerTarget {
    /// The controller is known directly
    Class(OwnerId),
    /// The controller is only reachable by running a loader
    Loader(LazyLoader),
    /// A module specifier to import
    Import(String),
}

/// The `reference` of a pre-resolved handler
#[derive(Debug, Clone)]
pub enum ResolvedReference {
    Path(String),
    Loader(LazyLoader),
}

/// A handler as the router reports it
#[derive(Debug, Clone)]
pub enum Handler {
    /// `"Controller.method"`, or `"Controller"` for single-action controllers
    Reference(String),
    Tuple(HandlerTarget, String),
    Resolved { reference: ResolvedReference },
}

impl Handler {
    pub fn reference(reference: impl Into<String>) -> Self {
        Handler::Reference(reference.into())
    }

    pub fn class(owner: OwnerId, member: impl Into<String>) -> Self {
        Handler::Tuple(HandlerTarget::Class(owner), member.into())
    }

    pub fn lazy<F>(load: F, member: impl Into<String>) -> Self
    where
        F: Fn() -> Result<Loaded> + Send + Sync + 'static,
    {
        Handler::Tuple(HandlerTarget::Loader(LazyLoader::new(load)), member.into())
    }
}

/// Only the serializable shapes can come from a route file
impl<'de> Deserialize<'de> for Handler {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Reference(String),
            Pair(String, String),
            Resolved { reference: String },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Reference(reference) => Handler::Reference(reference),
            Repr::Pair(specifier, member) => {
                Handler::Tuple(HandlerTarget::Import(specifier), member)
            }
            Repr::Resolved { reference } => Handler::Resolved {
                reference: ResolvedReference::Path(reference),
            },
        })
    }
}

/// Dependency injection container lookup
pub trait Container {
    fn make(&self, key: &str) -> Result<OwnerId>;
}

/// Dynamic module import
pub trait ModuleLoader {
    fn import(&self, specifier: &str) -> Result<Loaded>;
}

/// A container backed by explicit bindings
#[derive(Debug, Default)]
pub struct ServiceContainer {
    bindings: HashMap<String, OwnerId>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: impl Into<String>, owner: OwnerId) -> Self {
        self.bindings.insert(key.into(), owner);
        self
    }
}

impl Container for ServiceContainer {
    fn make(&self, key: &str) -> Result<OwnerId> {
        self.bindings
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no binding for `{}`", key))
    }
}

/// A loader backed by a table of known module paths
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: HashMap<String, Loaded>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, path: impl Into<String>, loaded: Loaded) -> Self {
        self.modules.insert(path.into(), loaded);
        self
    }
}

impl ModuleLoader for ModuleTable {
    fn import(&self, specifier: &str) -> Result<Loaded> {
        match self.modules.get(specifier) {
            Some(loaded) => Ok(loaded.clone()),
            None => bail!("cannot find module `{}`", specifier),
        }
    }
}

/// The `(owner, member)` pair a handler resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandler {
    pub owner: OwnerId,
    pub member: String,
}

pub struct HandlerResolver {
    container: Option<Box<dyn Container>>,
    loader: Option<Box<dyn ModuleLoader>>,
    base_dir: Option<String>,
    extensions: Vec<String>,
}

impl HandlerResolver {
    pub fn new() -> Self {
        Self {
            container: None,
            loader: None,
            base_dir: None,
            extensions: vec![String::new()],
        }
    }

    pub fn with_container(mut self, container: impl Container + 'static) -> Self {
        self.container = Some(Box::new(container));
        self
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Application root used for absolute import candidates
    pub fn with_base_dir(mut self, base_dir: impl Into<String>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// File extensions tried on every import candidate, in order. The empty string
    /// tries the candidate as is.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn resolve_route(&self, route: &RouteDescriptor) -> Option<ResolvedHandler> {
        self.resolve(&route.handler)
    }

    pub fn resolve(&self, handler: &Handler) -> Option<ResolvedHandler> {
        match self.try_resolve(handler) {
            Ok(resolved) => {
                debug!("Resolved handler to {}.{}", resolved.owner, resolved.member);
                Some(resolved)
            }
            Err(e) => {
                warn!("Could not resolve handler {:?}: {}", handler, e);
                None
            }
        }
    }

    fn try_resolve(&self, handler: &Handler) -> Result<ResolvedHandler> {
        match handler {
            Handler::Reference(reference) => self.resolve_reference(reference),
            Handler::Tuple(target, member) => {
                let owner = match target {
                    HandlerTarget::Class(owner) => owner.clone(),
                    HandlerTarget::Loader(loader) => load_owner(loader)?,
                    HandlerTarget::Import(specifier) => self.import_owner(specifier)?,
                };
                Ok(ResolvedHandler {
                    owner,
                    member: member.clone(),
                })
            }
            Handler::Resolved { reference } => match reference {
                ResolvedReference::Path(path) => self.resolve_reference(path),
                ResolvedReference::Loader(loader) => Ok(ResolvedHandler {
                    owner: load_owner(loader)?,
                    member: DEFAULT_MEMBER.to_string(),
                }),
            },
        }
    }

    fn resolve_reference(&self, reference: &str) -> Result<ResolvedHandler> {
        let (target, member) = split_reference(reference);
        if target.is_empty() {
            bail!("empty handler reference `{}`", reference);
        }

        if let Some(container) = &self.container {
            match container.make(target) {
                Ok(owner) => {
                    return Ok(ResolvedHandler {
                        owner,
                        member: member.to_string(),
                    })
                }
                Err(e) => debug!("Container lookup for {} failed: {}", target, e),
            }
        }

        Ok(ResolvedHandler {
            owner: self.import_owner(target)?,
            member: member.to_string(),
        })
    }

    fn import_owner(&self, specifier: &str) -> Result<OwnerId> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| anyhow!("no module loader to import `{}`", specifier))?;

        for candidate in self.candidates(specifier) {
            match loader.import(&candidate) {
                Ok(loaded) => match loaded.into_owner() {
                    Some(owner) => return Ok(owner),
                    None => debug!("Module {} has no default export", candidate),
                },
                Err(e) => debug!("Import candidate {} failed: {}", candidate, e),
            }
        }
        bail!("no import candidate for `{}` could be loaded", specifier)
    }

    /// Physical paths worth trying for a module specifier.
    ///
    /// A `#`-prefixed logical path maps onto the application directory, both as source
    /// (`app/`) and as build output (`build/app/`).
    pub fn candidates(&self, specifier: &str) -> Vec<String> {
        let mut bases = vec![specifier.to_string()];
        if let Some(logical) = specifier.strip_prefix(ALIAS_PREFIX) {
            bases.push(format!("app/{}", logical));
            bases.push(format!("./app/{}", logical));
            bases.push(format!("build/app/{}", logical));
            if let Some(base_dir) = &self.base_dir {
                let base_dir = base_dir.trim_end_matches('/');
                bases.push(format!("{}/app/{}", base_dir, logical));
                bases.push(format!("{}/build/app/{}", base_dir, logical));
            }
        }

        let mut candidates = Vec::new();
        for base in &bases {
            for extension in &self.extensions {
                let candidate = format!("{}{}", base, extension);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }
}

impl Default for HandlerResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn load_owner(loader: &LazyLoader) -> Result<OwnerId> {
    loader
        .load()?
        .into_owner()
        .ok_or_else(|| anyhow!("loaded module has no default export"))
}

/// Split `"Target.member"` on the last dot; no dot means [`DEFAULT_MEMBER`]
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once('.') {
        Some((target, member)) if !member.is_empty() => (target, member),
        Some((target, _)) => (target, DEFAULT_MEMBER),
        None => (reference, DEFAULT_MEMBER),
    }
}
