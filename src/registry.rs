//! Metadata registry.
//!
//! Fragments are stored per `(owner, member)`. The owner is identified by an [`OwnerId`],
//! usually derived from a controller type, so two controllers with a method of the same
//! name never share a fragment.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::metadata::Fragment;

/// Identity of the type that declares documented members
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(Cow<'static, str>);

impl OwnerId {
    /// The identity of controller type `T`, taken from [`std::any::type_name`].
    ///
    /// That name is only good within one build: it may change between compiler
    /// versions and is not promised to be unique. Use [`OwnerId::new`] with an explicit
    /// name for ids that are written down anywhere, such as a docs manifest.
    pub fn of<T: ?Sized>() -> Self {
        OwnerId(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// An owner keyed on an explicit, stable name
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        OwnerId::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        OwnerId::new(id)
    }
}

/// Association table from `(owner, member)` to the member's documentation
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    fragments: HashMap<(OwnerId, String), Fragment>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &OwnerId, member: &str) -> Option<&Fragment> {
        self.fragments.get(&(owner.clone(), member.to_string()))
    }

    /// Merge a partial fragment into the member's entry, creating it on first use
    pub fn merge(&mut self, owner: &OwnerId, member: &str, partial: Fragment) {
        debug!("Merging metadata into {}.{}", owner, member);
        self.fragments
            .entry((owner.clone(), member.to_string()))
            .or_default()
            .merge(partial);
    }

    /// Apply several partials in order, as stacked decorators would be
    pub fn apply<I>(&mut self, owner: &OwnerId, member: &str, partials: I)
    where
        I: IntoIterator<Item = Fragment>,
    {
        for partial in partials {
            self.merge(owner, member, partial);
        }
    }

    /// Shorthand for [`MetadataRegistry::apply`] keyed by a controller type
    pub fn document<T: ?Sized, I>(&mut self, member: &str, partials: I)
    where
        I: IntoIterator<Item = Fragment>,
    {
        self.apply(&OwnerId::of::<T>(), member, partials);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{api_operation, api_response, OperationOptions, ResponseOptions};
    use pretty_assertions::assert_eq;

    struct UsersController;
    struct PostsController;

    #[test]
    fn test_same_member_on_different_owners_does_not_collide() {
        let mut registry = MetadataRegistry::new();
        registry.document::<UsersController, _>(
            "index",
            [api_operation(OperationOptions::default().summary("List users"))],
        );
        registry.document::<PostsController, _>(
            "index",
            [api_operation(OperationOptions::default().summary("List posts"))],
        );

        assert_eq!(registry.len(), 2);
        let users = registry.get(&OwnerId::of::<UsersController>(), "index").unwrap();
        let posts = registry.get(&OwnerId::of::<PostsController>(), "index").unwrap();
        assert_eq!(users.summary.as_deref(), Some("List users"));
        assert_eq!(posts.summary.as_deref(), Some("List posts"));
    }

    #[test]
    fn test_stacked_partials_compose() {
        let mut registry = MetadataRegistry::new();
        let owner = OwnerId::new("controllers/health");
        registry.apply(
            &owner,
            "show",
            [
                api_operation(OperationOptions::default().summary("Health")),
                api_response(200, "Healthy", ResponseOptions::default()),
                api_response(503, "Degraded", ResponseOptions::default()),
            ],
        );

        let fragment = registry.get(&owner, "show").unwrap();
        assert_eq!(fragment.summary.as_deref(), Some("Health"));
        assert_eq!(fragment.responses.len(), 2);
        assert!(registry.get(&owner, "index").is_none());
    }

    #[test]
    fn test_named_owners_are_keyed_on_the_name_alone() {
        let mut registry = MetadataRegistry::new();
        let named = OwnerId::new("UsersController");
        registry.apply(
            &named,
            "index",
            [api_operation(OperationOptions::default().summary("Named"))],
        );

        let found = registry.get(&OwnerId::from("UsersController"), "index").unwrap();
        assert_eq!(found.summary.as_deref(), Some("Named"));
        // the type-derived id carries the module path, so it is a different key
        assert_ne!(OwnerId::of::<UsersController>(), named);
        assert!(registry.get(&OwnerId::of::<UsersController>(), "index").is_none());
    }

    #[test]
    fn test_fresh_registry_is_empty() {
        let registry = MetadataRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(&OwnerId::new("x"), "handle").is_none());
    }
}
