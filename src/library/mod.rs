//! Filter and tag registry
//!
//! A [`Library`] is built once, populated during start-up and then shared by
//! reference with every render. Registration needs `&mut Library` and
//! rendering needs `&Library`, so the two cannot overlap for a single owner.
//! Code sharing one library across threads picks its own locking, e.g.
//! `Arc<RwLock<Library>>`.
//!
//! ```rust
//! use rattle::{Context, Library, Template, Value};
//!
//! let mut library = Library::with_builtins();
//! library
//!     .register_filter("app.shout", |args, _| {
//!         Ok(Value::from(format!("{}!", args[0])))
//!     })
//!     .unwrap();
//!
//! let template = Template::new("{{ name|shout }}").unwrap();
//! let ctx = Context::new().with("name", "hey");
//! assert_eq!(template.render(&ctx, &library).unwrap(), "hey!");
//! ```

mod builtins;
mod registry;

pub use registry::LibraryError;

use crate::value::{Function, HostError, Kwargs, Value};
use registry::Namespace;

/// Registered filters and tags, in two separate namespaces
#[derive(Debug, Clone)]
pub struct Library {
    filters: Namespace,
    tags: Namespace,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            filters: Namespace::new("filter"),
            tags: Namespace::new("tag"),
        }
    }
}

impl Library {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library holding the built-in filters (qualifier `builtins`)
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        builtins::install(&mut library.filters);
        library
    }

    /// Register a filter under `qualifier.name`
    ///
    /// The bare `name` also resolves to it until another qualified name with
    /// the same bare name is registered; from then on the bare name is
    /// ambiguous and only qualified names resolve.
    pub fn register_filter<F>(&mut self, qualified_name: &str, f: F) -> Result<(), LibraryError>
    where
        F: Fn(&[Value], &Kwargs) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.filters
            .register(qualified_name, Function::new(qualified_name, f))
    }

    /// Remove a filter; returns whether it was registered
    pub fn unregister_filter(&mut self, qualified_name: &str) -> bool {
        self.filters.unregister(qualified_name)
    }

    /// Look up a filter by bare or qualified name
    pub fn filter(&self, name: &str) -> Option<&Function> {
        self.filters.get(name)
    }

    pub fn is_ambiguous_filter(&self, name: &str) -> bool {
        self.filters.is_ambiguous(name)
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.qualified_names()
    }

    /// Register a tag under `qualifier.name`, with the same short-name
    /// rules as [`Library::register_filter`]
    pub fn register_tag<F>(&mut self, qualified_name: &str, f: F) -> Result<(), LibraryError>
    where
        F: Fn(&[Value], &Kwargs) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.tags
            .register(qualified_name, Function::new(qualified_name, f))
    }

    pub fn unregister_tag(&mut self, qualified_name: &str) -> bool {
        self.tags.unregister(qualified_name)
    }

    pub fn tag(&self, name: &str) -> Option<&Function> {
        self.tags.get(name)
    }

    pub fn is_ambiguous_tag(&self, name: &str) -> bool {
        self.tags.is_ambiguous(name)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.qualified_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let library = Library::new();
        assert!(library.filter_names().is_empty());
        assert!(library.tag_names().is_empty());
    }

    #[test]
    fn test_builtins_are_qualified() {
        let library = Library::with_builtins();
        assert!(library.filter("upper").is_some());
        assert!(library.filter("builtins.upper").is_some());
        assert_eq!(library.filter("upper").map(|f| f.name()), Some("builtins.upper"));
        assert!(library.tag("upper").is_none());
    }

    #[test]
    fn test_namespaces_are_separate() {
        let mut library = Library::new();
        library
            .register_filter("a.now", |_, _| Ok(Value::from("filter")))
            .unwrap();
        library
            .register_tag("b.now", |_, _| Ok(Value::from("tag")))
            .unwrap();
        assert!(!library.is_ambiguous_filter("now"));
        assert!(!library.is_ambiguous_tag("now"));
        assert!(library.filter("now").is_some());
        assert!(library.tag("now").is_some());
    }

    #[test]
    fn test_unqualified_registration_fails() {
        let mut library = Library::new();
        let err = library
            .register_filter("upper", |_, _| Ok(Value::None))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "filter name 'upper' needs a qualifier, e.g. 'app.upper'"
        );
    }
}
