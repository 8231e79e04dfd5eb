//! Name table shared by the filter and tag namespaces
//!
//! Every callable is reachable by its qualified name (`app.text.upper`). The
//! bare name (`upper`) is an alias for as long as only one qualified name
//! ever claimed it. Once a second qualified name claims the same bare name,
//! the alias is removed and the bare name stays ambiguous for the lifetime
//! of the table, even if one of the claimants is unregistered later.
//!
//! Callables are told apart by qualified name, not by identity: registering
//! under a name that already owns the alias replaces the callable and keeps
//! the alias, while any other qualified name with the same bare name
//! collides, even when it wraps the same closure.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::parser::ast::Identifier;
use crate::value::Function;

/// Errors that can occur when registering a filter or tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("{kind} name '{name}' needs a qualifier, e.g. 'app.{name}'")]
    Unqualified { kind: &'static str, name: String },

    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },
}

/// Split `a.b.name` into its bare name, validating every segment
pub(crate) fn bare_name<'n>(kind: &'static str, qualified: &'n str) -> Result<&'n str, LibraryError> {
    let Some((_, bare)) = qualified.rsplit_once('.') else {
        return Err(LibraryError::Unqualified {
            kind,
            name: qualified.to_string(),
        });
    };
    if !qualified.split('.').all(Identifier::is_valid) {
        return Err(LibraryError::InvalidName {
            kind,
            name: qualified.to_string(),
        });
    }
    Ok(bare)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Namespace {
    kind: &'static str,
    /// Qualified names and unambiguous bare names
    table: HashMap<String, Function>,
    /// Bare name to the qualified name it currently aliases
    short_owner: HashMap<String, String>,
    ambiguous: HashSet<String>,
}

impl Namespace {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub(crate) fn register(&mut self, qualified: &str, f: Function) -> Result<(), LibraryError> {
        let bare = bare_name(self.kind, qualified)?;
        self.insert(qualified, bare, f);
        Ok(())
    }

    /// Insert under an already validated qualified name
    pub(crate) fn insert(&mut self, qualified: &str, bare: &str, f: Function) {
        tracing::debug!(kind = self.kind, name = qualified, "registering");
        self.table.insert(qualified.to_string(), f.clone());

        if self.ambiguous.contains(bare) {
            return;
        }
        match self.short_owner.get(bare) {
            Some(owner) if owner != qualified => {
                tracing::debug!(
                    kind = self.kind,
                    name = bare,
                    first = owner.as_str(),
                    second = qualified,
                    "short name is now ambiguous"
                );
                self.short_owner.remove(bare);
                self.table.remove(bare);
                self.ambiguous.insert(bare.to_string());
            }
            _ => {
                self.short_owner
                    .insert(bare.to_string(), qualified.to_string());
                self.table.insert(bare.to_string(), f);
            }
        }
    }

    /// Remove a qualified registration and the bare alias it owns
    pub(crate) fn unregister(&mut self, qualified: &str) -> bool {
        if !qualified.contains('.') {
            return false;
        }
        let removed = self.table.remove(qualified).is_some();
        if let Some((_, bare)) = qualified.rsplit_once('.') {
            if self.short_owner.get(bare).is_some_and(|owner| owner == qualified) {
                self.short_owner.remove(bare);
                self.table.remove(bare);
            }
        }
        if removed {
            tracing::debug!(kind = self.kind, name = qualified, "unregistered");
        }
        removed
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Function> {
        self.table.get(name)
    }

    pub(crate) fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.contains(name)
    }

    /// Qualified names, sorted
    pub(crate) fn qualified_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .table
            .keys()
            .map(String::as_str)
            .filter(|n| n.contains('.'))
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn constant(name: &str, value: i64) -> Function {
        Function::new(name, move |_, _| Ok(Value::Int(value)))
    }

    fn call(ns: &Namespace, name: &str) -> Option<Value> {
        ns.get(name).map(|f| f.call(&[], &Default::default()).unwrap())
    }

    #[test]
    fn test_bare_name_validation() {
        assert_eq!(bare_name("filter", "a.b.upper"), Ok("upper"));
        assert!(matches!(
            bare_name("filter", "upper"),
            Err(LibraryError::Unqualified { .. })
        ));
        assert!(matches!(
            bare_name("filter", "a..upper"),
            Err(LibraryError::InvalidName { .. })
        ));
        assert!(matches!(
            bare_name("filter", "a.up-per"),
            Err(LibraryError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_single_registration_has_alias() {
        let mut ns = Namespace::new("filter");
        ns.register("a.f", constant("a.f", 1)).unwrap();
        assert_eq!(call(&ns, "f"), Some(Value::Int(1)));
        assert_eq!(call(&ns, "a.f"), Some(Value::Int(1)));
    }

    #[test]
    fn test_reregistering_same_name_replaces() {
        let mut ns = Namespace::new("filter");
        ns.register("a.f", constant("a.f", 1)).unwrap();
        ns.register("a.f", constant("a.f", 2)).unwrap();
        assert_eq!(call(&ns, "f"), Some(Value::Int(2)));
        assert!(!ns.is_ambiguous("f"));
    }

    #[test]
    fn test_same_callable_under_two_names_collides() {
        let mut ns = Namespace::new("filter");
        let f = constant("a.f", 1);
        ns.register("a.f", f.clone()).unwrap();
        ns.register("b.f", f).unwrap();
        assert!(ns.is_ambiguous("f"));
        assert!(ns.get("f").is_none());
    }

    #[test]
    fn test_collision_is_permanent() {
        let mut ns = Namespace::new("filter");
        ns.register("a.f", constant("a.f", 1)).unwrap();
        ns.register("b.f", constant("b.f", 2)).unwrap();
        assert!(ns.get("f").is_none());
        assert!(ns.is_ambiguous("f"));
        assert_eq!(call(&ns, "a.f"), Some(Value::Int(1)));
        assert_eq!(call(&ns, "b.f"), Some(Value::Int(2)));

        assert!(ns.unregister("b.f"));
        assert!(ns.get("f").is_none());
        ns.register("c.f", constant("c.f", 3)).unwrap();
        assert!(ns.get("f").is_none());
    }

    #[test]
    fn test_unregister_removes_alias() {
        let mut ns = Namespace::new("tag");
        ns.register("a.t", constant("a.t", 1)).unwrap();
        assert!(ns.unregister("a.t"));
        assert!(ns.get("t").is_none());
        assert!(ns.get("a.t").is_none());
        assert!(!ns.unregister("a.t"));
        assert!(!ns.unregister("t"));
        assert!(ns.qualified_names().is_empty());
    }
}
