//! Render contexts and the per-render variable scope

use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::Value;

/// Errors that can occur when loading a context file
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to read context file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse context TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Names and values supplied by the caller for one render
///
/// A render only borrows the context; it is never modified or retained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a context from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ContextError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a context from a TOML string; top-level keys become names
    pub fn from_toml_str(content: &str) -> Result<Self, ContextError> {
        let vars: IndexMap<String, Value> = toml::from_str(content)?;
        Ok(Self { vars })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    /// Builder form of [`Context::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(vars: IndexMap<String, Value>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Constants visible in every template unless the context overrides them
fn builtin(name: &str) -> Option<Value> {
    match name {
        "True" | "true" => Some(Value::Bool(true)),
        "False" | "false" => Some(Value::Bool(false)),
        "None" | "none" => Some(Value::None),
        _ => None,
    }
}

/// Working scope of one render
///
/// Lookup order is innermost loop variable, then the caller's context, then
/// the built-in constants.
#[derive(Debug)]
pub(crate) struct Scope<'c> {
    context: &'c Context,
    frames: Vec<(String, Value)>,
}

impl<'c> Scope<'c> {
    pub(crate) fn new(context: &'c Context) -> Self {
        Self {
            context,
            frames: Vec::new(),
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.context.get(name).cloned())
            .or_else(|| builtin(name))
    }

    /// Open a loop frame binding `name`; returns its handle
    pub(crate) fn push(&mut self, name: &str) -> usize {
        self.frames.push((name.to_string(), Value::None));
        self.frames.len() - 1
    }

    pub(crate) fn bind(&mut self, frame: usize, value: Value) {
        if let Some(slot) = self.frames.get_mut(frame) {
            slot.1 = value;
        }
    }

    /// Close the innermost loop frame
    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let ctx = Context::from_toml_str("name = \"Ada\"\nlangs = [\"en\", \"fr\"]").unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("name"), Some(&Value::from("Ada")));
        assert_eq!(ctx.get("langs"), Some(&Value::from(vec!["en", "fr"])));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Context::from_toml_str("name = "),
            Err(ContextError::ParseError(_))
        ));
    }

    #[test]
    fn test_scope_lookup_order() {
        let ctx = Context::new().with("x", 1).with("True", "shadowed");
        let mut scope = Scope::new(&ctx);
        assert_eq!(scope.lookup("x"), Some(Value::Int(1)));
        assert_eq!(scope.lookup("True"), Some(Value::from("shadowed")));
        assert_eq!(scope.lookup("false"), Some(Value::Bool(false)));
        assert_eq!(scope.lookup("missing"), None);

        let outer = scope.push("x");
        scope.bind(outer, Value::Int(2));
        let inner = scope.push("x");
        scope.bind(inner, Value::Int(3));
        assert_eq!(scope.lookup("x"), Some(Value::Int(3)));
        scope.pop();
        assert_eq!(scope.lookup("x"), Some(Value::Int(2)));
        scope.pop();
        assert_eq!(scope.lookup("x"), Some(Value::Int(1)));
    }
}
