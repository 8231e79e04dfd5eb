//! Compiled templates

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::error::ParseError;
use crate::library::Library;
use crate::parser::ast::{Node, Spanned};
use crate::parser::{parse_document, SourceMap};
use crate::renderer::{Context, EvalError, Renderer};

/// A template compiled once and rendered any number of times
///
/// Compiling runs both grammars up front, so every syntax error surfaces
/// from [`Template::new`]. Filters and tags are resolved when rendering;
/// registering one after compiling but before rendering is fine.
///
/// ```rust
/// use rattle::{Context, Library, Template};
///
/// let template = Template::new("{% for n in items %}{{ n * 2 }} {% endfor %}").unwrap();
/// let ctx = Context::new().with("items", vec![1, 2, 3]);
/// assert_eq!(template.render(&ctx, &Library::new()).unwrap(), "2 4 6 ");
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    source: SourceMap,
    nodes: Vec<Spanned<Node>>,
    origin: Option<PathBuf>,
}

impl Template {
    /// Compile template source
    pub fn new(source: impl Into<Arc<str>>) -> Result<Self, ParseError> {
        let source = SourceMap::new(source);
        let nodes = parse_document(&source)?;
        tracing::debug!(nodes = nodes.len(), "compiled template");
        Ok(Self {
            source,
            nodes,
            origin: None,
        })
    }

    /// Compile template source read from `origin`
    pub fn with_origin(
        source: impl Into<Arc<str>>,
        origin: impl Into<PathBuf>,
    ) -> Result<Self, ParseError> {
        let origin = origin.into();
        let mut template = Self::new(source)?;
        tracing::debug!(origin = %origin.display(), "template origin");
        template.origin = Some(origin);
        Ok(template)
    }

    pub fn source(&self) -> &str {
        self.source.text()
    }

    /// Top-level nodes of the compiled tree
    pub fn nodes(&self) -> &[Spanned<Node>] {
        &self.nodes
    }

    /// Path the template was loaded from, if any
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Render with the default configuration
    pub fn render(&self, context: &Context, library: &Library) -> Result<String, EvalError> {
        self.render_with_config(context, library, &RenderConfig::default())
    }

    pub fn render_with_config(
        &self,
        context: &Context,
        library: &Library,
        config: &RenderConfig,
    ) -> Result<String, EvalError> {
        if config.debug {
            tracing::debug!("compiled tree:\n{:#?}", self.nodes);
        }
        tracing::debug!(names = context.len(), "rendering template");
        let output = Renderer::new(library, config, &self.source, context).render(&self.nodes)?;
        tracing::debug!(bytes = output.len(), "rendered template");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_template_is_shareable() {
        assert_send_sync::<Template>();
        assert_send_sync::<Library>();
        assert_send_sync::<Context>();
    }

    #[test]
    fn test_compile_error_is_returned() {
        assert!(Template::new("{% if a %}").is_err());
    }

    #[test]
    fn test_origin() {
        let t = Template::with_origin("x", "/tmp/page.html").unwrap();
        assert_eq!(t.origin(), Some(Path::new("/tmp/page.html")));
        assert_eq!(t.source(), "x");
        assert!(Template::new("x").unwrap().origin().is_none());
    }

    #[test]
    fn test_concurrent_renders() {
        let template = Arc::new(Template::new("{{ n }}").unwrap());
        let library = Arc::new(Library::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let template = Arc::clone(&template);
                let library = Arc::clone(&library);
                std::thread::spawn(move || {
                    let ctx = Context::new().with("n", n);
                    template.render(&ctx, &library).unwrap()
                })
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs, vec!["0", "1", "2", "3"]);
    }
}
