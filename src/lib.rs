//! Rattle - a small template engine: compile once, render many times
//!
//! Templates mix literal text with `{{ expressions }}`, `{% if %}` and
//! `{% for %}` blocks, `{# comments #}` and filter pipelines such as
//! `{{ name|upper }}`. Compilation turns the source into an immutable tree;
//! rendering walks that tree against a [`Context`], resolving filters and
//! tags through a [`Library`].
//!
//! # Example
//!
//! ```rust
//! use rattle::{render, Context};
//!
//! let ctx = Context::new().with("name", "<World>");
//! let out = render("Hello, {{ name }}!", &ctx).unwrap();
//! assert_eq!(out, "Hello, &lt;World&gt;!");
//! ```

pub mod config;
pub mod error;
pub mod library;
pub mod loader;
pub mod parser;
pub mod renderer;
pub mod template;
pub mod value;

pub use config::{ConfigError, RenderConfig};
pub use error::ParseError;
pub use library::{Library, LibraryError};
pub use loader::{find_template, select_template, LoadError};
pub use parser::{split_tag_args, SplitError};
pub use renderer::{Context, ContextError, EvalError};
pub use template::Template;
pub use value::{Function, HostError, Kwargs, Object, Value};

use thiserror::Error;

/// Errors from compiling and rendering in one step
#[derive(Debug, Error)]
pub enum Error {
    /// Error during compilation
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Error during rendering
    #[error("{0}")]
    Eval(#[from] EvalError),
}

impl Error {
    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            Error::Parse(err) => err.format(source, filename),
            Error::Eval(err) => err.format(source, filename),
        }
    }
}

/// Compile and render template source with the built-in filters
///
/// Prefer [`Template`] when the same source is rendered more than once.
pub fn render(source: &str, context: &Context) -> Result<String, Error> {
    render_with_config(source, context, &Library::with_builtins(), &RenderConfig::default())
}

/// Compile and render template source with a custom library and configuration
///
/// # Example
///
/// ```rust
/// use rattle::{render_with_config, Context, Library, RenderConfig};
///
/// let config = RenderConfig::new().with_autoescape(false);
/// let ctx = Context::new().with("html", "<b>bold</b>");
/// let out = render_with_config("{{ html }}", &ctx, &Library::new(), &config).unwrap();
/// assert_eq!(out, "<b>bold</b>");
/// ```
pub fn render_with_config(
    source: &str,
    context: &Context,
    library: &Library,
    config: &RenderConfig,
) -> Result<String, Error> {
    let template = Template::new(source)?;
    Ok(template.render_with_config(context, library, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple() {
        let ctx = Context::new().with("who", "world");
        assert_eq!(render("Hello {{ who }}", &ctx).unwrap(), "Hello world");
    }

    #[test]
    fn test_render_errors_are_unified() {
        assert!(matches!(
            render("{{ 1 + }}", &Context::new()),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            render("{{ missing }}", &Context::new()),
            Err(Error::Eval(EvalError::UndefinedName { .. }))
        ));
    }

    #[test]
    fn test_error_format_points_at_source() {
        let source = "Hi {{ missing }}";
        let err = render(source, &Context::new()).unwrap_err();
        let report = err.format(source, "greeting.html");
        assert!(report.contains("undefined name 'missing'"));
        assert!(report.contains("greeting.html"));
    }
}
