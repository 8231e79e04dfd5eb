//! Tree-walking evaluator for compiled templates
//!
//! Rendering walks the document tree depth first, appending to one output
//! buffer. Nothing in the tree is mutated; all per-render state lives in a
//! [`Renderer`], so one template can be rendered from many threads at once.

pub mod context;
mod error;
pub mod escape;
mod ops;

pub use context::{Context, ContextError};
pub use error::EvalError;

use crate::config::RenderConfig;
use crate::library::Library;
use crate::parser::ast::*;
use crate::parser::source::SourceMap;
use crate::value::{Function, Kwargs, Value};
use context::Scope;
use ops::{LookupError, OpError};

/// State of one render
pub(crate) struct Renderer<'r> {
    library: &'r Library,
    config: &'r RenderConfig,
    source: &'r SourceMap,
    scope: Scope<'r>,
}

impl<'r> Renderer<'r> {
    pub(crate) fn new(
        library: &'r Library,
        config: &'r RenderConfig,
        source: &'r SourceMap,
        context: &'r Context,
    ) -> Self {
        Self {
            library,
            config,
            source,
            scope: Scope::new(context),
        }
    }

    /// Render a document; on error the partial output is dropped
    pub(crate) fn render(mut self, nodes: &[Spanned<Node>]) -> Result<String, EvalError> {
        let mut out = String::new();
        self.render_nodes(nodes, &mut out)?;
        Ok(out)
    }

    fn render_nodes(&mut self, nodes: &[Spanned<Node>], out: &mut String) -> Result<(), EvalError> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Spanned<Node>, out: &mut String) -> Result<(), EvalError> {
        match &node.node {
            Node::Text(text) => out.push_str(text),
            Node::Comment => {}
            Node::Var(expr) => {
                let value = self.eval(expr)?;
                self.emit(&value, out);
            }
            Node::If { test, body, orelse } => {
                if self.eval(test)?.is_truthy() {
                    self.render_nodes(body, out)?;
                } else {
                    self.render_nodes(orelse, out)?;
                }
            }
            Node::For {
                target,
                iterable,
                body,
                orelse,
            } => {
                let value = self.eval(iterable)?;
                let items = value.iterate().ok_or_else(|| {
                    EvalError::type_error(
                        format!("{} value is not iterable", value.kind()),
                        iterable.span.clone(),
                        self.source,
                    )
                })?;
                if items.is_empty() {
                    return self.render_nodes(orelse, out);
                }
                let frame = self.scope.push(target.node.as_str());
                for item in items {
                    self.scope.bind(frame, item);
                    self.render_nodes(body, out)?;
                }
                self.scope.pop();
            }
            Node::Tag { name, args, kwargs } => {
                let dotted = name.dotted();
                let Some(tag) = self.library.tag(&dotted) else {
                    return Err(EvalError::UnknownTag {
                        ambiguous: self.library.is_ambiguous_tag(&dotted),
                        name: dotted,
                        location: self.source.locate(node.span.start),
                        span: node.span.clone(),
                    });
                };
                let args = self.eval_all(args)?;
                let kwargs = self.eval_kwargs(kwargs)?;
                let value = self.invoke(tag, &args, &kwargs, &node.span)?;
                self.emit(&value, out);
            }
        }
        Ok(())
    }

    fn emit(&self, value: &Value, out: &mut String) {
        if self.config.autoescape {
            out.push_str(&escape::escape_value(value));
        } else {
            out.push_str(&value.to_string());
        }
    }

    fn eval_all(&self, exprs: &[Spanned<Expr>]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_kwargs(&self, keywords: &[Keyword]) -> Result<Kwargs, EvalError> {
        keywords
            .iter()
            .map(|kw| Ok::<_, EvalError>((kw.name.node.to_string(), self.eval(&kw.value)?)))
            .collect()
    }

    fn invoke(
        &self,
        f: &Function,
        args: &[Value],
        kwargs: &Kwargs,
        span: &Span,
    ) -> Result<Value, EvalError> {
        f.call(args, kwargs)
            .map_err(|err| EvalError::call(f.name(), err, span.clone(), self.source))
    }

    fn eval(&self, expr: &Spanned<Expr>) -> Result<Value, EvalError> {
        let span = &expr.span;
        match &expr.node {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Name(name) => self
                .scope
                .lookup(name.as_str())
                .ok_or_else(|| EvalError::undefined(name.as_str(), span.clone(), self.source)),

            Expr::Attribute { base, attr } => {
                let value = self.eval(base)?;
                value
                    .get_attr(attr.node.as_str())
                    .ok_or_else(|| EvalError::Attribute {
                        kind: value.kind().to_string(),
                        attr: attr.node.to_string(),
                        location: self.source.locate(attr.span.start),
                        span: attr.span.clone(),
                    })
            }

            Expr::Index { base, key } => {
                let value = self.eval(base)?;
                let key = self.eval(key)?;
                ops::subscript(&value, &key).map_err(|err| self.lookup_error(err, span))
            }

            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r).map_err(|err| self.op_error(err, span))
            }

            Expr::Bool { op, left, right } => {
                let l = self.eval(left)?;
                match (op, l.is_truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(l),
                    _ => self.eval(right),
                }
            }

            Expr::Compare { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::compare(*op, &l, &r)
                    .map(Value::Bool)
                    .map_err(|err| self.op_error(err, span))
            }

            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                let target = self.eval(callee)?;
                let args = self.eval_all(args)?;
                let kwargs = self.eval_kwargs(kwargs)?;
                match &target {
                    Value::Callable(f) => self.invoke(f, &args, &kwargs, span),
                    Value::Object(obj) => match obj.call(&args, &kwargs) {
                        Some(result) => result.map_err(|err| {
                            EvalError::call(obj.type_name(), err, span.clone(), self.source)
                        }),
                        None => Err(self.not_callable(&target, span)),
                    },
                    other => Err(self.not_callable(other, span)),
                }
            }

            Expr::Filter {
                input,
                name,
                args,
                kwargs,
            } => {
                let dotted = name.dotted();
                let Some(filter) = self.library.filter(&dotted) else {
                    let name_span = name
                        .segments
                        .first()
                        .map(|first| first.span.start)
                        .zip(name.segments.last().map(|last| last.span.end))
                        .map(|(start, end)| start..end)
                        .unwrap_or_else(|| span.clone());
                    return Err(EvalError::UnknownFilter {
                        ambiguous: self.library.is_ambiguous_filter(&dotted),
                        name: dotted,
                        location: self.source.locate(name_span.start),
                        span: name_span,
                    });
                };
                let mut all_args = Vec::with_capacity(args.len() + 1);
                all_args.push(self.eval(input)?);
                for arg in args {
                    all_args.push(self.eval(arg)?);
                }
                let kwargs = self.eval_kwargs(kwargs)?;
                self.invoke(filter, &all_args, &kwargs, span)
            }
        }
    }

    fn not_callable(&self, value: &Value, span: &Span) -> EvalError {
        EvalError::type_error(
            format!("{} value is not callable", value.kind()),
            span.clone(),
            self.source,
        )
    }

    fn op_error(&self, err: OpError, span: &Span) -> EvalError {
        match err {
            OpError::Type(message) => EvalError::type_error(message, span.clone(), self.source),
            OpError::Arithmetic(message) => {
                EvalError::arithmetic(message, span.clone(), self.source)
            }
        }
    }

    fn lookup_error(&self, err: LookupError, span: &Span) -> EvalError {
        let location = self.source.locate(span.start);
        match err {
            LookupError::Index { kind, index, len } => EvalError::Index {
                kind,
                index,
                len,
                span: span.clone(),
                location,
            },
            LookupError::Key(key) => EvalError::Key {
                key,
                span: span.clone(),
                location,
            },
            LookupError::Type(message) => EvalError::Type {
                message,
                span: span.clone(),
                location,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn render_with(source: &str, context: &Context, library: &Library) -> Result<String, EvalError> {
        let map = SourceMap::new(source);
        let nodes = parse_document(&map).unwrap();
        let config = RenderConfig::default();
        Renderer::new(library, &config, &map, context).render(&nodes)
    }

    fn render(source: &str, context: &Context) -> Result<String, EvalError> {
        render_with(source, context, &Library::with_builtins())
    }

    #[test]
    fn test_text_is_verbatim() {
        assert_eq!(render("a <b> & c", &Context::new()).unwrap(), "a <b> & c");
    }

    #[test]
    fn test_boolean_operators_return_operands() {
        let ctx = Context::new().with("a", "").with("b", "x");
        assert_eq!(render("{{ a or b }}", &ctx).unwrap(), "x");
        assert_eq!(render("{{ b and a }}", &ctx).unwrap(), "");
        assert_eq!(render("{{ a and missing }}", &ctx).unwrap(), "");
        assert_eq!(render("{{ b or missing }}", &ctx).unwrap(), "x");
    }

    #[test]
    fn test_loop_variable_is_restored() {
        let ctx = Context::new()
            .with("x", "outer")
            .with("xs", vec![1, 2]);
        assert_eq!(
            render("{% for x in xs %}{{ x }}{% endfor %}{{ x }}", &ctx).unwrap(),
            "12outer"
        );
    }

    #[test]
    fn test_nested_loops_with_same_name() {
        let ctx = Context::new().with("xs", vec![vec![1, 2], vec![3]]);
        assert_eq!(
            render(
                "{% for x in xs %}[{% for x in x %}{{ x }}{% endfor %}]{% endfor %}",
                &ctx
            )
            .unwrap(),
            "[12][3]"
        );
    }

    #[test]
    fn test_iterating_non_iterable() {
        let ctx = Context::new().with("n", 3);
        let err = render("{% for x in n %}{% endfor %}", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::Type { .. }));
        assert_eq!(err.span(), &(12..13));
    }

    #[test]
    fn test_attribute_error_points_at_attribute() {
        let ctx = Context::new().with("n", 3);
        let err = render("{{ n.real }}", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::Attribute { .. }));
        assert_eq!(err.span(), &(5..9));
        assert_eq!(err.to_string(), "int value has no attribute 'real' at line 1, column 6");
    }

    #[test]
    fn test_unknown_filter_span() {
        let err = render("{{ 1|nope }}", &Context::new()).unwrap_err();
        assert!(matches!(err, EvalError::UnknownFilter { ambiguous: false, .. }));
        assert_eq!(err.span(), &(5..9));
    }

    #[test]
    fn test_calling_a_string() {
        let ctx = Context::new().with("s", "x");
        let err = render("{{ s() }}", &ctx).unwrap_err();
        assert!(err.to_string().contains("string value is not callable"));
    }

    #[test]
    fn test_autoescape_off() {
        let map = SourceMap::new("{{ s }}");
        let nodes = parse_document(&map).unwrap();
        let ctx = Context::new().with("s", "<b>");
        let config = RenderConfig::default().with_autoescape(false);
        let library = Library::new();
        let out = Renderer::new(&library, &config, &map, &ctx)
            .render(&nodes)
            .unwrap();
        assert_eq!(out, "<b>");
    }
}
