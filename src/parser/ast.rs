//! Abstract syntax tree types for compiled templates
//!
//! Two trees live here: the expression tree produced by the expression
//! grammar (everything inside `{{ }}` and tag arguments) and the document
//! tree produced by the structural grammar. Both are immutable once built.

/// Byte range in the template source
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether `s` is a well-formed identifier
    pub fn is_valid(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dotted name used to look up filters and tags: `escape`, `app.filters.escape`
#[derive(Debug, Clone, PartialEq)]
pub struct LookupName {
    pub segments: Vec<Spanned<Identifier>>,
}

impl LookupName {
    /// The segments joined by `.`
    pub fn dotted(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.node.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for LookupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Constant written directly in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Short-circuiting boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Comparison operators; all share one precedence level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtE => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtE => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }
}

/// `name=expr` inside a call or filter argument list
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: Spanned<Identifier>,
    pub value: Spanned<Expr>,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Bare name, resolved against the working context
    Name(Identifier),
    /// `base.attr`
    Attribute {
        base: Box<Spanned<Expr>>,
        attr: Spanned<Identifier>,
    },
    /// `base[key]`
    Index {
        base: Box<Spanned<Expr>>,
        key: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Bool {
        op: BoolOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Compare {
        op: CompareOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    /// `callee(args, kw=value)`
    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
        kwargs: Vec<Keyword>,
    },
    /// `input | name(args, kw=value)`
    ///
    /// Evaluates as a call of the library filter `name` with `input`
    /// prepended to the positional arguments. The filter is looked up when
    /// the expression is evaluated, not when it is parsed.
    Filter {
        input: Box<Spanned<Expr>>,
        name: LookupName,
        args: Vec<Spanned<Expr>>,
        kwargs: Vec<Keyword>,
    },
}

/// Document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal template text, emitted verbatim
    Text(String),
    /// `{{ expr }}`, emitted through auto-escape
    Var(Spanned<Expr>),
    /// `{% if test %}body{% else %}orelse{% endif %}`
    If {
        test: Spanned<Expr>,
        body: Vec<Spanned<Node>>,
        orelse: Vec<Spanned<Node>>,
    },
    /// `{% for target in iterable %}body{% empty %}orelse{% endfor %}`
    For {
        target: Spanned<Identifier>,
        iterable: Spanned<Expr>,
        body: Vec<Spanned<Node>>,
        orelse: Vec<Spanned<Node>>,
    },
    /// `{% name args %}`, a library tag invoked at render time
    Tag {
        name: LookupName,
        args: Vec<Spanned<Expr>>,
        kwargs: Vec<Keyword>,
    },
    /// `{# ... #}`
    Comment,
}
