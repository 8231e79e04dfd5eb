//! Expression parser implementation using chumsky
//!
//! chumsky parses a flat sequence of operands, operators and filters; the
//! tree is then built by precedence climbing. A filter binds looser than any
//! binary operator to its left and tighter than any to its right, so
//! `a + b|f > 0` reads as `((a + b)|f) > 0`.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{self, Token};
use crate::parser::source::SourceMap;

/// Parse an expression that starts at byte `base` of the template
///
/// All spans in the result, and in any error, are offsets into the full
/// template text held by `source`.
pub fn parse_expression(
    input: &str,
    base: usize,
    source: &SourceMap,
) -> Result<Spanned<Expr>, ParseError> {
    let mut tokens = Vec::new();
    for item in lexer::lex(input) {
        let (tok, span) = item.map_err(|err| ParseError::lex(err, base, source))?;
        tokens.push((tok, SimpleSpan::from(base + span.start..base + span.end)));
    }
    tracing::trace!(tokens = tokens.len(), base, "parsing expression");

    let eoi = base + input.len();
    let token_stream =
        Stream::from_iter(tokens.into_iter()).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    expression_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| ParseError::from_rich_errors(errs, source))
}

/// Parse a standalone expression
pub fn parse_expr(input: &str) -> Result<Spanned<Expr>, ParseError> {
    let source = SourceMap::new(input);
    parse_expression(input, 0, &source)
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

#[derive(Debug, Clone)]
enum Arg {
    Positional(Spanned<Expr>),
    Keyword(Keyword),
}

type Arguments = (Vec<Spanned<Expr>>, Vec<Keyword>);

/// Keywords must follow positionals and may not repeat
fn sort_arguments(args: Vec<Arg>) -> Result<Arguments, String> {
    let mut positional = Vec::new();
    let mut keywords: Vec<Keyword> = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(expr) => {
                if !keywords.is_empty() {
                    return Err("positional argument follows keyword argument".to_string());
                }
                positional.push(expr);
            }
            Arg::Keyword(kw) => {
                if keywords.iter().any(|k| k.name.node == kw.name.node) {
                    return Err(format!("keyword argument '{}' repeated", kw.name.node));
                }
                keywords.push(kw);
            }
        }
    }
    Ok((positional, keywords))
}

#[derive(Debug, Clone)]
enum Postfix {
    Attribute(Spanned<Identifier>),
    Index(Spanned<Expr>),
    Call(Arguments),
}

#[derive(Debug, Clone)]
struct FilterCall {
    name: LookupName,
    args: Vec<Spanned<Expr>>,
    kwargs: Vec<Keyword>,
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Compare(CompareOp),
    Bool(BoolOp),
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Bool(_) => 1,
            Operator::Compare(_) => 2,
            Operator::Binary(BinaryOp::Add | BinaryOp::Sub) => 3,
            Operator::Binary(BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod) => 4,
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Operator(Operator, Spanned<Expr>),
    Filter(Spanned<FilterCall>),
}

fn number_literal(text: &str) -> Option<Literal> {
    if text.contains(&['.', 'e', 'E'][..]) {
        text.parse().ok().map(Literal::Float)
    } else {
        text.parse().ok().map(Literal::Int)
    }
}

fn apply_postfix(base: Spanned<Expr>, postfix: Spanned<Postfix>) -> Spanned<Expr> {
    let span = base.span.start..postfix.span.end;
    let base = Box::new(base);
    let node = match postfix.node {
        Postfix::Attribute(attr) => Expr::Attribute { base, attr },
        Postfix::Index(key) => Expr::Index {
            base,
            key: Box::new(key),
        },
        Postfix::Call((args, kwargs)) => Expr::Call {
            callee: base,
            args,
            kwargs,
        },
    };
    Spanned::new(node, span)
}

fn apply_operator(left: Spanned<Expr>, op: Operator, right: Spanned<Expr>) -> Spanned<Expr> {
    let span = left.span.start..right.span.end;
    let (left, right) = (Box::new(left), Box::new(right));
    let node = match op {
        Operator::Binary(op) => Expr::Binary { op, left, right },
        Operator::Compare(op) => Expr::Compare { op, left, right },
        Operator::Bool(op) => Expr::Bool { op, left, right },
    };
    Spanned::new(node, span)
}

fn apply_filter(input: Spanned<Expr>, filter: Spanned<FilterCall>) -> Spanned<Expr> {
    let span = input.span.start..filter.span.end;
    let FilterCall { name, args, kwargs } = filter.node;
    Spanned::new(
        Expr::Filter {
            input: Box::new(input),
            name,
            args,
            kwargs,
        },
        span,
    )
}

/// Build the tree from `first (op operand | filter)*`, left associative
fn climb(first: Spanned<Expr>, rest: Vec<Segment>) -> Spanned<Expr> {
    let mut pending: Vec<(Spanned<Expr>, Operator)> = Vec::new();
    let mut current = first;

    for segment in rest {
        match segment {
            Segment::Operator(op, operand) => {
                while pending
                    .last()
                    .is_some_and(|(_, top)| top.precedence() >= op.precedence())
                {
                    if let Some((left, top)) = pending.pop() {
                        current = apply_operator(left, top, current);
                    }
                }
                pending.push((current, op));
                current = operand;
            }
            Segment::Filter(filter) => {
                while let Some((left, top)) = pending.pop() {
                    current = apply_operator(left, top, current);
                }
                current = apply_filter(current, filter);
            }
        }
    }

    while let Some((left, top)) = pending.pop() {
        current = apply_operator(left, top, current);
    }
    current
}

pub(crate) fn expression_parser<'a, I>(
) -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let identifier = select! {
            Token::Name(s) => Identifier::new(s),
        }
        .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

        let number = select! {
            Token::Number(n) => n,
        }
        .try_map(|n, span: SimpleSpan| {
            number_literal(&n)
                .ok_or_else(|| Rich::custom(span, format!("number {} out of range", n)))
        });

        let literal = choice((
            number,
            select! {
                Token::String(s) => Literal::Str(s),
            },
        ))
        .map_with(|lit, e| Spanned::new(Expr::Literal(lit), span_range(&e.span())));

        let name = identifier
            .clone()
            .map(|id| Spanned::new(Expr::Name(id.node), id.span));

        let atom = choice((
            literal.clone(),
            name,
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let keyword = identifier
            .clone()
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(name, value)| Arg::Keyword(Keyword { name, value }));

        let arguments = keyword
            .or(expr.clone().map(Arg::Positional))
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .try_map(|args, span: SimpleSpan| {
                sort_arguments(args).map_err(|msg| Rich::custom(span, msg))
            })
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(identifier.clone())
                .map(Postfix::Attribute),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Postfix::Index),
            arguments.clone().map(Postfix::Call),
        ))
        .map_with(|p, e| Spanned::new(p, span_range(&e.span())));

        let unit = atom.foldl(postfix.repeated(), apply_postfix);

        let lookup_name = identifier
            .clone()
            .separated_by(just(Token::Dot))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|segments| LookupName { segments });

        let filter_arguments = choice((
            // `|filter:literal`; anything richer needs the call form
            just(Token::Colon)
                .ignore_then(literal)
                .map(|arg| (vec![arg], Vec::new())),
            arguments,
        ))
        .or_not()
        .map(Option::unwrap_or_default);

        let filter = just(Token::Pipe)
            .ignore_then(lookup_name)
            .then(filter_arguments)
            .map_with(|(name, (args, kwargs)), e| {
                Spanned::new(FilterCall { name, args, kwargs }, span_range(&e.span()))
            });

        let operator = select! {
            Token::Plus => Operator::Binary(BinaryOp::Add),
            Token::Minus => Operator::Binary(BinaryOp::Sub),
            Token::Star => Operator::Binary(BinaryOp::Mul),
            Token::Slash => Operator::Binary(BinaryOp::Div),
            Token::Percent => Operator::Binary(BinaryOp::Mod),
            Token::Eq => Operator::Compare(CompareOp::Eq),
            Token::NotEq => Operator::Compare(CompareOp::NotEq),
            Token::Lt => Operator::Compare(CompareOp::Lt),
            Token::LtE => Operator::Compare(CompareOp::LtE),
            Token::Gt => Operator::Compare(CompareOp::Gt),
            Token::GtE => Operator::Compare(CompareOp::GtE),
            Token::In => Operator::Compare(CompareOp::In),
            Token::NotIn => Operator::Compare(CompareOp::NotIn),
            Token::Is => Operator::Compare(CompareOp::Is),
            Token::IsNot => Operator::Compare(CompareOp::IsNot),
            Token::And => Operator::Bool(BoolOp::And),
            Token::Or => Operator::Bool(BoolOp::Or),
        };

        let segment = choice((
            operator
                .then(unit.clone())
                .map(|(op, operand)| Segment::Operator(op, operand)),
            filter.map(Segment::Filter),
        ));

        unit.then(segment.repeated().collect::<Vec<_>>())
            .map(|(first, rest)| climb(first, rest))
            .boxed()
    })
}
