//! Structural parser: template text into the document tree
//!
//! chumsky builds a raw block tree over markup tokens, keeping the text of
//! every `{{ }}` and `{% %}` unparsed. A second pass compiles that text with
//! the expression grammar and checks the shape of `for` and custom tags.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::args::split_tag_args_spanned;
use crate::parser::ast::*;
use crate::parser::grammar::parse_expression;
use crate::parser::markup::{self, MarkupToken};
use crate::parser::source::SourceMap;

#[derive(Debug, Clone)]
enum Block {
    Text(String),
    Var(Spanned<String>),
    Comment,
    Tag(Spanned<String>),
    If {
        test: Spanned<String>,
        body: Vec<Spanned<Block>>,
        orelse: Vec<Spanned<Block>>,
    },
    For {
        args: Spanned<String>,
        body: Vec<Spanned<Block>>,
        orelse: Vec<Spanned<Block>>,
    },
}

/// Parse a whole template into its document tree
pub fn parse_document(source: &SourceMap) -> Result<Vec<Spanned<Node>>, ParseError> {
    let text = source.text();
    let mut tokens = Vec::new();
    for item in markup::lex(text) {
        let (tok, span) = item.map_err(|err| ParseError::lex(err, 0, source))?;
        tokens.push((tok, SimpleSpan::from(span)));
    }
    tracing::trace!(tokens = tokens.len(), "parsing template structure");

    let len = text.len();
    let token_stream =
        Stream::from_iter(tokens.into_iter()).map((len..len).into(), |(t, s): (_, _)| (t, s));

    let blocks = document_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| ParseError::from_rich_errors(errs, source))?;

    compile_blocks(blocks, source)
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn document_parser<'a, I>(
) -> impl Parser<'a, I, Vec<Spanned<Block>>, extra::Err<Rich<'a, MarkupToken>>> + Clone
where
    I: ValueInput<'a, Token = MarkupToken, Span = SimpleSpan>,
{
    let content = select! {
        MarkupToken::Content(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    // `{% keyword %}` with nothing else inside
    let clause = |keyword: MarkupToken| {
        just(MarkupToken::TagStart)
            .ignore_then(just(keyword))
            .then_ignore(just(MarkupToken::TagEnd))
    };

    recursive(|blocks| {
        let text = select! {
            MarkupToken::Content(s) => Block::Text(s),
        };

        let var = just(MarkupToken::VarStart)
            .ignore_then(content.clone())
            .then_ignore(just(MarkupToken::VarEnd))
            .map(Block::Var);

        let comment = just(MarkupToken::CommentStart)
            .ignore_then(
                any()
                    .and_is(just(MarkupToken::CommentEnd).not())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(MarkupToken::CommentEnd))
            .to(Block::Comment);

        let if_block = just(MarkupToken::TagStart)
            .ignore_then(just(MarkupToken::If))
            .ignore_then(content.clone())
            .then_ignore(just(MarkupToken::TagEnd))
            .then(blocks.clone())
            .then(clause(MarkupToken::Else).ignore_then(blocks.clone()).or_not())
            .then_ignore(clause(MarkupToken::EndIf))
            .map(|((test, body), orelse)| Block::If {
                test,
                body,
                orelse: orelse.unwrap_or_default(),
            });

        let for_block = just(MarkupToken::TagStart)
            .ignore_then(just(MarkupToken::For))
            .ignore_then(content.clone())
            .then_ignore(just(MarkupToken::TagEnd))
            .then(blocks.clone())
            .then(
                choice((clause(MarkupToken::Empty), clause(MarkupToken::Else)))
                    .ignore_then(blocks.clone())
                    .or_not(),
            )
            .then_ignore(clause(MarkupToken::EndFor))
            .map(|((args, body), orelse)| Block::For {
                args,
                body,
                orelse: orelse.unwrap_or_default(),
            });

        let tag = just(MarkupToken::TagStart)
            .ignore_then(content.clone())
            .then_ignore(just(MarkupToken::TagEnd))
            .map(Block::Tag);

        choice((text, var, comment, if_block, for_block, tag))
            .map_with(|block, e| Spanned::new(block, span_range(&e.span())))
            .repeated()
            .collect::<Vec<_>>()
            .boxed()
    })
}

fn compile_blocks(
    blocks: Vec<Spanned<Block>>,
    source: &SourceMap,
) -> Result<Vec<Spanned<Node>>, ParseError> {
    blocks
        .into_iter()
        .map(|block| compile_block(block, source))
        .collect()
}

fn compile_block(block: Spanned<Block>, source: &SourceMap) -> Result<Spanned<Node>, ParseError> {
    let span = block.span;
    let node = match block.node {
        Block::Text(text) => Node::Text(text),
        Block::Comment => Node::Comment,
        Block::Var(content) => Node::Var(expression(&content, source)?),
        Block::If { test, body, orelse } => Node::If {
            test: expression(&test, source)?,
            body: compile_blocks(body, source)?,
            orelse: compile_blocks(orelse, source)?,
        },
        Block::For { args, body, orelse } => {
            let (target, iterable) = for_header(&args, source)?;
            Node::For {
                target,
                iterable,
                body: compile_blocks(body, source)?,
                orelse: compile_blocks(orelse, source)?,
            }
        }
        Block::Tag(content) => {
            let (name, args, kwargs) = custom_tag(&content, source)?;
            tracing::trace!(tag = %name, "compiled custom tag");
            Node::Tag { name, args, kwargs }
        }
    };
    Ok(Spanned::new(node, span))
}

fn expression(content: &Spanned<String>, source: &SourceMap) -> Result<Spanned<Expr>, ParseError> {
    parse_expression(&content.node, content.span.start, source)
}

/// `target in iterable`; the iterable is the rest of the text after `in`
fn for_header(
    args: &Spanned<String>,
    source: &SourceMap,
) -> Result<(Spanned<Identifier>, Spanned<Expr>), ParseError> {
    let base = args.span.start;
    let words = split_tag_args_spanned(&args.node)
        .map_err(|err| ParseError::split_args(err, args.span.clone(), source))?;

    match words.as_slice() {
        [target, keyword, iterable, ..] if keyword.text == "in" => {
            if !Identifier::is_valid(&target.text) {
                return Err(ParseError::tag_syntax(
                    base + target.offset..base + target.offset + target.text.len(),
                    format!("invalid loop variable '{}'", target.text),
                    source,
                ));
            }
            let target = Spanned::new(
                Identifier::new(target.text.clone()),
                base + target.offset..base + target.offset + target.text.len(),
            );
            let iterable = parse_expression(
                &args.node[iterable.offset..],
                base + iterable.offset,
                source,
            )?;
            Ok((target, iterable))
        }
        [_, keyword] if keyword.text == "in" => Err(ParseError::tag_syntax(
            args.span.clone(),
            "missing iterable after 'in'",
            source,
        )),
        _ => Err(ParseError::tag_syntax(
            args.span.clone(),
            "'in' expected in for loop arguments",
            source,
        )),
    }
}

type TagCall = (LookupName, Vec<Spanned<Expr>>, Vec<Keyword>);

/// `name arg... key=value...`
fn custom_tag(content: &Spanned<String>, source: &SourceMap) -> Result<TagCall, ParseError> {
    let base = content.span.start;
    let words = split_tag_args_spanned(&content.node)
        .map_err(|err| ParseError::split_args(err, content.span.clone(), source))?;
    let Some((head, rest)) = words.split_first() else {
        return Err(ParseError::tag_syntax(
            content.span.clone(),
            "empty tag",
            source,
        ));
    };

    let mut segments = Vec::new();
    let mut offset = base + head.offset;
    for part in head.text.split('.') {
        let span = offset..offset + part.len();
        if !Identifier::is_valid(part) {
            return Err(ParseError::tag_syntax(
                base + head.offset..base + head.offset + head.text.len(),
                format!("invalid tag name '{}'", head.text),
                source,
            ));
        }
        segments.push(Spanned::new(Identifier::new(part), span));
        offset += part.len() + 1;
    }
    let name = LookupName { segments };

    let mut args = Vec::new();
    let mut kwargs: Vec<Keyword> = Vec::new();
    for word in rest {
        let start = base + word.offset;
        match keyword_split(&word.text) {
            Some(eq) => {
                let key = &word.text[..eq];
                if kwargs.iter().any(|k| k.name.node.as_str() == key) {
                    return Err(ParseError::tag_syntax(
                        start..start + word.text.len(),
                        format!("keyword argument '{}' repeated", key),
                        source,
                    ));
                }
                let value = parse_expression(&word.text[eq + 1..], start + eq + 1, source)?;
                kwargs.push(Keyword {
                    name: Spanned::new(Identifier::new(key), start..start + eq),
                    value,
                });
            }
            None => {
                if !kwargs.is_empty() {
                    return Err(ParseError::tag_syntax(
                        start..start + word.text.len(),
                        "positional argument follows keyword argument",
                        source,
                    ));
                }
                args.push(parse_expression(&word.text, start, source)?);
            }
        }
    }
    Ok((name, args, kwargs))
}

/// Byte index of the `=` in `name=value`, if the word has that shape
fn keyword_split(word: &str) -> Option<usize> {
    let eq = word.find('=')?;
    let key = &word[..eq];
    let is_comparison = word[eq + 1..].starts_with('=');
    (Identifier::is_valid(key) && !is_comparison).then_some(eq)
}
