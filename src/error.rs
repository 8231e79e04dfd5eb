//! Error types for lexing and parsing templates

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

use crate::parser::args::SplitError;
use crate::parser::ast::Span;
use crate::parser::lexer::LexError;
use crate::parser::source::{Location, SourceMap};

/// Errors raised while compiling a template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// No token pattern matched
    #[error("unexpected input {fragment:?} at {location}")]
    Lex {
        fragment: String,
        span: Span,
        location: Location,
    },

    /// Unexpected token or grammar violation
    #[error("syntax error at {location}: {message}")]
    Syntax {
        span: Span,
        location: Location,
        message: String,
        expected: Vec<String>,
    },

    /// A tag's arguments have the wrong shape
    #[error("invalid tag at {location}: {message}")]
    TagSyntax {
        span: Span,
        location: Location,
        message: String,
    },

    /// A tag's arguments could not be split into words
    #[error("invalid tag arguments at {location}: {source}")]
    SplitArgs {
        #[source]
        source: SplitError,
        span: Span,
        location: Location,
    },
}

impl ParseError {
    /// Lexer failure in text that starts at byte `base` of the template
    pub fn lex(err: LexError, base: usize, map: &SourceMap) -> Self {
        let span = base + err.span.start..base + err.span.end;
        ParseError::Lex {
            fragment: err.fragment,
            location: map.locate(span.start),
            span,
        }
    }

    pub fn tag_syntax(span: Span, message: impl Into<String>, map: &SourceMap) -> Self {
        ParseError::TagSyntax {
            location: map.locate(span.start),
            span,
            message: message.into(),
        }
    }

    pub fn split_args(source: SplitError, span: Span, map: &SourceMap) -> Self {
        ParseError::SplitArgs {
            source,
            location: map.locate(span.start),
            span,
        }
    }

    /// Convert the first of chumsky's errors
    pub fn from_rich_errors<T: fmt::Display>(errors: Vec<Rich<'_, T>>, map: &SourceMap) -> Self {
        match errors.into_iter().next() {
            Some(err) => Self::from_rich(err, map),
            None => ParseError::Syntax {
                span: 0..0,
                location: map.locate(0),
                message: "invalid syntax".to_string(),
                expected: Vec::new(),
            },
        }
    }

    /// Convert a chumsky error into a syntax error with a readable message
    pub fn from_rich<T: fmt::Display>(err: Rich<'_, T>, map: &SourceMap) -> Self {
        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => (**tok).to_string(),
                    None => "end of input".to_string(),
                };
                format!("unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some((**tok).to_string()),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();

        let span = err.span().into_range();
        ParseError::Syntax {
            location: map.locate(span.start),
            span,
            message,
            expected,
        }
    }

    /// Byte range of the offending source
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Lex { span, .. }
            | ParseError::Syntax { span, .. }
            | ParseError::TagSyntax { span, .. }
            | ParseError::SplitArgs { span, .. } => span,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            ParseError::Lex { location, .. }
            | ParseError::Syntax { location, .. }
            | ParseError::TagSyntax { location, .. }
            | ParseError::SplitArgs { location, .. } => *location,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let message = match self {
            ParseError::Syntax {
                message, expected, ..
            } if !expected.is_empty() => {
                format!("{}\nExpected: {}", message, expected.join(", "))
            }
            ParseError::Syntax { message, .. } | ParseError::TagSyntax { message, .. } => {
                message.clone()
            }
            ParseError::Lex { fragment, .. } => format!("unexpected input {:?}", fragment),
            ParseError::SplitArgs { source, .. } => source.to_string(),
        };
        report(source, filename, self.span(), &message)
    }
}

/// Render a single-label ariadne report
pub(crate) fn report(source: &str, filename: &str, span: &Span, message: &str) -> String {
    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, filename, span.start)
        .with_message(message)
        .with_label(
            Label::new((filename, span.clone()))
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => message.to_string(),
    }
}
