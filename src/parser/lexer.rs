//! Lexer for the expression language using logos
//!
//! Covers everything inside `{{ }}` and the arguments of tags. The logos
//! automaton works on single words; a small pass on top joins `not in` and
//! `is not` into one operator token each.

use std::fmt;
use std::iter::Peekable;

use logos::{Logos, SpannedIter};
use thiserror::Error;

pub use super::ast::Span;

/// No token pattern matched at `span`
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unexpected input {fragment:?} at offset {}", span.start)]
pub struct LexError {
    pub fragment: String,
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
enum RawToken {
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("is")]
    Is,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("|")]
    Pipe,
    #[token(":")]
    Colon,

    // Longer operators win over their prefixes
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtE,
    #[token("<")]
    Lt,
    #[token(">=")]
    GtE,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[regex(r"[0-9]+(\.[0-9]+|[eE]-?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    // Quotes are stripped, escapes are not interpreted
    #[regex(r#""[^"]*"|'[^']*'"#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    String(String),

    // Identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Name(String),
}

/// Expression token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal text; a `.`, `e` or `E` makes it a float
    Number(String),
    /// String literal contents without the quotes
    String(String),
    Name(String),

    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Dot,
    Pipe,
    Colon,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eq,
    NotEq,
    LtE,
    Lt,
    GtE,
    Gt,
    In,
    NotIn,
    Is,
    IsNot,

    And,
    Or,
    /// A `not` that is not followed by `in`; no production accepts it
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::String(s) => write!(f, "string {:?}", s),
            Token::Name(n) => write!(f, "name '{}'", n),
            other => write!(f, "'{}'", other.symbol()),
        }
    }
}

impl Token {
    fn symbol(&self) -> &'static str {
        match self {
            Token::Number(_) | Token::String(_) | Token::Name(_) => "literal",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Pipe => "|",
            Token::Colon => ":",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::LtE => "<=",
            Token::Lt => "<",
            Token::GtE => ">=",
            Token::Gt => ">",
            Token::In => "in",
            Token::NotIn => "not in",
            Token::Is => "is",
            Token::IsNot => "is not",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
        }
    }
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::In => Token::In,
            RawToken::Not => Token::Not,
            RawToken::Is => Token::Is,
            RawToken::And => Token::And,
            RawToken::Or => Token::Or,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::LParen => Token::LParen,
            RawToken::RParen => Token::RParen,
            RawToken::Comma => Token::Comma,
            RawToken::Dot => Token::Dot,
            RawToken::Pipe => Token::Pipe,
            RawToken::Colon => Token::Colon,
            RawToken::Eq => Token::Eq,
            RawToken::NotEq => Token::NotEq,
            RawToken::LtE => Token::LtE,
            RawToken::Lt => Token::Lt,
            RawToken::GtE => Token::GtE,
            RawToken::Gt => Token::Gt,
            RawToken::Assign => Token::Assign,
            RawToken::Plus => Token::Plus,
            RawToken::Minus => Token::Minus,
            RawToken::Star => Token::Star,
            RawToken::Slash => Token::Slash,
            RawToken::Percent => Token::Percent,
            RawToken::Number(n) => Token::Number(n),
            RawToken::String(s) => Token::String(s),
            RawToken::Name(n) => Token::Name(n),
        }
    }
}

/// Streaming expression lexer
///
/// Each call to [`lex`] builds a fresh one; nothing is shared between runs.
pub struct Lexer<'a> {
    source: &'a str,
    raw: Peekable<SpannedIter<'a, RawToken>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            raw: RawToken::lexer(source).spanned().peekable(),
        }
    }

    /// Consume the next raw token if it is `expected`, returning its span
    fn take_if(&mut self, expected: &RawToken) -> Option<Span> {
        match self.raw.peek() {
            Some((Ok(tok), span)) if tok == expected => {
                let span = span.clone();
                self.raw.next();
                Some(span)
            }
            _ => None,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<(Token, Span), LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (raw, span) = self.raw.next()?;
        let raw = match raw {
            Ok(raw) => raw,
            Err(()) => {
                return Some(Err(LexError {
                    fragment: self.source[span.clone()].to_string(),
                    span,
                }))
            }
        };

        let joined = match raw {
            RawToken::Not => self.take_if(&RawToken::In).map(|end| (Token::NotIn, end)),
            RawToken::Is => self.take_if(&RawToken::Not).map(|end| (Token::IsNot, end)),
            _ => None,
        };
        Some(Ok(match joined {
            Some((tok, end)) => (tok, span.start..end.end),
            None => (raw.into(), span),
        }))
    }
}

/// Lex an expression into tokens with spans relative to `input`
pub fn lex(input: &str) -> Lexer<'_> {
    Lexer::new(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input)
            .map(|r| r.expect("should lex").0)
            .collect()
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            tokens(r#"42 3.5 1e-3 "a b" 'c'"#),
            vec![
                Token::Number("42".to_string()),
                Token::Number("3.5".to_string()),
                Token::Number("1e-3".to_string()),
                Token::String("a b".to_string()),
                Token::String("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_strings_keep_backslashes() {
        assert_eq!(
            tokens(r#""a\n""#),
            vec![Token::String(r"a\n".to_string())]
        );
    }

    #[test]
    fn test_keywords_vs_names() {
        assert_eq!(
            tokens("in index is island and android or order"),
            vec![
                Token::In,
                Token::Name("index".to_string()),
                Token::Is,
                Token::Name("island".to_string()),
                Token::And,
                Token::Name("android".to_string()),
                Token::Or,
                Token::Name("order".to_string()),
            ]
        );
    }

    #[test]
    fn test_multi_word_operators() {
        assert_eq!(
            tokens("a not in b is not c"),
            vec![
                Token::Name("a".to_string()),
                Token::NotIn,
                Token::Name("b".to_string()),
                Token::IsNot,
                Token::Name("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_multi_word_operator_span() {
        let (tok, span) = lex("x not   in y").nth(1).unwrap().unwrap();
        assert_eq!(tok, Token::NotIn);
        assert_eq!(span, 2..10);
    }

    #[test]
    fn test_lone_not() {
        assert_eq!(
            tokens("not x"),
            vec![Token::Not, Token::Name("x".to_string())]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("== != <= < >= > = + - * / % | : . , ( ) [ ]"),
            vec![
                Token::Eq,
                Token::NotEq,
                Token::LtE,
                Token::Lt,
                Token::GtE,
                Token::Gt,
                Token::Assign,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Pipe,
                Token::Colon,
                Token::Dot,
                Token::Comma,
                Token::LParen,
                Token::RParen,
                Token::LBracket,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_kwarg_assign_not_eq() {
        assert_eq!(
            tokens("f(x=1)"),
            vec![
                Token::Name("f".to_string()),
                Token::LParen,
                Token::Name("x".to_string()),
                Token::Assign,
                Token::Number("1".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_lex_error_reports_fragment() {
        let err = lex("a ? b")
            .find_map(|r| r.err())
            .expect("should fail");
        assert_eq!(err.fragment, "?");
        assert_eq!(err.span, 2..3);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(lex(r#""abc"#).any(|r| r.is_err()));
    }
}
