//! Structural lexer: splits template source at `{{ }}`, `{% %}` and `{# #}`
//!
//! logos recognizes the six two-character markers and everything else as
//! text fragments. A merge pass on top turns runs of fragments into a single
//! `Content` token, trims content found between markers, and splits a
//! reserved leading word (`if`, `endfor`, ...) off tag content.

use std::collections::VecDeque;
use std::fmt;

use logos::{Logos, SpannedIter};

use super::ast::Span;
use super::lexer::LexError;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum RawMarkup {
    #[token("{{")]
    VarStart,
    #[token("}}")]
    VarEnd,
    #[token("{%")]
    TagStart,
    #[token("%}")]
    TagEnd,
    #[token("{#")]
    CommentStart,
    #[token("#}")]
    CommentEnd,

    #[regex(r"[^{}%#]+")]
    Text,
    // A marker character that is not part of a marker
    #[regex(r"[{}%#]")]
    Stray,
}

/// Structural token
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupToken {
    VarStart,
    VarEnd,
    TagStart,
    TagEnd,
    CommentStart,
    CommentEnd,
    /// Literal text, or the trimmed text between two markers
    Content(String),

    // Reserved words leading tag content
    If,
    EndIf,
    Else,
    For,
    EndFor,
    Empty,
}

impl MarkupToken {
    fn keyword(word: &str) -> Option<Self> {
        match word {
            "if" => Some(MarkupToken::If),
            "endif" => Some(MarkupToken::EndIf),
            "else" => Some(MarkupToken::Else),
            "for" => Some(MarkupToken::For),
            "endfor" => Some(MarkupToken::EndFor),
            "empty" => Some(MarkupToken::Empty),
            _ => None,
        }
    }
}

impl fmt::Display for MarkupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupToken::VarStart => f.write_str("'{{'"),
            MarkupToken::VarEnd => f.write_str("'}}'"),
            MarkupToken::TagStart => f.write_str("'{%'"),
            MarkupToken::TagEnd => f.write_str("'%}'"),
            MarkupToken::CommentStart => f.write_str("'{#'"),
            MarkupToken::CommentEnd => f.write_str("'#}'"),
            MarkupToken::Content(s) => write!(f, "text {:?}", s),
            MarkupToken::If => f.write_str("keyword 'if'"),
            MarkupToken::EndIf => f.write_str("keyword 'endif'"),
            MarkupToken::Else => f.write_str("keyword 'else'"),
            MarkupToken::For => f.write_str("keyword 'for'"),
            MarkupToken::EndFor => f.write_str("keyword 'endfor'"),
            MarkupToken::Empty => f.write_str("keyword 'empty'"),
        }
    }
}

/// Streaming structural lexer
pub struct MarkupLexer<'a> {
    source: &'a str,
    raw: SpannedIter<'a, RawMarkup>,
    queue: VecDeque<(MarkupToken, Span)>,
    /// Text fragments not yet emitted
    pending: Option<Span>,
    /// Between a start marker and its end marker
    inside: bool,
    last_marker: Option<RawMarkup>,
    done: bool,
}

impl<'a> MarkupLexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            raw: RawMarkup::lexer(source).spanned(),
            queue: VecDeque::new(),
            pending: None,
            inside: false,
            last_marker: None,
            done: false,
        }
    }

    fn extend_pending(&mut self, span: Span) {
        self.pending = Some(match self.pending.take() {
            Some(p) => p.start..span.end,
            None => span,
        });
    }

    fn flush(&mut self) {
        let Some(span) = self.pending.take() else {
            return;
        };
        let text = &self.source[span.clone()];

        if !self.inside {
            self.queue
                .push_back((MarkupToken::Content(text.to_string()), span));
            return;
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let start = span.start + (text.len() - text.trim_start().len());

        if self.last_marker == Some(RawMarkup::TagStart) {
            let word = trimmed
                .split_whitespace()
                .next()
                .unwrap_or(trimmed);
            if let Some(keyword) = MarkupToken::keyword(word) {
                self.queue.push_back((keyword, start..start + word.len()));
                let rest = &trimmed[word.len()..];
                let rest_trimmed = rest.trim_start();
                if !rest_trimmed.is_empty() {
                    let rest_start = start + word.len() + (rest.len() - rest_trimmed.len());
                    self.queue.push_back((
                        MarkupToken::Content(rest_trimmed.to_string()),
                        rest_start..rest_start + rest_trimmed.len(),
                    ));
                }
                return;
            }
        }

        self.queue.push_back((
            MarkupToken::Content(trimmed.to_string()),
            start..start + trimmed.len(),
        ));
    }

    fn push_marker(&mut self, marker: RawMarkup, span: Span) {
        let (token, inside) = match marker {
            RawMarkup::VarStart => (MarkupToken::VarStart, true),
            RawMarkup::VarEnd => (MarkupToken::VarEnd, false),
            RawMarkup::TagStart => (MarkupToken::TagStart, true),
            RawMarkup::TagEnd => (MarkupToken::TagEnd, false),
            RawMarkup::CommentStart => (MarkupToken::CommentStart, true),
            RawMarkup::CommentEnd => (MarkupToken::CommentEnd, false),
            RawMarkup::Text | RawMarkup::Stray => return self.extend_pending(span),
        };
        self.flush();
        self.queue.push_back((token, span));
        self.inside = inside;
        self.last_marker = Some(marker);
    }
}

impl Iterator for MarkupLexer<'_> {
    type Item = Result<(MarkupToken, Span), LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.raw.next() {
                None => {
                    self.done = true;
                    self.flush();
                }
                Some((Ok(raw), span)) => self.push_marker(raw, span),
                Some((Err(()), span)) => {
                    self.done = true;
                    return Some(Err(LexError {
                        fragment: self.source[span.clone()].to_string(),
                        span,
                    }));
                }
            }
        }
    }
}

/// Lex template source into structural tokens
pub fn lex(input: &str) -> MarkupLexer<'_> {
    MarkupLexer::new(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<MarkupToken> {
        lex(input)
            .map(|r| r.expect("should lex").0)
            .collect()
    }

    fn content(s: &str) -> MarkupToken {
        MarkupToken::Content(s.to_string())
    }

    #[test]
    fn test_plain_text_is_one_token() {
        assert_eq!(tokens("Hello, {world} 100% #1"), vec![content("Hello, {world} 100% #1")]);
    }

    #[test]
    fn test_var_content_is_trimmed() {
        assert_eq!(
            tokens("a {{  x + 1  }} b"),
            vec![
                content("a "),
                MarkupToken::VarStart,
                content("x + 1"),
                MarkupToken::VarEnd,
                content(" b"),
            ]
        );
    }

    #[test]
    fn test_tag_keywords() {
        assert_eq!(
            tokens("{% if a %}x{% else %}y{% endif %}"),
            vec![
                MarkupToken::TagStart,
                MarkupToken::If,
                content("a"),
                MarkupToken::TagEnd,
                content("x"),
                MarkupToken::TagStart,
                MarkupToken::Else,
                MarkupToken::TagEnd,
                content("y"),
                MarkupToken::TagStart,
                MarkupToken::EndIf,
                MarkupToken::TagEnd,
            ]
        );
    }

    #[test]
    fn test_for_and_empty_keywords() {
        assert_eq!(
            tokens("{%for a in b%}{%empty%}{%endfor%}"),
            vec![
                MarkupToken::TagStart,
                MarkupToken::For,
                content("a in b"),
                MarkupToken::TagEnd,
                MarkupToken::TagStart,
                MarkupToken::Empty,
                MarkupToken::TagEnd,
                MarkupToken::TagStart,
                MarkupToken::EndFor,
                MarkupToken::TagEnd,
            ]
        );
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        assert_eq!(
            tokens("{% iffy x %}"),
            vec![MarkupToken::TagStart, content("iffy x"), MarkupToken::TagEnd]
        );
    }

    #[test]
    fn test_keywords_only_lead_tags() {
        assert_eq!(
            tokens("{{ if }}"),
            vec![MarkupToken::VarStart, content("if"), MarkupToken::VarEnd]
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(
            tokens("a{# note #}b"),
            vec![
                content("a"),
                MarkupToken::CommentStart,
                content("note"),
                MarkupToken::CommentEnd,
                content("b"),
            ]
        );
    }

    #[test]
    fn test_content_spans_point_at_trimmed_text() {
        let toks: Vec<_> = lex("{% for  x in y %}").map(|r| r.unwrap()).collect();
        assert_eq!(toks[1], (MarkupToken::For, 3..6));
        assert_eq!(toks[2], (content("x in y"), 8..14));
    }

    #[test]
    fn test_triple_brace() {
        assert_eq!(
            tokens("{{{ x }}"),
            vec![MarkupToken::VarStart, content("{ x"), MarkupToken::VarEnd]
        );
    }
}
