//! Splitting of raw tag arguments into whitespace separated words
//!
//! Quotes and parentheses group words: `url page words="a b" (1 + 2)`
//! yields four words. A backslash escapes the next character; both are kept
//! verbatim in the output.

use std::fmt;

use thiserror::Error;

/// Which quote character was left open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Double,
    Single,
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteKind::Double => f.write_str("double"),
            QuoteKind::Single => f.write_str("single"),
        }
    }
}

/// How parentheses failed to balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParenImbalance {
    /// Input ended with this many parentheses still open
    Unclosed(usize),
    /// A `)` at this byte offset had no matching `(`
    Unopened { offset: usize },
}

impl fmt::Display for ParenImbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParenImbalance::Unclosed(open) => {
                write!(f, "unclosed parenthesis ({} still open)", open)
            }
            ParenImbalance::Unopened { offset } => {
                write!(f, "closing parenthesis at offset {} was never opened", offset)
            }
        }
    }
}

/// Errors from [`split_tag_args`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("unclosed {quote} quote in `{input}`")]
    UnbalancedQuote { quote: QuoteKind, input: String },

    #[error("{imbalance} in `{input}`")]
    UnbalancedParen {
        imbalance: ParenImbalance,
        input: String,
    },

    #[error("dangling escape at the end of `{input}`")]
    DanglingEscape { input: String },
}

/// A word of the tag arguments with its byte offset in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagArg {
    pub offset: usize,
    pub text: String,
}

#[derive(Default)]
struct SplitState {
    escaped: bool,
    double: bool,
    single: bool,
    parens: usize,
}

impl SplitState {
    fn quoted(&self) -> bool {
        self.double || self.single
    }
}

/// Split tag arguments, keeping the offset of every word
pub fn split_tag_args_spanned(s: &str) -> Result<Vec<TagArg>, SplitError> {
    let mut args = Vec::new();
    let mut current: Option<TagArg> = None;
    let mut state = SplitState::default();

    let push = |current: &mut Option<TagArg>, offset: usize, text: &str| {
        current
            .get_or_insert_with(|| TagArg {
                offset,
                text: String::new(),
            })
            .text
            .push_str(text);
    };

    for (i, c) in s.char_indices() {
        if state.escaped {
            state.escaped = false;
            let mut buf = [0u8; 4];
            push(&mut current, i - 1, "\\");
            push(&mut current, i, c.encode_utf8(&mut buf));
            continue;
        }

        match c {
            '"' if !state.single => state.double = !state.double,
            '\'' if !state.double => state.single = !state.single,
            '(' if !state.quoted() => state.parens += 1,
            ')' if !state.quoted() => {
                if state.parens == 0 {
                    return Err(SplitError::UnbalancedParen {
                        imbalance: ParenImbalance::Unopened { offset: i },
                        input: s.to_string(),
                    });
                }
                state.parens -= 1;
            }
            '\\' => {
                state.escaped = true;
                continue;
            }
            c if c.is_whitespace() && !state.quoted() && state.parens == 0 => {
                args.extend(current.take());
                continue;
            }
            _ => {}
        }
        let mut buf = [0u8; 4];
        push(&mut current, i, c.encode_utf8(&mut buf));
    }

    if state.double {
        return Err(SplitError::UnbalancedQuote {
            quote: QuoteKind::Double,
            input: s.to_string(),
        });
    }
    if state.single {
        return Err(SplitError::UnbalancedQuote {
            quote: QuoteKind::Single,
            input: s.to_string(),
        });
    }
    if state.parens > 0 {
        return Err(SplitError::UnbalancedParen {
            imbalance: ParenImbalance::Unclosed(state.parens),
            input: s.to_string(),
        });
    }
    if state.escaped {
        return Err(SplitError::DanglingEscape {
            input: s.to_string(),
        });
    }

    args.extend(current);
    Ok(args)
}

/// Split tag arguments into words
pub fn split_tag_args(s: &str) -> Result<Vec<String>, SplitError> {
    Ok(split_tag_args_spanned(s)?
        .into_iter()
        .map(|arg| arg.text)
        .collect())
}
