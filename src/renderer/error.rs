//! Error types for rendering

use thiserror::Error;

use crate::error::report;
use crate::parser::ast::Span;
use crate::parser::source::{Location, SourceMap};
use crate::value::HostError;

/// Errors that abort a render
///
/// Partial output is discarded; a render either returns the whole text or
/// one of these.
#[derive(Debug, Error)]
pub enum EvalError {
    /// No filter registered under this name
    #[error("unknown filter '{name}' at {location}{}", ambiguity_hint(*ambiguous))]
    UnknownFilter {
        name: String,
        ambiguous: bool,
        span: Span,
        location: Location,
    },

    /// No tag registered under this name
    #[error("unknown tag '{name}' at {location}{}", ambiguity_hint(*ambiguous))]
    UnknownTag {
        name: String,
        ambiguous: bool,
        span: Span,
        location: Location,
    },

    #[error("undefined name '{name}' at {location}")]
    UndefinedName {
        name: String,
        span: Span,
        location: Location,
    },

    #[error("{kind} value has no attribute '{attr}' at {location}")]
    Attribute {
        kind: String,
        attr: String,
        span: Span,
        location: Location,
    },

    #[error("index {index} out of range for {kind} of length {len} at {location}")]
    Index {
        kind: String,
        index: i64,
        len: usize,
        span: Span,
        location: Location,
    },

    #[error("key {key} not found at {location}")]
    Key {
        key: String,
        span: Span,
        location: Location,
    },

    /// Operation not supported by the operand kinds
    #[error("type error at {location}: {message}")]
    Type {
        message: String,
        span: Span,
        location: Location,
    },

    /// Division by zero or integer overflow
    #[error("arithmetic error at {location}: {message}")]
    Arithmetic {
        message: String,
        span: Span,
        location: Location,
    },

    /// Host code raised an error
    #[error("call to '{callee}' failed at {location}: {source}")]
    Call {
        callee: String,
        #[source]
        source: HostError,
        span: Span,
        location: Location,
    },
}

fn ambiguity_hint(ambiguous: bool) -> &'static str {
    if ambiguous {
        " (the short name is ambiguous, use the qualified name)"
    } else {
        ""
    }
}

impl EvalError {
    pub fn undefined(name: impl Into<String>, span: Span, map: &SourceMap) -> Self {
        Self::UndefinedName {
            name: name.into(),
            location: map.locate(span.start),
            span,
        }
    }

    pub fn type_error(message: impl Into<String>, span: Span, map: &SourceMap) -> Self {
        Self::Type {
            message: message.into(),
            location: map.locate(span.start),
            span,
        }
    }

    pub fn arithmetic(message: impl Into<String>, span: Span, map: &SourceMap) -> Self {
        Self::Arithmetic {
            message: message.into(),
            location: map.locate(span.start),
            span,
        }
    }

    pub fn call(callee: impl Into<String>, source: HostError, span: Span, map: &SourceMap) -> Self {
        Self::Call {
            callee: callee.into(),
            source,
            location: map.locate(span.start),
            span,
        }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> &Span {
        match self {
            Self::UnknownFilter { span, .. }
            | Self::UnknownTag { span, .. }
            | Self::UndefinedName { span, .. }
            | Self::Attribute { span, .. }
            | Self::Index { span, .. }
            | Self::Key { span, .. }
            | Self::Type { span, .. }
            | Self::Arithmetic { span, .. }
            | Self::Call { span, .. } => span,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Self::UnknownFilter { location, .. }
            | Self::UnknownTag { location, .. }
            | Self::UndefinedName { location, .. }
            | Self::Attribute { location, .. }
            | Self::Index { location, .. }
            | Self::Key { location, .. }
            | Self::Type { location, .. }
            | Self::Arithmetic { location, .. }
            | Self::Call { location, .. } => *location,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let message = match self {
            Self::UnknownFilter { name, ambiguous, .. } => {
                format!("unknown filter '{}'{}", name, ambiguity_hint(*ambiguous))
            }
            Self::UnknownTag { name, ambiguous, .. } => {
                format!("unknown tag '{}'{}", name, ambiguity_hint(*ambiguous))
            }
            Self::UndefinedName { name, .. } => format!("undefined name '{}'", name),
            Self::Attribute { kind, attr, .. } => {
                format!("{} value has no attribute '{}'", kind, attr)
            }
            Self::Index {
                kind, index, len, ..
            } => format!("index {} out of range for {} of length {}", index, kind, len),
            Self::Key { key, .. } => format!("key {} not found", key),
            Self::Type { message, .. } | Self::Arithmetic { message, .. } => message.clone(),
            Self::Call { callee, source, .. } => format!("call to '{}' failed: {}", callee, source),
        };
        report(source, filename, self.span(), &message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let map = SourceMap::new("{{ a|f }}");
        let err = EvalError::UnknownFilter {
            name: "f".to_string(),
            ambiguous: true,
            span: 5..6,
            location: map.locate(5),
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"unknown filter 'f' at line 1, column 6 (the short name is ambiguous, use the qualified name)"
        );

        let err = EvalError::undefined("user", 3..7, &map);
        assert_eq!(err.to_string(), "undefined name 'user' at line 1, column 4");
        assert_eq!(err.span(), &(3..7));
    }

    #[test]
    fn test_call_error_keeps_source() {
        use std::error::Error as _;

        let map = SourceMap::new("{{ f() }}");
        let err = EvalError::call("f", "boom".into(), 3..6, &map);
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
        assert!(err.format("{{ f() }}", "t.html").contains("boom"));
    }
}
