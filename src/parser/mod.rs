//! Template parsers: structure, expressions and tag arguments

pub mod args;
pub mod ast;
mod grammar;
pub mod lexer;
pub mod markup;
pub mod source;
mod structure;

pub use args::{split_tag_args, split_tag_args_spanned, SplitError, TagArg};
pub use ast::*;
pub use grammar::{parse_expr, parse_expression};
pub use source::{Location, SourceMap};
pub use structure::parse_document;
