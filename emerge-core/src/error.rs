use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::ParsingMismatch;
use crate::span::Span;

/// Malformed grammar definitions. These surface while the grammar is
/// built, before any input is matched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("either-of rule {rule} has no alternatives")]
    EmptyEitherOf { rule: String },
    #[error("repeating rule {rule} has lower bound {min} above upper bound {max}")]
    InvalidRepetitionBounds { rule: String, min: u32, max: u32 },
    #[error("rule {name} was declared but never defined")]
    UndefinedReference { name: String },
    #[error("rule {name} is defined more than once")]
    AlreadyDefined { name: String },
    #[error("rule {name} was not created by declare and cannot be defined")]
    NotAReference { name: String },
    #[error("rule {rule} can reach itself without consuming a token")]
    LeftRecursion { rule: String },
}

/// A successful match whose value could not be turned into the
/// requested shape. This is a mismatch between a grammar and the code
/// that builds values from it, never a problem with the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("expected {expected} while building {building}, found {found}")]
    UnexpectedItem {
        building: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("missing {expected} while building {building}")]
    MissingItem {
        building: &'static str,
        expected: &'static str,
    },
    #[error("rule produced a value that is not a {expected}")]
    UnexpectedValue { expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {span}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("invalid grammar: {0}")]
    Grammar(#[from] GrammarError),
    #[error("internal error: {0}")]
    Transform(#[from] TransformError),
    #[error("{0}")]
    Mismatch(ParsingMismatch),
}
