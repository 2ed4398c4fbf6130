//! Front end of the emerge language toolchain.
//!
//! The heart of this crate is a grammar-matching engine: grammars are
//! graphs of parser combinators built with a small DSL, and a matcher
//! consumes one token at a time, keeping every parse path that is still
//! possible alive until the input decides between them. The pipeline is
//! roughly:
//!
//!   source .em
//!     -> lexer    (tokens)
//!     -> matcher  (driven by the source-file grammar)
//!     -> ast      (built by the grammar's transformations)
//!
//! Higher-level tools (the CLI) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Tokens and lexing
// ---------------------------------------------------------------------

pub mod token;
pub mod lexer;

// ---------------------------------------------------------------------
// Grammar graph and its construction DSL
// ---------------------------------------------------------------------

pub mod expected;
pub mod rule;
pub mod dsl;
pub mod value;
mod analysis;

// ---------------------------------------------------------------------
// Matching engine
// ---------------------------------------------------------------------

pub mod context;
pub mod matcher;

// ---------------------------------------------------------------------
// Source files: grammar, syntax tree and discovery
// ---------------------------------------------------------------------

pub mod ast;
pub mod grammar;
pub mod parser;
pub mod source;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use context::{MatchingContext, Resolution};
pub use diagnostic::ParsingMismatch;
pub use dsl::RuleCollector;
pub use error::{FrontendError, GrammarError, LexError, TransformError};
pub use expected::{Expected, ExpectedToken};
pub use grammar::SourceGrammar;
pub use lexer::lex;
pub use matcher::{Matcher, MatchingResult, match_tokens};
pub use parser::parse_source;
pub use rule::{Grammar, GrammarBuilder, Rule, RuleId};
pub use span::Span;
pub use token::{Keyword, Operator, Token, TokenKind};
pub use value::{Items, RuleValue, Value};
