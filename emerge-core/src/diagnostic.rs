//! Mismatch reports produced when no parse path can accept a token.

use std::fmt;

use crate::span::Span;
use crate::token::Token;

/// The token at which matching failed together with everything that
/// would have been accepted there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingMismatch {
    /// Descriptions of acceptable tokens, without duplicates, in the
    /// order the dying paths were declared.
    pub expected_alternatives: Vec<String>,
    pub actual: Token,
    pub span: Span,
    /// Whether more than one parse path was live right before `actual`.
    pub is_ambiguous: bool,
    pub hint: Option<String>,
}

impl ParsingMismatch {
    pub fn new(
        expected: impl IntoIterator<Item = String>,
        actual: Token,
        is_ambiguous: bool,
    ) -> Self {
        let mut mismatch = ParsingMismatch {
            expected_alternatives: Vec::new(),
            span: actual.span.clone(),
            actual,
            is_ambiguous,
            hint: None,
        };
        for description in expected {
            mismatch.add_expected(description);
        }
        mismatch
    }

    fn add_expected(&mut self, description: String) {
        if !self.expected_alternatives.contains(&description) {
            self.expected_alternatives.push(description);
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn expects(&self, description: &str) -> bool {
        self.expected_alternatives.iter().any(|e| e == description)
    }

    /// Combines two reports about the same token. The first hint wins.
    pub fn merge(mut self, other: ParsingMismatch) -> Self {
        for description in other.expected_alternatives {
            self.add_expected(description);
        }
        self.is_ambiguous |= other.is_ambiguous;
        if self.hint.is_none() {
            self.hint = other.hint;
        }
        self
    }
}

impl fmt::Display for ParsingMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unexpected {}, expected ", self.actual)?;
        match self.expected_alternatives.as_slice() {
            [single] => f.write_str(single)?,
            alternatives => write!(f, "one of: {}", alternatives.join(", "))?,
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParsingMismatch {}
