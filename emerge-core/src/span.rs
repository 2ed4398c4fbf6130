//! Source locations attached to tokens and diagnostics.

use std::fmt;
use std::sync::Arc;

/// A range in a source file, with 1-based lines and columns.
///
/// The end position is inclusive of the last character, so a
/// single-character token has `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: Arc<str>,
    pub from_line: u32,
    pub from_column: u32,
    pub to_line: u32,
    pub to_column: u32,
}

impl Span {
    pub fn new(
        file: Arc<str>,
        from_line: u32,
        from_column: u32,
        to_line: u32,
        to_column: u32,
    ) -> Self {
        Span {
            file,
            from_line,
            from_column,
            to_line,
            to_column,
        }
    }

    /// Span used for tokens that do not originate from a source file,
    /// e.g. tokens built by hand in tests.
    pub fn unknown() -> Self {
        Span::new(Arc::from("<unknown>"), 0, 0, 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.from_line == 0
    }

    /// Zero-width span directly behind this one. Used to locate
    /// "unexpected end of input" reports.
    pub fn end(&self) -> Self {
        Span::new(
            self.file.clone(),
            self.to_line,
            self.to_column + 1,
            self.to_line,
            self.to_column + 1,
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "{}", self.file);
        }
        write!(f, "{}:{}:{}", self.file, self.from_line, self.from_column)
    }
}
