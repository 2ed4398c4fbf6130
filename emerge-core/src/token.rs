//! Tokens produced by the lexer and consumed by the matcher.

use std::fmt;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    Package,
    Import,
    Function,
    Var,
    Set,
    Mutable,
    ReadOnly,
    Immutable,
    Nothrow,
    Pure,
    Operator,
    Intrinsic,
    External,
    If,
    Else,
    While,
    Return,
    Throw,
    Break,
    Continue,
    Class,
    In,
    Out,
    Private,
    Module,
    Export,
}

impl Keyword {
    pub const ALL: &'static [Keyword] = &[
        Keyword::Package,
        Keyword::Import,
        Keyword::Function,
        Keyword::Var,
        Keyword::Set,
        Keyword::Mutable,
        Keyword::ReadOnly,
        Keyword::Immutable,
        Keyword::Nothrow,
        Keyword::Pure,
        Keyword::Operator,
        Keyword::Intrinsic,
        Keyword::External,
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::Return,
        Keyword::Throw,
        Keyword::Break,
        Keyword::Continue,
        Keyword::Class,
        Keyword::In,
        Keyword::Out,
        Keyword::Private,
        Keyword::Module,
        Keyword::Export,
    ];

    /// The keyword as it appears in source code.
    pub fn text(self) -> &'static str {
        match self {
            Keyword::Package => "package",
            Keyword::Import => "import",
            Keyword::Function => "fn",
            Keyword::Var => "var",
            Keyword::Set => "set",
            Keyword::Mutable => "mut",
            Keyword::ReadOnly => "read",
            Keyword::Immutable => "const",
            Keyword::Nothrow => "nothrow",
            Keyword::Pure => "pure",
            Keyword::Operator => "operator",
            Keyword::Intrinsic => "intrinsic",
            Keyword::External => "external",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Return => "return",
            Keyword::Throw => "throw",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Class => "class",
            Keyword::In => "in",
            Keyword::Out => "out",
            Keyword::Private => "private",
            Keyword::Module => "module",
            Keyword::Export => "export",
        }
    }

    pub fn from_text(text: &str) -> Option<Keyword> {
        Keyword::ALL.iter().copied().find(|k| k.text() == text)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyword {}", self.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    ParenOpen,
    ParenClose,
    CurlyOpen,
    CurlyClose,
    SquareOpen,
    SquareClose,
    Dot,
    SafeDot,
    Times,
    Comma,
    Semicolon,
    Colon,
    Returns,
    Plus,
    Minus,
    Divide,
    IdentityEq,
    IdentityNeq,
    Equals,
    NotEquals,
    Assignment,
    GreaterThanOrEquals,
    LessThanOrEquals,
    GreaterThan,
    LessThan,
    Elvis,
    QuestionMark,
    NotNull,
    ExclamationMark,
    StringDelimiter,
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Operator::ParenOpen,
        Operator::ParenClose,
        Operator::CurlyOpen,
        Operator::CurlyClose,
        Operator::SquareOpen,
        Operator::SquareClose,
        Operator::Dot,
        Operator::SafeDot,
        Operator::Times,
        Operator::Comma,
        Operator::Semicolon,
        Operator::Colon,
        Operator::Returns,
        Operator::Plus,
        Operator::Minus,
        Operator::Divide,
        Operator::IdentityEq,
        Operator::IdentityNeq,
        Operator::Equals,
        Operator::NotEquals,
        Operator::Assignment,
        Operator::GreaterThanOrEquals,
        Operator::LessThanOrEquals,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::Elvis,
        Operator::QuestionMark,
        Operator::NotNull,
        Operator::ExclamationMark,
        Operator::StringDelimiter,
    ];

    pub fn text(self) -> &'static str {
        match self {
            Operator::ParenOpen => "(",
            Operator::ParenClose => ")",
            Operator::CurlyOpen => "{",
            Operator::CurlyClose => "}",
            Operator::SquareOpen => "[",
            Operator::SquareClose => "]",
            Operator::Dot => ".",
            Operator::SafeDot => "?.",
            Operator::Times => "*",
            Operator::Comma => ",",
            Operator::Semicolon => ";",
            Operator::Colon => ":",
            Operator::Returns => "->",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Divide => "/",
            Operator::IdentityEq => "===",
            Operator::IdentityNeq => "!==",
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::Assignment => "=",
            Operator::GreaterThanOrEquals => ">=",
            Operator::LessThanOrEquals => "<=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Elvis => "?:",
            Operator::QuestionMark => "?",
            Operator::NotNull => "!!",
            Operator::ExclamationMark => "!",
            Operator::StringDelimiter => "\"",
        }
    }

    fn human_readable_name(self) -> Option<&'static str> {
        match self {
            Operator::ParenOpen => Some("opening parenthesis"),
            Operator::ParenClose => Some("closing parenthesis"),
            Operator::CurlyOpen => Some("opening curly brace"),
            Operator::CurlyClose => Some("closing curly brace"),
            Operator::SquareOpen => Some("opening square brace"),
            Operator::SquareClose => Some("closing square brace"),
            Operator::Dot => Some("dot"),
            Operator::Comma => Some("comma"),
            Operator::Colon => Some("colon"),
            Operator::Elvis => Some("elvis operator"),
            Operator::ExclamationMark => Some("exclamation mark"),
            Operator::StringDelimiter => Some("string delimiter"),
            _ => None,
        }
    }

    /// Operators ordered so that no operator precedes another operator
    /// it is a prefix of. The lexer tries them in this order.
    pub fn sorted_for_lexing() -> Vec<Operator> {
        let mut operators = Operator::ALL.to_vec();
        operators.sort_by_key(|op| std::cmp::Reverse(op.text().len()));
        operators
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.human_readable_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "operator {}", self.text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword(Keyword),
    Operator(Operator),
    Identifier(String),
    NumericLiteral(String),
    /// String contents without the delimiters; the delimiters are
    /// separate operator tokens.
    StringLiteralContent(String),
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(keyword) => keyword.fmt(f),
            TokenKind::Operator(operator) => operator.fmt(f),
            TokenKind::Identifier(name) => write!(f, "identifier {name}"),
            TokenKind::NumericLiteral(_) => f.write_str("numeric literal"),
            TokenKind::StringLiteralContent(_) => f.write_str("string"),
            TokenKind::EndOfInput => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    pub fn keyword(keyword: Keyword) -> Self {
        Token::new(TokenKind::Keyword(keyword), Span::unknown())
    }

    pub fn operator(operator: Operator) -> Self {
        Token::new(TokenKind::Operator(operator), Span::unknown())
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Token::new(TokenKind::Identifier(name.into()), Span::unknown())
    }

    pub fn end_of_input(span: Span) -> Self {
        Token::new(TokenKind::EndOfInput, span)
    }

    pub fn is_end_of_input(&self) -> bool {
        matches!(self.kind, TokenKind::EndOfInput)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<Operator> {
        match self.kind {
            TokenKind::Operator(operator) => Some(operator),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
