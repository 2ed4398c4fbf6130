//! Descriptions of what may legally appear next in the input.

use std::fmt;

use crate::rule::RuleId;
use crate::token::{Keyword, Operator, Token, TokenKind};

/// A predicate over a single [`Token`] together with a human readable
/// description of it, e.g. "keyword if" or "identifier".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpectedToken {
    Keyword(Keyword),
    Operator(Operator),
    /// Any identifier. Some keywords and operators may additionally be
    /// accepted in identifier position (soft keywords, `*` in imports).
    Identifier {
        accepted_keywords: Vec<Keyword>,
        accepted_operators: Vec<Operator>,
    },
    /// An identifier with exactly this text.
    LocalKeyword(String),
    NumericLiteral,
    StringLiteralContent,
    EndOfInput,
}

impl ExpectedToken {
    pub fn identifier() -> Self {
        ExpectedToken::Identifier {
            accepted_keywords: Vec::new(),
            accepted_operators: Vec::new(),
        }
    }

    pub fn matches(&self, token: &Token) -> bool {
        match (self, &token.kind) {
            (ExpectedToken::Keyword(expected), TokenKind::Keyword(actual)) => expected == actual,
            (ExpectedToken::Operator(expected), TokenKind::Operator(actual)) => expected == actual,
            (ExpectedToken::Identifier { .. }, TokenKind::Identifier(_)) => true,
            (
                ExpectedToken::Identifier {
                    accepted_keywords, ..
                },
                TokenKind::Keyword(keyword),
            ) => accepted_keywords.contains(keyword),
            (
                ExpectedToken::Identifier {
                    accepted_operators, ..
                },
                TokenKind::Operator(operator),
            ) => accepted_operators.contains(operator),
            (ExpectedToken::LocalKeyword(text), TokenKind::Identifier(name)) => text == name,
            (ExpectedToken::NumericLiteral, TokenKind::NumericLiteral(_)) => true,
            (ExpectedToken::StringLiteralContent, TokenKind::StringLiteralContent(_)) => true,
            (ExpectedToken::EndOfInput, TokenKind::EndOfInput) => true,
            _ => false,
        }
    }

    /// Whether some token exists that both `self` and `other` accept.
    /// The relation is symmetric.
    pub fn could_match_same_token_as(&self, other: &ExpectedToken) -> bool {
        use ExpectedToken as E;
        match (self, other) {
            (E::Keyword(a), E::Keyword(b)) => a == b,
            (E::Operator(a), E::Operator(b)) => a == b,
            (E::Identifier { .. }, E::Identifier { .. }) => true,
            (E::Identifier { .. }, E::LocalKeyword(_)) | (E::LocalKeyword(_), E::Identifier { .. }) => {
                true
            }
            (E::Identifier { accepted_keywords, .. }, E::Keyword(keyword))
            | (E::Keyword(keyword), E::Identifier { accepted_keywords, .. }) => {
                accepted_keywords.contains(keyword)
            }
            (E::Identifier { accepted_operators, .. }, E::Operator(operator))
            | (E::Operator(operator), E::Identifier { accepted_operators, .. }) => {
                accepted_operators.contains(operator)
            }
            (E::LocalKeyword(a), E::LocalKeyword(b)) => a == b,
            (E::NumericLiteral, E::NumericLiteral) => true,
            (E::StringLiteralContent, E::StringLiteralContent) => true,
            (E::EndOfInput, E::EndOfInput) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExpectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedToken::Keyword(keyword) => keyword.fmt(f),
            ExpectedToken::Operator(operator) => operator.fmt(f),
            ExpectedToken::Identifier { .. } => f.write_str("identifier"),
            ExpectedToken::LocalKeyword(text) => write!(f, "identifier {text}"),
            ExpectedToken::NumericLiteral => f.write_str("numeric literal"),
            ExpectedToken::StringLiteralContent => f.write_str("string"),
            ExpectedToken::EndOfInput => f.write_str("end of input"),
        }
    }
}

/// An [`ExpectedToken`] tagged with the terminal rule occurrence it
/// stems from. Two of them are clones when they were reached through
/// different routes but name the same terminal in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    pub origin: RuleId,
    pub token: ExpectedToken,
}

impl Expected {
    /// Implies [`Expected::could_match_same_token_as`].
    pub fn is_clone_of(&self, other: &Expected) -> bool {
        self.origin == other.origin
    }

    pub fn could_match_same_token_as(&self, other: &Expected) -> bool {
        self.is_clone_of(other) || self.token.could_match_same_token_as(&other.token)
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.token.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keywords_and_identifiers() {
        let expected = ExpectedToken::Keyword(Keyword::If);
        assert!(expected.matches(&Token::keyword(Keyword::If)));
        assert!(!expected.matches(&Token::keyword(Keyword::Else)));
        assert!(!expected.matches(&Token::identifier("if")));

        assert!(ExpectedToken::identifier().matches(&Token::identifier("foo")));
        assert!(!ExpectedToken::identifier().matches(&Token::keyword(Keyword::In)));
        assert!(ExpectedToken::LocalKeyword("b".into()).matches(&Token::identifier("b")));
        assert!(!ExpectedToken::LocalKeyword("b".into()).matches(&Token::identifier("c")));
    }

    #[test]
    fn identifier_can_accept_soft_keywords_and_operators() {
        let expected = ExpectedToken::Identifier {
            accepted_keywords: vec![Keyword::In],
            accepted_operators: vec![Operator::Times],
        };
        assert!(expected.matches(&Token::keyword(Keyword::In)));
        assert!(expected.matches(&Token::operator(Operator::Times)));
        assert!(!expected.matches(&Token::operator(Operator::Plus)));
        assert!(expected.could_match_same_token_as(&ExpectedToken::Operator(Operator::Times)));
        assert!(ExpectedToken::Keyword(Keyword::In).could_match_same_token_as(&expected));
    }

    #[test]
    fn overlap_is_symmetric() {
        let all = [
            ExpectedToken::Keyword(Keyword::If),
            ExpectedToken::Keyword(Keyword::Else),
            ExpectedToken::Operator(Operator::Dot),
            ExpectedToken::identifier(),
            ExpectedToken::LocalKeyword("x".into()),
            ExpectedToken::LocalKeyword("y".into()),
            ExpectedToken::NumericLiteral,
            ExpectedToken::StringLiteralContent,
            ExpectedToken::EndOfInput,
        ];
        for a in &all {
            for b in &all {
                assert_eq!(
                    a.could_match_same_token_as(b),
                    b.could_match_same_token_as(a),
                    "{a} vs {b}"
                );
            }
        }
        assert!(!ExpectedToken::LocalKeyword("x".into())
            .could_match_same_token_as(&ExpectedToken::LocalKeyword("y".into())));
        assert!(ExpectedToken::identifier()
            .could_match_same_token_as(&ExpectedToken::LocalKeyword("y".into())));
    }

    #[test]
    fn clones_share_their_origin() {
        let a = Expected {
            origin: RuleId(3),
            token: ExpectedToken::Keyword(Keyword::If),
        };
        let b = Expected {
            origin: RuleId(3),
            token: ExpectedToken::Keyword(Keyword::If),
        };
        let c = Expected {
            origin: RuleId(4),
            token: ExpectedToken::Keyword(Keyword::If),
        };
        assert!(a.is_clone_of(&b));
        assert!(!a.is_clone_of(&c));
        assert!(a.could_match_same_token_as(&c));
    }

    #[test]
    fn describes_expectations() {
        assert_eq!(ExpectedToken::Keyword(Keyword::Export).to_string(), "keyword export");
        assert_eq!(ExpectedToken::identifier().to_string(), "identifier");
        assert_eq!(ExpectedToken::LocalKeyword("d".into()).to_string(), "identifier d");
        assert_eq!(ExpectedToken::EndOfInput.to_string(), "end of input");
    }
}
