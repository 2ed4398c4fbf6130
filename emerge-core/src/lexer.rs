//! Lexer for emerge source files.
//!
//! The lexer knows the keyword and operator vocabulary but nothing about
//! the grammar. String literals are split into a delimiter, the raw
//! content (escape sequences are kept verbatim) and a second delimiter,
//! so that the grammar can match them token by token.

use std::sync::Arc;

use crate::error::LexError;
use crate::span::Span;
use crate::token::{Keyword, Operator, Token, TokenKind};

/// Lex a whole source file. On success the tokens always end with an
/// end-of-input token.
pub fn lex(file: &str, source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        file: Arc::from(file),
        source,
        position: Position {
            index: 0,
            line: 1,
            column: 1,
        },
        last: (1, 0),
        operators: Operator::sorted_for_lexing(),
    };
    lexer.run()
}

#[derive(Debug, Clone, Copy)]
struct Position {
    /// Byte offset into the source.
    index: usize,
    line: u32,
    column: u32,
}

struct Lexer<'src> {
    file: Arc<str>,
    source: &'src str,
    position: Position,
    /// Line and column of the last consumed character; spans end there.
    last: (u32, u32),
    operators: Vec<Operator>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.consume_char();
                continue;
            }
            if self.rest().starts_with("//") {
                self.skip_line();
                continue;
            }

            let start = self.position;
            if ch == '"' {
                self.lex_string(start, &mut tokens)?;
                continue;
            }
            let token = if ch.is_ascii_digit() {
                self.lex_number(start)
            } else if is_ident_start(ch) {
                self.lex_ident_or_keyword(start)
            } else {
                self.lex_operator(start)?
            };
            tokens.push(token);
        }

        let Position { line, column, .. } = self.position;
        tokens.push(Token::end_of_input(Span::new(
            self.file.clone(),
            line,
            column,
            line,
            column,
        )));
        Ok(tokens)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(
            self.file.clone(),
            start.line,
            start.column,
            self.last.0,
            self.last.1,
        )
    }

    fn error(&self, message: impl Into<String>, start: Position) -> LexError {
        LexError {
            message: message.into(),
            span: self.span_from(start),
        }
    }

    fn lex_string(&mut self, start: Position, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        self.consume_char();
        tokens.push(Token::new(
            TokenKind::Operator(Operator::StringDelimiter),
            self.span_from(start),
        ));

        let content_start = self.position;
        loop {
            match self.peek_char() {
                Some('"') => break,
                Some('\\') => {
                    self.consume_char();
                    self.consume_char();
                }
                Some(_) => {
                    self.consume_char();
                }
                None => return Err(self.error("unterminated string literal", start)),
            }
        }

        let content = &self.source[content_start.index..self.position.index];
        let content_span = if content.is_empty() {
            let Position { line, column, .. } = self.position;
            Span::new(self.file.clone(), line, column, line, column)
        } else {
            self.span_from(content_start)
        };
        tokens.push(Token::new(
            TokenKind::StringLiteralContent(content.to_string()),
            content_span,
        ));

        let closing = self.position;
        self.consume_char();
        tokens.push(Token::new(
            TokenKind::Operator(Operator::StringDelimiter),
            self.span_from(closing),
        ));
        Ok(())
    }

    fn lex_number(&mut self, start: Position) -> Token {
        self.consume_digits();
        // A dot only continues the literal if a digit follows; `1.foo` is
        // a member access.
        let mut lookahead = self.rest().chars();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|ch| ch.is_ascii_digit()) {
            self.consume_char();
            self.consume_digits();
        }

        let text = &self.source[start.index..self.position.index];
        Token::new(
            TokenKind::NumericLiteral(text.to_string()),
            self.span_from(start),
        )
    }

    fn consume_digits(&mut self) {
        while self
            .peek_char()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '_')
        {
            self.consume_char();
        }
    }

    fn lex_ident_or_keyword(&mut self, start: Position) -> Token {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }

        let text = &self.source[start.index..self.position.index];
        let kind = match Keyword::from_text(text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(text.to_string()),
        };
        Token::new(kind, self.span_from(start))
    }

    fn lex_operator(&mut self, start: Position) -> Result<Token, LexError> {
        let rest = self.rest();
        let Some(operator) = self
            .operators
            .iter()
            .copied()
            .find(|operator| rest.starts_with(operator.text()))
        else {
            let ch = self.consume_char().unwrap_or_default();
            return Err(self.error(format!("unexpected character '{ch}'"), start));
        };

        for _ in 0..operator.text().len() {
            self.consume_char();
        }
        Ok(Token::new(
            TokenKind::Operator(operator),
            self.span_from(start),
        ))
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.consume_char() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn rest(&self) -> &str {
        &self.source[self.position.index..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.last = (self.position.line, self.position.column);
        self.position.index += ch.len_utf8();
        if ch == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(ch)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
