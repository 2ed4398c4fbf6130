//! Semantic values produced by successful matches.
//!
//! The grammar graph is untyped internally: every rule yields a
//! [`Value`]. Typed [`Rule`](crate::rule::Rule) handles convert to and
//! from `Value` at their boundary through [`RuleValue`].

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::TransformError;
use crate::token::{Keyword, Operator, Token};

#[derive(Clone)]
pub enum Value {
    Token(Token),
    /// One value per element of a sequence rule.
    Sequence(Vec<Value>),
    /// One value per repetition of a repeating rule.
    Repeated(Vec<Value>),
    /// Output of `flatten`: tokens and nodes in source order.
    Items(Vec<Value>),
    /// Anything built by a transformation, typically an AST node.
    Node(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn node<T: Any + Send + Sync>(node: T) -> Self {
        Value::Node(Arc::new(node))
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Value::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_token(self) -> Option<Token> {
        match self {
            Value::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Node(node) => node.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Collects all tokens and nodes in source order, dissolving
    /// sequences and repetitions. End-of-input tokens are dropped.
    pub fn flatten(self) -> Vec<Value> {
        let mut items = Vec::new();
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                Value::Token(token) if token.is_end_of_input() => {}
                Value::Sequence(values) | Value::Repeated(values) | Value::Items(values) => {
                    stack.extend(values.into_iter().rev());
                }
                other => items.push(other),
            }
        }
        items
    }

    fn describe(&self) -> String {
        match self {
            Value::Token(token) => token.to_string(),
            Value::Sequence(_) => "sequence".into(),
            Value::Repeated(_) => "repetition".into(),
            Value::Items(_) => "items".into(),
            Value::Node(_) => "node".into(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Token(token) => f.debug_tuple("Token").field(&token.kind).finish(),
            Value::Sequence(values) => f.debug_tuple("Sequence").field(values).finish(),
            Value::Repeated(values) => f.debug_tuple("Repeated").field(values).finish(),
            Value::Items(values) => f.debug_tuple("Items").field(values).finish(),
            Value::Node(_) => f.write_str("Node(..)"),
        }
    }
}

/// Types a typed rule handle can yield.
///
/// [`Token`], [`Value`] and `Vec<Value>` map onto the matching `Value`
/// variants; every other type travels as a [`Value::Node`].
pub trait RuleValue: Any + Send + Sync + Clone {}

impl<T: Any + Send + Sync + Clone> RuleValue for T {}

pub(crate) fn into_value<T: RuleValue>(value: T) -> Value {
    let any: Box<dyn Any + Send + Sync> = Box::new(value);
    let any = match any.downcast::<Value>() {
        Ok(value) => return *value,
        Err(any) => any,
    };
    let any = match any.downcast::<Token>() {
        Ok(token) => return Value::Token(*token),
        Err(any) => any,
    };
    match any.downcast::<Vec<Value>>() {
        Ok(items) => Value::Items(*items),
        Err(any) => Value::Node(Arc::from(any)),
    }
}

pub(crate) fn from_value<T: RuleValue>(value: Value) -> Result<T, TransformError> {
    let unexpected = TransformError::UnexpectedValue {
        expected: type_name::<T>(),
    };
    let any: Box<dyn Any> = if is::<T, Value>() {
        Box::new(value)
    } else if is::<T, Vec<Value>>() {
        match value {
            Value::Items(items) => Box::new(items),
            other => Box::new(other.flatten()),
        }
    } else {
        match value {
            Value::Node(node) => {
                return node
                    .downcast::<T>()
                    .map(Arc::unwrap_or_clone)
                    .map_err(|_| unexpected);
            }
            Value::Token(token) => Box::new(token),
            other => Box::new(other),
        }
    };
    any.downcast::<T>().map(|value| *value).map_err(|_| unexpected)
}

fn is<T: Any, U: Any>() -> bool {
    std::any::TypeId::of::<T>() == std::any::TypeId::of::<U>()
}

/// Cursor over the flattened items handed to an `ast_transformation`.
#[derive(Debug)]
pub struct Items {
    building: &'static str,
    items: std::iter::Peekable<std::vec::IntoIter<Value>>,
}

impl Items {
    pub(crate) fn new(building: &'static str, items: Vec<Value>) -> Self {
        Items {
            building,
            items: items.into_iter().peekable(),
        }
    }

    pub fn has_next(&mut self) -> bool {
        self.items.peek().is_some()
    }

    pub fn peek(&mut self) -> Option<&Value> {
        self.items.peek()
    }

    pub fn remaining(&mut self) -> Vec<Value> {
        self.items.by_ref().collect()
    }

    pub fn next_value(&mut self) -> Result<Value, TransformError> {
        self.items.next().ok_or(TransformError::MissingItem {
            building: self.building,
            expected: "any item",
        })
    }

    pub fn next_token(&mut self) -> Result<Token, TransformError> {
        match self.items.next() {
            Some(Value::Token(token)) => Ok(token),
            Some(other) => Err(self.unexpected("token", &other)),
            None => Err(self.missing("token")),
        }
    }

    pub fn next_identifier(&mut self) -> Result<Token, TransformError> {
        let token = self.next_token()?;
        if token.as_identifier().is_some() {
            Ok(token)
        } else {
            Err(self.unexpected("identifier", &Value::Token(token)))
        }
    }

    pub fn next_keyword(&mut self, keyword: Keyword) -> Result<Token, TransformError> {
        let token = self.next_token()?;
        if token.as_keyword() == Some(keyword) {
            Ok(token)
        } else {
            Err(self.unexpected("keyword", &Value::Token(token)))
        }
    }

    pub fn next_operator(&mut self, operator: Operator) -> Result<Token, TransformError> {
        let token = self.next_token()?;
        if token.as_operator() == Some(operator) {
            Ok(token)
        } else {
            Err(self.unexpected("operator", &Value::Token(token)))
        }
    }

    /// The next item as an operator, whichever it is.
    pub fn next_any_operator(&mut self) -> Result<Operator, TransformError> {
        let token = self.next_token()?;
        match token.as_operator() {
            Some(operator) => Ok(operator),
            None => Err(self.unexpected("operator", &Value::Token(token))),
        }
    }

    /// Consumes the next item if it is the given operator.
    pub fn skip_operator(&mut self, operator: Operator) -> bool {
        let matches = matches!(
            self.items.peek(),
            Some(Value::Token(token)) if token.as_operator() == Some(operator)
        );
        if matches {
            self.items.next();
        }
        matches
    }

    pub fn next_if_keyword(&mut self, keyword: Keyword) -> Option<Token> {
        match self.items.peek() {
            Some(Value::Token(token)) if token.as_keyword() == Some(keyword) => {
                self.items.next().and_then(Value::into_token)
            }
            _ => None,
        }
    }

    pub fn next_node<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>, TransformError> {
        match self.items.next() {
            Some(Value::Node(node)) => node.downcast::<T>().map_err(|_| {
                TransformError::UnexpectedItem {
                    building: self.building,
                    expected: type_name::<T>(),
                    found: "another node".into(),
                }
            }),
            Some(other) => Err(self.unexpected(type_name::<T>(), &other)),
            None => Err(self.missing(type_name::<T>())),
        }
    }

    /// Takes the next item only if it is a node of type `T`.
    pub fn next_node_if<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        let is_t = matches!(self.items.peek(), Some(value) if value.downcast_ref::<T>().is_some());
        if !is_t {
            return None;
        }
        match self.items.next() {
            Some(Value::Node(node)) => node.downcast::<T>().ok(),
            _ => None,
        }
    }

    fn unexpected(&self, expected: &'static str, found: &Value) -> TransformError {
        TransformError::UnexpectedItem {
            building: self.building,
            expected,
            found: found.describe(),
        }
    }

    fn missing(&self, expected: &'static str) -> TransformError {
        TransformError::MissingItem {
            building: self.building,
            expected,
        }
    }
}
