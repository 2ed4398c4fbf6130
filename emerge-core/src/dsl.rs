//! Declarative construction of grammars.
//!
//! ```
//! use emerge_core::{GrammarBuilder, Keyword, Operator};
//!
//! let mut grammar = GrammarBuilder::new();
//! let import = grammar.sequence(|s| {
//!     s.keyword(Keyword::Import);
//!     s.identifier();
//!     s.repeating(|r| {
//!         r.operator(Operator::Dot);
//!         r.identifier();
//!     });
//! });
//! let import = import.flatten(&mut grammar);
//! assert!(grammar.build().is_ok());
//! # let _ = import;
//! ```

use std::sync::Arc;

use crate::diagnostic::ParsingMismatch;
use crate::error::TransformError;
use crate::expected::ExpectedToken;
use crate::rule::{GrammarBuilder, Rule, RuleId, RuleKind};
use crate::token::{Keyword, Operator, Token};
use crate::value::{Items, RuleValue, Value, from_value, into_value};

/// Collects the sub-rules of a sequence, either-of or repetition while
/// its closure runs.
pub struct RuleCollector<'b> {
    builder: &'b mut GrammarBuilder,
    rules: Vec<RuleId>,
}

impl RuleCollector<'_> {
    fn add<T>(&mut self, rule: Rule<T>) -> &mut Self {
        self.rules.push(rule.id());
        self
    }

    pub fn keyword(&mut self, keyword: Keyword) -> &mut Self {
        let rule = self.builder.keyword(keyword);
        self.add(rule)
    }

    pub fn operator(&mut self, operator: Operator) -> &mut Self {
        let rule = self.builder.operator(operator);
        self.add(rule)
    }

    pub fn identifier(&mut self) -> &mut Self {
        let rule = self.builder.identifier();
        self.add(rule)
    }

    pub fn identifier_accepting(
        &mut self,
        keywords: &[Keyword],
        operators: &[Operator],
    ) -> &mut Self {
        let rule = self.builder.identifier_accepting(keywords, operators);
        self.add(rule)
    }

    pub fn local_keyword(&mut self, text: &str) -> &mut Self {
        let rule = self.builder.local_keyword(text);
        self.add(rule)
    }

    pub fn numeric_literal(&mut self) -> &mut Self {
        let rule = self.builder.numeric_literal();
        self.add(rule)
    }

    pub fn string_literal_content(&mut self) -> &mut Self {
        let rule = self.builder.string_literal_content();
        self.add(rule)
    }

    pub fn end_of_input(&mut self) -> &mut Self {
        let rule = self.builder.end_of_input();
        self.add(rule)
    }

    /// Uses an existing rule, typically one that was declared for
    /// recursion or built on its own and named.
    pub fn refer<T>(&mut self, rule: Rule<T>) -> &mut Self {
        self.add(rule)
    }

    pub fn sequence(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> &mut Self {
        let rule = self.builder.sequence(build);
        self.add(rule)
    }

    pub fn either_of(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> &mut Self {
        let rule = self.builder.either_of(build);
        self.add(rule)
    }

    pub fn repeating(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> &mut Self {
        let rule = self.builder.repeating(build);
        self.add(rule)
    }

    pub fn repeating_at_least_once(
        &mut self,
        build: impl FnOnce(&mut RuleCollector<'_>),
    ) -> &mut Self {
        let rule = self.builder.repeating_at_least_once(build);
        self.add(rule)
    }

    pub fn optional(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> &mut Self {
        let rule = self.builder.optional(build);
        self.add(rule)
    }
}

impl GrammarBuilder {
    fn collect(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Vec<RuleId> {
        let mut collector = RuleCollector {
            builder: self,
            rules: Vec::new(),
        };
        build(&mut collector);
        collector.rules
    }

    pub fn terminal(&mut self, expected: ExpectedToken) -> Rule<Token> {
        self.push(RuleKind::Terminal(expected))
    }

    pub fn keyword(&mut self, keyword: Keyword) -> Rule<Token> {
        self.terminal(ExpectedToken::Keyword(keyword))
    }

    pub fn operator(&mut self, operator: Operator) -> Rule<Token> {
        self.terminal(ExpectedToken::Operator(operator))
    }

    pub fn identifier(&mut self) -> Rule<Token> {
        self.terminal(ExpectedToken::identifier())
    }

    /// An identifier that also accepts the given keywords and operators
    /// in its place.
    pub fn identifier_accepting(
        &mut self,
        keywords: &[Keyword],
        operators: &[Operator],
    ) -> Rule<Token> {
        self.terminal(ExpectedToken::Identifier {
            accepted_keywords: keywords.to_vec(),
            accepted_operators: operators.to_vec(),
        })
    }

    /// An identifier with fixed text that acts as a keyword only where
    /// this rule is used.
    pub fn local_keyword(&mut self, text: &str) -> Rule<Token> {
        self.terminal(ExpectedToken::LocalKeyword(text.to_string()))
    }

    pub fn numeric_literal(&mut self) -> Rule<Token> {
        self.terminal(ExpectedToken::NumericLiteral)
    }

    pub fn string_literal_content(&mut self) -> Rule<Token> {
        self.terminal(ExpectedToken::StringLiteralContent)
    }

    pub fn end_of_input(&mut self) -> Rule<Token> {
        self.terminal(ExpectedToken::EndOfInput)
    }

    /// Yields a [`Value::Sequence`] with one value per collected rule.
    pub fn sequence(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Rule<Value> {
        let rules = self.collect(build);
        self.push(RuleKind::Sequence(rules))
    }

    /// Yields the value of whichever alternative matched.
    pub fn either_of(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Rule<Value> {
        let rules = self.collect(build);
        self.push(RuleKind::EitherOf(rules))
    }

    pub fn repeating(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Rule<Value> {
        let body = self.body(build);
        self.repeat_between(body, 0, None)
    }

    pub fn repeating_at_least_once(
        &mut self,
        build: impl FnOnce(&mut RuleCollector<'_>),
    ) -> Rule<Value> {
        let body = self.body(build);
        self.repeat_between(body, 1, None)
    }

    pub fn optional(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Rule<Value> {
        let body = self.body(build);
        self.repeat_between(body, 0, Some(1))
    }

    /// Repeats `rule` between `min` and `max` times; `None` means no
    /// upper bound. Yields a [`Value::Repeated`].
    pub fn repeat_between<T>(&mut self, rule: Rule<T>, min: u32, max: Option<u32>) -> Rule<Value> {
        self.push(RuleKind::Repeating {
            rule: rule.id(),
            min,
            max,
        })
    }

    /// A single collected rule is repeated as is, several are wrapped in
    /// a sequence.
    fn body(&mut self, build: impl FnOnce(&mut RuleCollector<'_>)) -> Rule<Value> {
        let rules = self.collect(build);
        if let [rule] = rules.as_slice() {
            return Rule::from_id(*rule);
        }
        self.push(RuleKind::Sequence(rules))
    }

    fn transform<U>(
        &mut self,
        rule: RuleId,
        map: impl Fn(Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    ) -> Rule<U> {
        self.push(RuleKind::Transform {
            rule,
            map: Arc::new(map),
        })
    }
}

impl<T: RuleValue> Rule<T> {
    pub fn named(self, grammar: &mut GrammarBuilder, name: &str) -> Self {
        grammar.named(self, name)
    }

    /// Tokens and nodes matched by this rule in source order.
    pub fn flatten(self, grammar: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        grammar.transform(self.id(), |value: Value| Ok(Value::Items(value.flatten())))
    }

    pub fn map_result<U: RuleValue>(
        self,
        grammar: &mut GrammarBuilder,
        map: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Rule<U> {
        grammar.transform(self.id(), move |value| {
            let value = from_value::<T>(value)?;
            Ok(into_value(map(value)))
        })
    }

    /// Flattens the match and hands the items to `build`. `building`
    /// names the produced node in transform errors.
    pub fn ast_transformation<U: RuleValue>(
        self,
        grammar: &mut GrammarBuilder,
        building: &'static str,
        build: impl Fn(&mut Items) -> Result<U, TransformError> + Send + Sync + 'static,
    ) -> Rule<U> {
        grammar.transform(self.id(), move |value: Value| {
            let mut items = Items::new(building, value.flatten());
            build(&mut items).map(into_value)
        })
    }

    /// Rewrites mismatches that happen inside this rule and satisfy
    /// `predicate`. Matching itself is unaffected.
    pub fn enhance_errors(
        self,
        grammar: &mut GrammarBuilder,
        predicate: impl Fn(&ParsingMismatch) -> bool + Send + Sync + 'static,
        rewrite: impl Fn(ParsingMismatch) -> ParsingMismatch + Send + Sync + 'static,
    ) -> Rule<T> {
        grammar.push(RuleKind::Enhance {
            rule: self.id(),
            predicate: Arc::new(predicate),
            rewrite: Arc::new(rewrite),
        })
    }
}
