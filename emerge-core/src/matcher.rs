//! Incremental matching of a rule against a token stream.
//!
//! The matcher never looks back at consumed tokens. All parse paths that
//! are still possible advance together, one token per [`Matcher::step`];
//! occurrences of a rule at a position are shared between paths through
//! the [`ContextTable`], so a grammar that references the same rule from
//! several places expands it once.

use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::mem;

use tracing::{debug, trace};

use crate::context::{
    Child, ContextId, ContextTable, Continuation, Derivation, MatchingContext,
    PATH_COUNT_LIMIT, RepetitionLink, Resolution, ResumeState,
};
use crate::diagnostic::ParsingMismatch;
use crate::error::TransformError;
use crate::expected::{Expected, ExpectedToken};
use crate::rule::{Grammar, MapFn, Rule, RuleId, RuleKind};
use crate::span::Span;
use crate::token::Token;
use crate::value::{RuleValue, Value, from_value};

#[derive(Debug, Clone, PartialEq)]
pub enum MatchingResult<T> {
    Success { value: T, is_ambiguous: bool },
    Error(ParsingMismatch),
}

impl<T> MatchingResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, MatchingResult::Success { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        match self {
            MatchingResult::Success { is_ambiguous, .. } => *is_ambiguous,
            MatchingResult::Error(mismatch) => mismatch.is_ambiguous,
        }
    }

    pub fn into_result(self) -> Result<T, ParsingMismatch> {
        match self {
            MatchingResult::Success { value, .. } => Ok(value),
            MatchingResult::Error(mismatch) => Err(mismatch),
        }
    }
}

#[derive(Debug)]
enum Task {
    Start {
        rule: RuleId,
        position: usize,
        continuation: Continuation,
    },
    Complete {
        context: ContextId,
        end: usize,
        derivation: Derivation,
    },
    Resume {
        continuation: Continuation,
        child: Child,
    },
}

pub struct Matcher<'g, T> {
    grammar: &'g Grammar,
    root: MatchingContext,
    contexts: ContextTable,
    tokens: Vec<Token>,
    /// Terminal contexts waiting for the token at `tokens.len()`.
    pending: Vec<ContextId>,
    queue: VecDeque<Task>,
    live_paths: usize,
    failure: Option<ParsingMismatch>,
    _marker: PhantomData<fn() -> T>,
}

impl<'g, T: RuleValue> Matcher<'g, T> {
    pub fn new(grammar: &'g Grammar, rule: Rule<T>) -> Self {
        let mut matcher = Matcher {
            grammar,
            root: MatchingContext {
                rule: rule.id(),
                start: 0,
            },
            contexts: ContextTable::default(),
            tokens: Vec::new(),
            pending: Vec::new(),
            queue: VecDeque::new(),
            live_paths: 0,
            failure: None,
            _marker: PhantomData,
        };
        matcher.queue.push_back(Task::Start {
            rule: rule.id(),
            position: 0,
            continuation: Continuation::Root,
        });
        matcher.run();
        matcher.live_paths = matcher.count_live_paths();
        matcher
    }

    /// Number of tokens consumed so far.
    pub fn consumed(&self) -> usize {
        self.tokens.len()
    }

    /// Whether some path can still accept another token.
    pub fn can_continue(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether exactly one parse path is live.
    pub fn is_disambiguated(&self) -> bool {
        self.live_paths == 1
    }

    /// What the live paths accept next.
    pub fn expected(&self) -> Vec<Expected> {
        self.pending
            .iter()
            .filter_map(|context| {
                let origin = self.contexts.get(*context).key.rule;
                self.expected_token(*context).map(|token| Expected {
                    origin,
                    token: token.clone(),
                })
            })
            .collect()
    }

    /// Choice contexts that were left with a single live path, and the
    /// token that did it. Diagnostics do not depend on these marks.
    pub fn resolved_contexts(&self) -> Vec<(MatchingContext, Resolution)> {
        self.contexts
            .iter()
            .filter_map(|state| state.resolved_by.map(|resolution| (state.key, resolution)))
            .collect()
    }

    /// Feeds the next token. Returns `false` if no path accepts it, in
    /// which case the token is not consumed and matching is over.
    pub fn step(&mut self, token: Token) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let position = self.tokens.len();
        let pending = mem::take(&mut self.pending);
        let (accepted, rejected): (Vec<_>, Vec<_>) = pending.into_iter().partition(|context| {
            self.expected_token(*context)
                .is_some_and(|expected| expected.matches(&token))
        });

        if accepted.is_empty() {
            let mismatch = self.report(&rejected, token, self.live_paths > 1);
            debug!(position, %mismatch, "no parse path accepts the token");
            self.failure = Some(mismatch);
            self.live_paths = 0;
            return false;
        }

        trace!(
            position,
            token = %token,
            accepted = accepted.len(),
            dropped = rejected.len(),
            "token consumed"
        );
        self.tokens.push(token);
        for context in accepted {
            self.queue.push_back(Task::Complete {
                context,
                end: position + 1,
                derivation: Derivation::Token,
            });
        }
        self.run();

        self.live_paths = self.count_live_paths();
        if self.live_paths == 1 {
            self.mark_resolution(position);
        }
        true
    }

    /// Ends matching and picks the longest completion of the root rule.
    ///
    /// A success is ambiguous when two derivations tied for the value, or
    /// when some path could still accept another token.
    pub fn finish(mut self) -> Result<MatchingResult<T>, TransformError> {
        let completed = self.contexts.lookup(self.root).and_then(|root| {
            let state = self.contexts.get(root);
            state
                .completions
                .keys()
                .next_back()
                .map(|end| Child {
                    context: root,
                    end: *end,
                })
        });

        if let Some(root) = completed {
            let mut extraction = Extraction {
                grammar: self.grammar,
                contexts: &self.contexts,
                tokens: &self.tokens,
                has_ties: false,
            };
            let value = extraction.value(root)?;
            let is_ambiguous = extraction.has_ties || self.can_continue();
            debug!(
                consumed = root.end,
                is_ambiguous,
                contexts = self.contexts.len(),
                links = self.contexts.link_count(),
                "match succeeded"
            );
            return Ok(MatchingResult::Success {
                value: from_value(value)?,
                is_ambiguous,
            });
        }

        if let Some(failure) = self.failure.take() {
            return Ok(MatchingResult::Error(failure));
        }

        let span = self
            .tokens
            .last()
            .map_or_else(Span::unknown, |token| token.span.end());
        let mismatch = self.report(
            &self.pending,
            Token::end_of_input(span),
            self.live_paths > 1,
        );
        debug!(%mismatch, "input ended before the rule completed");
        Ok(MatchingResult::Error(mismatch))
    }

    fn run(&mut self) {
        while let Some(task) = self.queue.pop_front() {
            match task {
                Task::Start {
                    rule,
                    position,
                    continuation,
                } => self.start(rule, position, continuation),
                Task::Complete {
                    context,
                    end,
                    derivation,
                } => self.complete(context, end, derivation),
                Task::Resume {
                    continuation,
                    child,
                } => self.resume(continuation, child),
            }
        }
    }

    fn start(&mut self, rule: RuleId, position: usize, continuation: Continuation) {
        let (context, created) = self.contexts.get_or_insert(MatchingContext {
            rule,
            start: position,
        });
        self.contexts.add_parent(context, continuation.clone());
        if !created {
            for end in self.contexts.get(context).completions.keys() {
                self.queue.push_back(Task::Resume {
                    continuation: continuation.clone(),
                    child: Child { context, end: *end },
                });
            }
            return;
        }

        let resume = |state| Continuation::Resume {
            parent: context,
            state,
        };
        match self.grammar.kind(rule) {
            RuleKind::Terminal(_) => self.pending.push(context),
            RuleKind::Sequence(rules) => match rules.first() {
                Some(first) => self.queue.push_back(Task::Start {
                    rule: *first,
                    position,
                    continuation: resume(ResumeState::Sequence {
                        index: 0,
                        children: Vec::new(),
                    }),
                }),
                None => self.queue.push_back(Task::Complete {
                    context,
                    end: position,
                    derivation: Derivation::Children(Vec::new()),
                }),
            },
            RuleKind::EitherOf(alternatives) => {
                for (index, alternative) in alternatives.iter().enumerate() {
                    self.queue.push_back(Task::Start {
                        rule: *alternative,
                        position,
                        continuation: resume(ResumeState::Alternative(index)),
                    });
                }
            }
            RuleKind::Repeating { rule, min, max } => {
                if *min == 0 {
                    self.queue.push_back(Task::Complete {
                        context,
                        end: position,
                        derivation: Derivation::Repetition(None),
                    });
                }
                if *max != Some(0) {
                    self.queue.push_back(Task::Start {
                        rule: *rule,
                        position,
                        continuation: resume(ResumeState::Repetition { previous: None }),
                    });
                }
            }
            RuleKind::Reference {
                target: Some(inner),
            }
            | RuleKind::Transform { rule: inner, .. }
            | RuleKind::Enhance { rule: inner, .. } => self.queue.push_back(Task::Start {
                rule: *inner,
                position,
                continuation: resume(ResumeState::Delegate),
            }),
            // Rejected by GrammarBuilder::build.
            RuleKind::Reference { target: None } => {}
        }
    }

    fn complete(&mut self, context: ContextId, end: usize, derivation: Derivation) {
        let state = self.contexts.get_mut(context);
        if !state.record(end, derivation) {
            return;
        }
        trace!(
            rule = %self.grammar.describe(state.key.rule),
            start = state.key.start,
            end,
            "completed"
        );
        for continuation in &state.parents {
            self.queue.push_back(Task::Resume {
                continuation: continuation.clone(),
                child: Child { context, end },
            });
        }
    }

    fn resume(&mut self, continuation: Continuation, child: Child) {
        // The root context holds its own completions.
        let Continuation::Resume { parent, state } = continuation else {
            return;
        };
        let rule = self.contexts.get(parent).key.rule;
        match (state, self.grammar.kind(rule)) {
            (ResumeState::Sequence { index, mut children }, RuleKind::Sequence(rules)) => {
                children.push(child);
                let task = match rules.get(index + 1) {
                    Some(next) => Task::Start {
                        rule: *next,
                        position: child.end,
                        continuation: Continuation::Resume {
                            parent,
                            state: ResumeState::Sequence {
                                index: index + 1,
                                children,
                            },
                        },
                    },
                    None => Task::Complete {
                        context: parent,
                        end: child.end,
                        derivation: Derivation::Children(children),
                    },
                };
                self.queue.push_back(task);
            }
            (ResumeState::Alternative(index), _) => self.queue.push_back(Task::Complete {
                context: parent,
                end: child.end,
                derivation: Derivation::Alternative { index, child },
            }),
            (
                ResumeState::Repetition { previous },
                RuleKind::Repeating {
                    rule: repeated,
                    min,
                    max,
                },
            ) => {
                let zero_length = child.end == self.contexts.get(child.context).key.start;
                let count = previous.map_or(0, |link| self.contexts.link(link).count) + 1;
                let link = self.contexts.push_link(RepetitionLink {
                    previous,
                    child,
                    count,
                });
                if !zero_length && max.is_none_or(|max| count < max) {
                    self.queue.push_back(Task::Start {
                        rule: *repeated,
                        position: child.end,
                        continuation: Continuation::Resume {
                            parent,
                            state: ResumeState::Repetition {
                                previous: Some(link),
                            },
                        },
                    });
                }
                if zero_length || count >= *min {
                    self.queue.push_back(Task::Complete {
                        context: parent,
                        end: child.end,
                        derivation: Derivation::Repetition(Some(link)),
                    });
                }
            }
            (ResumeState::Delegate, _) => self.queue.push_back(Task::Complete {
                context: parent,
                end: child.end,
                derivation: Derivation::Inner(child),
            }),
            (state, kind) => {
                debug!(?state, ?kind, "continuation does not fit its rule");
            }
        }
    }

    fn expected_token(&self, context: ContextId) -> Option<&'g ExpectedToken> {
        let grammar = self.grammar;
        match grammar.kind(self.contexts.get(context).key.rule) {
            RuleKind::Terminal(expected) => Some(expected),
            _ => None,
        }
    }

    fn count_live_paths(&self) -> usize {
        self.pending
            .iter()
            .map(|context| self.contexts.get(*context).paths)
            .fold(0, |total, paths| (total + paths).min(PATH_COUNT_LIMIT))
    }

    /// Walks the single live path and marks its choices as resolved. The
    /// walk stops at the first choice that is already marked: everything
    /// above it was marked together with it.
    fn mark_resolution(&mut self, token_index: usize) {
        let Some(mut current) = self.pending.first().copied() else {
            return;
        };
        let grammar = self.grammar;
        loop {
            let state = self.contexts.get_mut(current);
            if grammar.kind(state.key.rule).is_choice() {
                if !state.mark_as_removing_ambiguity(token_index) {
                    break;
                }
                trace!(
                    rule = %grammar.describe(state.key.rule),
                    start = state.key.start,
                    token_index,
                    "ambiguity resolved"
                );
            }
            match state.parents.first() {
                Some(Continuation::Resume { parent, .. }) => current = *parent,
                _ => break,
            }
        }
    }

    fn report(&self, dying: &[ContextId], actual: Token, is_ambiguous: bool) -> ParsingMismatch {
        let mut merged: Option<ParsingMismatch> = None;
        for context in dying {
            let Some(expected) = self.expected_token(*context) else {
                continue;
            };
            let mismatch =
                ParsingMismatch::new([expected.to_string()], actual.clone(), is_ambiguous);
            let mismatch = self.enhance(*context, mismatch);
            merged = Some(match merged {
                Some(merged) => merged.merge(mismatch),
                None => mismatch,
            });
        }
        merged.unwrap_or_else(|| ParsingMismatch::new(Vec::new(), actual, is_ambiguous))
    }

    /// Applies the enhancement hooks around `context`, innermost first.
    fn enhance(&self, context: ContextId, mut mismatch: ParsingMismatch) -> ParsingMismatch {
        let mut queue = VecDeque::from([context]);
        let mut seen = HashSet::from([context]);
        while let Some(current) = queue.pop_front() {
            let state = self.contexts.get(current);
            if let RuleKind::Enhance {
                predicate, rewrite, ..
            } = self.grammar.kind(state.key.rule)
            {
                if predicate(&mismatch) {
                    mismatch = rewrite(mismatch);
                }
            }
            for continuation in &state.parents {
                if let Continuation::Resume { parent, .. } = continuation {
                    if seen.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        mismatch
    }
}

/// Builds the value of a completed match from the recorded derivations.
///
/// Derivation trees are as deep as the input is nested, so they are
/// walked with an explicit stack of [`Step`]s rather than recursion.
struct Extraction<'a> {
    grammar: &'a Grammar,
    contexts: &'a ContextTable,
    tokens: &'a [Token],
    has_ties: bool,
}

enum Step<'a> {
    Visit(Child),
    /// Gathers the last `count` values into a sequence or repetition.
    Collect { count: usize, repeated: bool },
    /// Applies a transformation to the last value.
    Map(&'a MapFn),
}

impl<'a> Extraction<'a> {
    fn value(&mut self, root: Child) -> Result<Value, TransformError> {
        let contexts = self.contexts;
        let grammar = self.grammar;
        let mut steps = vec![Step::Visit(root)];
        let mut values: Vec<Value> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(child) => {
                    let state = contexts.get(child.context);
                    let derivations = state
                        .completions
                        .get(&child.end)
                        .map_or(&[][..], Vec::as_slice);
                    if derivations.len() > 1 {
                        self.has_ties = true;
                    }
                    let derivation = preferred(contexts, derivations).ok_or_else(incomplete)?;
                    match derivation {
                        Derivation::Token => {
                            let token = self.tokens.get(state.key.start).ok_or_else(incomplete)?;
                            values.push(Value::Token(token.clone()));
                        }
                        Derivation::Alternative { child, .. } => steps.push(Step::Visit(*child)),
                        Derivation::Children(children) => {
                            steps.push(Step::Collect {
                                count: children.len(),
                                repeated: false,
                            });
                            steps.extend(children.iter().rev().map(|child| Step::Visit(*child)));
                        }
                        Derivation::Repetition(last) => {
                            let iterations = contexts.iterations(*last);
                            steps.push(Step::Collect {
                                count: iterations.len(),
                                repeated: true,
                            });
                            steps.extend(iterations.into_iter().rev().map(Step::Visit));
                        }
                        Derivation::Inner(inner) => {
                            if let RuleKind::Transform { map, .. } = grammar.kind(state.key.rule) {
                                steps.push(Step::Map(map));
                            }
                            steps.push(Step::Visit(*inner));
                        }
                    }
                }
                Step::Collect { count, repeated } => {
                    let split = values.len().checked_sub(count).ok_or_else(incomplete)?;
                    let items = values.split_off(split);
                    values.push(if repeated {
                        Value::Repeated(items)
                    } else {
                        Value::Sequence(items)
                    });
                }
                Step::Map(map) => {
                    let inner = values.pop().ok_or_else(incomplete)?;
                    values.push(map(inner)?);
                }
            }
        }
        values.pop().ok_or_else(incomplete)
    }
}

fn incomplete() -> TransformError {
    TransformError::MissingItem {
        building: "match result",
        expected: "completed sub-match",
    }
}

/// The first declared alternative wins; among sequence and repetition
/// splits the one giving earlier elements more tokens wins.
fn preferred<'d>(contexts: &ContextTable, derivations: &'d [Derivation]) -> Option<&'d Derivation> {
    let ends = |children: &[Child]| children.iter().map(|child| child.end).collect::<Vec<_>>();
    derivations.iter().reduce(|best, candidate| {
        let better = match (candidate, best) {
            (
                Derivation::Alternative { index: candidate, .. },
                Derivation::Alternative { index: best, .. },
            ) => candidate < best,
            (Derivation::Children(candidate), Derivation::Children(best)) => {
                ends(candidate) > ends(best)
            }
            (Derivation::Repetition(candidate), Derivation::Repetition(best)) => {
                ends(&contexts.iterations(*candidate)) > ends(&contexts.iterations(*best))
            }
            _ => false,
        };
        if better { candidate } else { best }
    })
}

/// Feeds `tokens` until the matcher stops accepting them and returns the
/// longest match.
pub fn match_tokens<T: RuleValue>(
    grammar: &Grammar,
    rule: Rule<T>,
    tokens: impl IntoIterator<Item = Token>,
) -> Result<MatchingResult<T>, TransformError> {
    let mut matcher = Matcher::new(grammar, rule);
    for token in tokens {
        if !matcher.step(token) {
            break;
        }
    }
    matcher.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rule::GrammarBuilder;
    use crate::token::{Keyword, Operator, TokenKind};

    fn build(
        define: impl FnOnce(&mut GrammarBuilder) -> Rule<Vec<Value>>,
    ) -> (Grammar, Rule<Vec<Value>>) {
        let mut builder = GrammarBuilder::new();
        let rule = define(&mut builder);
        (builder.build().expect("valid grammar"), rule)
    }

    fn keywords(keywords: &[Keyword]) -> Vec<Token> {
        keywords.iter().copied().map(Token::keyword).collect()
    }

    fn eoi() -> Token {
        Token::end_of_input(Span::unknown())
    }

    fn kw(keyword: Keyword) -> TokenKind {
        TokenKind::Keyword(keyword)
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    fn identifiers(names: &str) -> Vec<Token> {
        names.split_whitespace().map(Token::identifier).collect()
    }

    fn success_kinds(result: MatchingResult<Vec<Value>>) -> Vec<TokenKind> {
        match result {
            MatchingResult::Success { value, .. } => value
                .into_iter()
                .filter_map(Value::into_token)
                .map(|token| token.kind)
                .collect(),
            MatchingResult::Error(mismatch) => panic!("expected success, got: {mismatch}"),
        }
    }

    fn failure_of<T>(result: MatchingResult<T>) -> ParsingMismatch {
        match result {
            MatchingResult::Error(mismatch) => mismatch,
            MatchingResult::Success { .. } => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn either_of_picks_the_matching_alternative() {
        let mut builder = GrammarBuilder::new();
        let rule = builder.either_of(|e| {
            e.keyword(Keyword::Intrinsic);
            e.keyword(Keyword::Operator);
        });
        let grammar = builder.build().expect("grammar");

        for keyword in [Keyword::Intrinsic, Keyword::Operator] {
            let result = match_tokens(&grammar, rule, keywords(&[keyword])).expect("match");
            match result {
                MatchingResult::Success {
                    value,
                    is_ambiguous,
                } => {
                    assert_eq!(value.as_token(), Some(&Token::keyword(keyword)));
                    assert!(!is_ambiguous);
                }
                MatchingResult::Error(mismatch) => panic!("{mismatch}"),
            }
        }
    }

    #[test]
    fn either_of_finds_equal_length_alternative() {
        let (grammar, rule) = build(|g| {
            g.either_of(|e| {
                e.sequence(|s| {
                    s.keyword(Keyword::If).keyword(Keyword::Else);
                });
                e.sequence(|s| {
                    s.keyword(Keyword::Import).keyword(Keyword::Export);
                });
            })
            .flatten(g)
        });
        let result = match_tokens(&grammar, rule, keywords(&[Keyword::If, Keyword::Else]));
        assert_eq!(
            success_kinds(result.expect("match")),
            vec![kw(Keyword::If), kw(Keyword::Else)]
        );
    }

    fn prefix_alternatives(g: &mut GrammarBuilder) -> Rule<Value> {
        g.either_of(|e| {
            e.sequence(|s| {
                s.keyword(Keyword::If).keyword(Keyword::Else);
            });
            e.sequence(|s| {
                s.keyword(Keyword::If)
                    .keyword(Keyword::Else)
                    .keyword(Keyword::Class);
            });
        })
    }

    #[test]
    fn either_of_falls_back_when_longer_alternative_breaks() {
        let (grammar, rule) = build(|g| prefix_alternatives(g).flatten(g));
        let mut tokens = keywords(&[Keyword::If, Keyword::Else]);
        tokens.push(eoi());
        let result = match_tokens(&grammar, rule, tokens).expect("match");
        assert_eq!(
            success_kinds(result),
            vec![kw(Keyword::If), kw(Keyword::Else)]
        );
    }

    #[test]
    fn either_of_continues_when_shorter_alternative_breaks() {
        let (grammar, rule) = build(|g| {
            g.either_of(|e| {
                e.sequence(|s| {
                    s.keyword(Keyword::If).keyword(Keyword::Else);
                });
                e.sequence(|s| {
                    s.keyword(Keyword::If)
                        .keyword(Keyword::Export)
                        .keyword(Keyword::Class);
                });
            })
            .flatten(g)
        });
        let tokens = keywords(&[Keyword::If, Keyword::Export, Keyword::Class]);
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, tokens).expect("match")),
            vec![kw(Keyword::If), kw(Keyword::Export), kw(Keyword::Class)]
        );
    }

    #[test]
    fn greedy_match_prefers_the_longest_completion() {
        let (grammar, rule) = build(|g| prefix_alternatives(g).flatten(g));

        // The longer alternative is still live after `if else`.
        let short = match_tokens(&grammar, rule, keywords(&[Keyword::If, Keyword::Else]))
            .expect("match");
        assert!(short.is_ambiguous());
        assert_eq!(
            success_kinds(short),
            vec![kw(Keyword::If), kw(Keyword::Else)]
        );

        let long = match_tokens(
            &grammar,
            rule,
            keywords(&[Keyword::If, Keyword::Else, Keyword::Class]),
        )
        .expect("match");
        assert!(!long.is_ambiguous());
        assert_eq!(
            success_kinds(long),
            vec![kw(Keyword::If), kw(Keyword::Else), kw(Keyword::Class)]
        );
    }

    #[test]
    fn end_of_input_excludes_the_longer_alternative() {
        let (grammar, rule) = build(|g| prefix_alternatives(g).flatten(g));
        let mut tokens = keywords(&[Keyword::If, Keyword::Else]);
        tokens.push(eoi());
        let result = match_tokens(&grammar, rule, tokens).expect("match");
        assert!(!result.is_ambiguous());
        assert!(result.is_success());
    }

    #[test]
    fn prefix_alternative_followed_by_end_of_input_picks_the_longer_one() {
        let (grammar, rule) = build(|g| {
            let choice = prefix_alternatives(g);
            g.sequence(|s| {
                s.refer(choice).end_of_input();
            })
            .flatten(g)
        });
        let mut tokens = keywords(&[Keyword::If, Keyword::Else, Keyword::Class]);
        tokens.push(eoi());
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, tokens).expect("match")),
            vec![kw(Keyword::If), kw(Keyword::Else), kw(Keyword::Class)]
        );
    }

    #[test]
    fn completely_ambiguous_input_succeeds_as_ambiguous() {
        let mut builder = GrammarBuilder::new();
        let rule = builder.either_of(|e| {
            e.keyword(Keyword::If);
            e.keyword(Keyword::If);
        });
        let grammar = builder.build().expect("grammar");
        let result = match_tokens(&grammar, rule, keywords(&[Keyword::If])).expect("match");
        assert!(result.is_ambiguous());
        assert_eq!(
            result.into_result().expect("success").as_token(),
            Some(&Token::keyword(Keyword::If))
        );
    }

    #[test]
    fn disjoint_first_tokens_disambiguate_after_one_step() {
        let mut builder = GrammarBuilder::new();
        let choice = builder.either_of(|e| {
            e.sequence(|s| {
                s.keyword(Keyword::If).keyword(Keyword::Else);
            });
            e.sequence(|s| {
                s.keyword(Keyword::Class).keyword(Keyword::Export);
            });
        });
        let grammar = builder.build().expect("grammar");

        let mut matcher = Matcher::new(&grammar, choice);
        assert!(!matcher.is_disambiguated());
        assert!(matcher.step(Token::keyword(Keyword::If)));
        assert!(matcher.is_disambiguated());
        assert_eq!(
            matcher.resolved_contexts(),
            vec![(
                MatchingContext {
                    rule: choice.id(),
                    start: 0
                },
                Resolution { token_index: 0 }
            )]
        );

        assert!(!matcher.step(Token::keyword(Keyword::Export)));
        let mismatch = failure_of(matcher.finish().expect("finish"));
        assert!(!mismatch.is_ambiguous);
        assert_eq!(mismatch.expected_alternatives, vec!["keyword else"]);
        assert_eq!(mismatch.actual, Token::keyword(Keyword::Export));
    }

    #[test]
    fn double_rejection_reports_the_union_as_ambiguous() {
        let (grammar, rule) = build(|g| {
            g.either_of(|e| {
                e.sequence(|s| {
                    s.keyword(Keyword::If).keyword(Keyword::Else);
                });
                e.sequence(|s| {
                    s.keyword(Keyword::Class).keyword(Keyword::Export);
                });
            })
            .flatten(g)
        });
        let result = match_tokens(&grammar, rule, keywords(&[Keyword::Var])).expect("match");
        let mismatch = failure_of(result);
        assert!(mismatch.is_ambiguous);
        assert_eq!(
            mismatch.expected_alternatives,
            vec!["keyword if", "keyword class"]
        );
    }

    fn optional_then_export(g: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        g.sequence(|s| {
            s.optional(|o| {
                o.keyword(Keyword::If);
            })
            .keyword(Keyword::Export);
        })
        .flatten(g)
    }

    #[test]
    fn optional_accepts_zero_or_one() {
        let (grammar, rule) = build(optional_then_export);
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, keywords(&[Keyword::Export])).expect("match")),
            vec![kw(Keyword::Export)]
        );
        assert_eq!(
            success_kinds(
                match_tokens(&grammar, rule, keywords(&[Keyword::If, Keyword::Export]))
                    .expect("match")
            ),
            vec![kw(Keyword::If), kw(Keyword::Export)]
        );
    }

    #[test]
    fn optional_rejects_two() {
        let (grammar, rule) = build(optional_then_export);
        let mut tokens = keywords(&[Keyword::If, Keyword::If]);
        tokens.push(eoi());
        let mismatch = failure_of(match_tokens(&grammar, rule, tokens).expect("match"));
        assert_eq!(mismatch.expected_alternatives, vec!["keyword export"]);
        assert_eq!(mismatch.actual, Token::keyword(Keyword::If));
        assert!(!mismatch.is_ambiguous);
    }

    #[test]
    fn unbounded_repetition_accepts_any_count() {
        let (grammar, rule) = build(|g| {
            g.sequence(|s| {
                s.repeating(|r| {
                    r.keyword(Keyword::If);
                })
                .keyword(Keyword::Export);
            })
            .flatten(g)
        });
        for count in [0, 1, 4] {
            let mut input = vec![Keyword::If; count];
            input.push(Keyword::Export);
            let kinds = success_kinds(match_tokens(&grammar, rule, keywords(&input)).expect("match"));
            let expected: Vec<TokenKind> = input.into_iter().map(kw).collect();
            assert_eq!(kinds, expected);
        }
    }

    #[test]
    fn bounded_repetition_stops_at_the_upper_bound() {
        let (grammar, rule) = build(|g| {
            let keyword = g.keyword(Keyword::If);
            let two = g.repeat_between(keyword, 1, Some(2));
            g.sequence(|s| {
                s.refer(two).end_of_input();
            })
            .flatten(g)
        });
        let mut ok = keywords(&[Keyword::If, Keyword::If]);
        ok.push(eoi());
        assert!(match_tokens(&grammar, rule, ok).expect("match").is_success());

        let mut too_many = keywords(&[Keyword::If, Keyword::If, Keyword::If]);
        too_many.push(eoi());
        let mismatch = failure_of(match_tokens(&grammar, rule, too_many).expect("match"));
        assert_eq!(mismatch.expected_alternatives, vec!["end of input"]);

        let mismatch = failure_of(match_tokens(&grammar, rule, vec![eoi()]).expect("match"));
        assert_eq!(mismatch.expected_alternatives, vec!["keyword if"]);
    }

    #[test]
    fn zero_length_repetition_does_not_loop() {
        let (grammar, rule) = build(|g| {
            let nothing = g.optional(|o| {
                o.keyword(Keyword::Pure);
            });
            g.sequence(|s| {
                s.repeating(|r| {
                    r.refer(nothing);
                })
                .keyword(Keyword::Export);
            })
            .flatten(g)
        });
        let result = match_tokens(&grammar, rule, keywords(&[Keyword::Export])).expect("match");
        assert_eq!(success_kinds(result), vec![kw(Keyword::Export)]);
    }

    #[test]
    fn sequence_fails_on_first_token() {
        let mut builder = GrammarBuilder::new();
        let rule = builder.sequence(|s| {
            s.keyword(Keyword::If).keyword(Keyword::Set);
        });
        let grammar = builder.build().expect("grammar");

        let mut matcher = Matcher::new(&grammar, rule);
        assert!(!matcher.step(Token::keyword(Keyword::Class)));
        let mismatch = failure_of(matcher.finish().expect("finish"));
        assert_eq!(mismatch.expected_alternatives, vec!["keyword if"]);
    }

    #[test]
    fn sequence_fails_mid_way() {
        let mut builder = GrammarBuilder::new();
        let rule = builder.sequence(|s| {
            s.keyword(Keyword::If).keyword(Keyword::Set);
        });
        let grammar = builder.build().expect("grammar");

        let mut matcher = Matcher::new(&grammar, rule);
        assert!(matcher.step(Token::keyword(Keyword::If)));
        assert!(!matcher.step(Token::keyword(Keyword::Class)));
        assert_eq!(matcher.consumed(), 1);
        let mismatch = failure_of(matcher.finish().expect("finish"));
        assert_eq!(mismatch.expected_alternatives, vec!["keyword set"]);
        assert_eq!(mismatch.actual, Token::keyword(Keyword::Class));
        assert_eq!(
            mismatch.to_string(),
            "Unexpected keyword class, expected keyword set"
        );
    }

    #[test]
    fn running_out_of_input_reports_end_of_input_behind_last_token() {
        let mut builder = GrammarBuilder::new();
        let rule = builder.sequence(|s| {
            s.keyword(Keyword::If).keyword(Keyword::Else);
        });
        let grammar = builder.build().expect("grammar");

        let span = Span::new(Arc::from("main.em"), 2, 5, 2, 6);
        let token = Token::new(TokenKind::Keyword(Keyword::If), span);
        let mismatch = failure_of(match_tokens(&grammar, rule, [token]).expect("match"));
        assert!(mismatch.actual.is_end_of_input());
        assert_eq!(mismatch.expected_alternatives, vec!["keyword else"]);
        assert_eq!((mismatch.span.from_line, mismatch.span.from_column), (2, 7));

        let mismatch = mismatch_of_empty_input(&grammar, rule);
        assert!(mismatch.span.is_unknown());
        assert_eq!(mismatch.expected_alternatives, vec!["keyword if"]);
    }

    fn mismatch_of_empty_input(grammar: &Grammar, rule: Rule<Value>) -> ParsingMismatch {
        failure_of(Matcher::new(grammar, rule).finish().expect("finish"))
    }

    fn intrinsic_operator(g: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        g.sequence(|s| {
            s.keyword(Keyword::Intrinsic)
                .either_of(|e| {
                    e.sequence(|s| {
                        s.keyword(Keyword::Operator)
                            .keyword(Keyword::Nothrow)
                            .keyword(Keyword::Function);
                    });
                    e.sequence(|s| {
                        s.keyword(Keyword::Operator)
                            .keyword(Keyword::ReadOnly)
                            .keyword(Keyword::Var);
                    });
                })
                .end_of_input();
        })
        .flatten(g)
    }

    fn with_eoi(keywords_in_order: &[Keyword]) -> Vec<Token> {
        let mut tokens = keywords(keywords_in_order);
        tokens.push(eoi());
        tokens
    }

    #[test]
    fn shared_prefix_matches_either_path_without_backtracking() {
        let (grammar, rule) = build(intrinsic_operator);
        for last in [
            [Keyword::Nothrow, Keyword::Function],
            [Keyword::ReadOnly, Keyword::Var],
        ] {
            let input = [Keyword::Intrinsic, Keyword::Operator, last[0], last[1]];
            let result = match_tokens(&grammar, rule, with_eoi(&input)).expect("match");
            let expected: Vec<TokenKind> = input.into_iter().map(kw).collect();
            assert_eq!(success_kinds(result), expected);
        }
    }

    #[test]
    fn mismatch_on_ambiguous_token_lists_both_paths() {
        let (grammar, rule) = build(intrinsic_operator);
        let input = [
            Keyword::Intrinsic,
            Keyword::Operator,
            Keyword::Pure,
            Keyword::Function,
        ];
        let mismatch = failure_of(match_tokens(&grammar, rule, with_eoi(&input)).expect("match"));
        assert!(mismatch.is_ambiguous);
        assert_eq!(
            mismatch.expected_alternatives,
            vec!["keyword nothrow", "keyword read"]
        );
    }

    #[test]
    fn mismatch_after_disambiguating_token_reports_that_path_only() {
        let (grammar, rule) = build(intrinsic_operator);
        for (third, expected) in [
            (Keyword::Nothrow, "keyword fn"),
            (Keyword::ReadOnly, "keyword var"),
        ] {
            let input = [Keyword::Intrinsic, Keyword::Operator, third, Keyword::Class];
            let mismatch =
                failure_of(match_tokens(&grammar, rule, with_eoi(&input)).expect("match"));
            assert!(!mismatch.is_ambiguous);
            assert_eq!(mismatch.expected_alternatives, vec![expected]);
            assert_eq!(mismatch.actual, Token::keyword(Keyword::Class));
        }
    }

    #[test]
    fn mismatch_before_any_ambiguity() {
        let (grammar, rule) = build(intrinsic_operator);
        let mismatch = failure_of(
            match_tokens(&grammar, rule, with_eoi(&[Keyword::Class])).expect("match"),
        );
        assert_eq!(mismatch.expected_alternatives, vec!["keyword intrinsic"]);
        assert_eq!(mismatch.actual, Token::keyword(Keyword::Class));
    }

    fn nested_either_of(g: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        g.sequence(|s| {
            s.either_of(|e| {
                e.sequence(|s| {
                    s.either_of(|e| {
                        e.local_keyword("b").local_keyword("c");
                    })
                    .local_keyword("d");
                });
                e.sequence(|s| {
                    s.local_keyword("b").local_keyword("e");
                });
            })
            .end_of_input();
        })
        .flatten(g)
    }

    #[test]
    fn nested_either_of_keeps_other_branches_alive() {
        let (grammar, rule) = build(nested_either_of);
        let mut tokens = identifiers("b e");
        tokens.push(eoi());
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, tokens).expect("match")),
            vec![ident("b"), ident("e")]
        );
    }

    #[test]
    fn nested_either_of_does_not_backtrack_after_resolution() {
        let (grammar, rule) = build(nested_either_of);
        let mut tokens = identifiers("c a");
        tokens.push(eoi());
        let mismatch = failure_of(match_tokens(&grammar, rule, tokens).expect("match"));
        assert_eq!(mismatch.expected_alternatives, vec!["identifier d"]);
        assert_eq!(mismatch.actual, Token::identifier("a"));
    }

    #[test]
    fn optional_prefix() {
        let (grammar, rule) = build(|g| {
            g.sequence(|s| {
                s.optional(|o| {
                    o.either_of(|e| {
                        e.local_keyword("preA").local_keyword("preB");
                    });
                })
                .local_keyword("a")
                .end_of_input();
            })
            .flatten(g)
        });
        let mut tokens = identifiers("preA a");
        tokens.push(eoi());
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, tokens).expect("match")),
            vec![ident("preA"), ident("a")]
        );
    }

    #[test]
    fn ambiguity_introduced_by_optional_prefixes() {
        let (grammar, rule) = build(|g| {
            g.sequence(|s| {
                s.either_of(|e| {
                    e.sequence(|s| {
                        s.optional(|o| {
                            o.either_of(|e| {
                                e.local_keyword("preA").local_keyword("preB");
                            });
                        })
                        .local_keyword("a");
                    });
                    e.sequence(|s| {
                        s.optional(|o| {
                            o.either_of(|e| {
                                e.local_keyword("preA").local_keyword("preC");
                            });
                        })
                        .local_keyword("b");
                    });
                })
                .end_of_input();
            })
            .flatten(g)
        });
        let mut tokens = identifiers("preA b");
        tokens.push(eoi());
        assert_eq!(
            success_kinds(match_tokens(&grammar, rule, tokens).expect("match")),
            vec![ident("preA"), ident("b")]
        );
    }

    fn shared_value_expression(g: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        let value_expr = g.either_of(|e| {
            e.local_keyword("literal").local_keyword("identifier");
        });
        let value_expr = value_expr.named(g, "value expression");
        let binary_expr = g.sequence(|s| {
            s.refer(value_expr).local_keyword("binary operator");
        });
        let binary_expr = binary_expr.named(g, "binary expression");
        g.either_of(|e| {
            e.refer(binary_expr).refer(value_expr);
        })
        .named(g, "expression")
        .flatten(g)
    }

    #[test]
    fn shared_occurrence_completes_once_and_unambiguously() {
        let (grammar, rule) = build(shared_value_expression);

        let tokens = vec![Token::identifier("identifier"), eoi()];
        let result = match_tokens(&grammar, rule, tokens).expect("match");
        assert!(!result.is_ambiguous());
        assert_eq!(success_kinds(result), vec![ident("identifier")]);

        // Without a following token the binary expression is not excluded yet.
        let result = match_tokens(&grammar, rule, identifiers("identifier")).expect("match");
        assert!(result.is_ambiguous());
        assert_eq!(success_kinds(result), vec![ident("identifier")]);
    }

    #[test]
    fn shared_occurrence_reports_each_expectation_once() {
        let (grammar, rule) = build(shared_value_expression);
        let mismatch = failure_of(match_tokens(&grammar, rule, identifiers("other")).expect("match"));
        assert_eq!(
            mismatch.expected_alternatives,
            vec!["identifier literal", "identifier identifier"]
        );
        assert!(mismatch.is_ambiguous);
    }

    #[test]
    fn recursive_rules_match_nested_input() {
        let mut builder = GrammarBuilder::new();
        let expr = builder.declare::<Value>("expr");
        let body = builder.either_of(|e| {
            e.sequence(|s| {
                s.operator(Operator::ParenOpen)
                    .refer(expr)
                    .operator(Operator::ParenClose);
            });
            e.identifier();
        });
        builder.define(expr, body).expect("define");
        let rule = builder.sequence(|s| {
            s.refer(expr).end_of_input();
        });
        let rule = rule.flatten(&mut builder);
        let grammar = builder.build().expect("grammar");

        let depth = 50;
        let mut tokens = vec![Token::operator(Operator::ParenOpen); depth];
        tokens.push(Token::identifier("x"));
        tokens.extend(vec![Token::operator(Operator::ParenClose); depth]);
        tokens.push(eoi());
        let kinds = success_kinds(match_tokens(&grammar, rule, tokens).expect("match"));
        assert_eq!(kinds.len(), depth * 2 + 1);

        let mut unbalanced = vec![Token::operator(Operator::ParenOpen); 3];
        unbalanced.push(Token::identifier("x"));
        unbalanced.push(eoi());
        let mismatch = failure_of(match_tokens(&grammar, rule, unbalanced).expect("match"));
        assert_eq!(mismatch.expected_alternatives, vec!["closing parenthesis"]);
    }

    fn parenthesised(g: &mut GrammarBuilder) -> Rule<Vec<Value>> {
        let expr = g.declare::<Value>("expr");
        let body = g.either_of(|e| {
            e.sequence(|s| {
                s.operator(Operator::ParenOpen)
                    .refer(expr)
                    .operator(Operator::ParenClose);
            });
            e.identifier();
        });
        g.define(expr, body).expect("define");
        g.sequence(|s| {
            s.refer(expr).end_of_input();
        })
        .flatten(g)
    }

    #[test]
    fn deeply_nested_input_builds_its_value_without_recursion() {
        let (grammar, rule) = build(parenthesised);
        let depth = 5_000;
        let mut tokens = vec![Token::operator(Operator::ParenOpen); depth];
        tokens.push(Token::identifier("x"));
        tokens.extend(vec![Token::operator(Operator::ParenClose); depth]);
        tokens.push(eoi());

        let result = match_tokens(&grammar, rule, tokens).expect("match");
        assert!(!result.is_ambiguous());
        let kinds = success_kinds(result);
        assert_eq!(kinds.len(), depth * 2 + 1);
        assert_eq!(kinds[depth], ident("x"));
    }

    #[test]
    fn long_repetitions_add_one_link_per_iteration() {
        let (grammar, rule) = build(|g| {
            g.sequence(|s| {
                s.repeating(|r| {
                    r.keyword(Keyword::If);
                })
                .end_of_input();
            })
            .flatten(g)
        });
        let count = 10_000;
        let mut matcher = Matcher::new(&grammar, rule);
        for _ in 0..count {
            assert!(matcher.step(Token::keyword(Keyword::If)));
        }
        assert_eq!(matcher.contexts.link_count(), count);
        assert!(matcher.step(eoi()));

        let kinds = success_kinds(matcher.finish().expect("finish"));
        assert_eq!(kinds, vec![kw(Keyword::If); count]);
    }

    #[test]
    fn resolved_choices_do_not_hide_later_ambiguity() {
        let (grammar, rule) = build(|g| {
            let tail = g.either_of(|e| {
                e.sequence(|s| {
                    s.keyword(Keyword::Set).keyword(Keyword::Else);
                });
                e.sequence(|s| {
                    s.keyword(Keyword::Set).keyword(Keyword::Export);
                });
            });
            g.either_of(|e| {
                e.sequence(|s| {
                    s.keyword(Keyword::If).keyword(Keyword::Var).refer(tail);
                });
                e.sequence(|s| {
                    s.keyword(Keyword::Class).keyword(Keyword::Var).refer(tail);
                });
            })
            .flatten(g)
        });
        let mut matcher = Matcher::new(&grammar, rule);
        assert!(matcher.step(Token::keyword(Keyword::If)));
        assert!(matcher.is_disambiguated());
        assert_eq!(matcher.resolved_contexts().len(), 1);
        assert!(matcher.step(Token::keyword(Keyword::Var)));
        assert!(matcher.step(Token::keyword(Keyword::Set)));
        assert!(!matcher.is_disambiguated());
        assert!(!matcher.step(Token::keyword(Keyword::Return)));
        assert_eq!(matcher.resolved_contexts().len(), 1);

        let mismatch = failure_of(matcher.finish().expect("finish"));
        assert!(mismatch.is_ambiguous);
        assert_eq!(
            mismatch.expected_alternatives,
            vec!["keyword else", "keyword export"]
        );
    }

    #[test]
    fn matching_is_deterministic() {
        let mut builder = GrammarBuilder::new();
        let rule = intrinsic_operator(&mut builder);
        let rule = rule.map_result(&mut builder, |items: Vec<Value>| {
            items
                .into_iter()
                .filter_map(Value::into_token)
                .map(|token| token.kind)
                .collect::<Vec<_>>()
        });
        let grammar = builder.build().expect("grammar");

        for input in [
            [
                Keyword::Intrinsic,
                Keyword::Operator,
                Keyword::Nothrow,
                Keyword::Function,
            ],
            [
                Keyword::Intrinsic,
                Keyword::Operator,
                Keyword::Pure,
                Keyword::Function,
            ],
        ] {
            let first = match_tokens(&grammar, rule, with_eoi(&input)).expect("match");
            let second = match_tokens(&grammar, rule, with_eoi(&input)).expect("match");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn independent_parses_share_a_grammar_across_threads() {
        let (grammar, rule) = build(intrinsic_operator);
        let grammar = &grammar;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|n| {
                    scope.spawn(move || {
                        let third = if n % 2 == 0 {
                            [Keyword::Nothrow, Keyword::Function]
                        } else {
                            [Keyword::ReadOnly, Keyword::Var]
                        };
                        let input = [Keyword::Intrinsic, Keyword::Operator, third[0], third[1]];
                        match_tokens(grammar, rule, with_eoi(&input))
                            .expect("match")
                            .is_success()
                    })
                })
                .collect();
            for handle in handles {
                assert!(handle.join().expect("thread"));
            }
        });
    }

    #[test]
    fn enhancement_hooks_apply_innermost_first() {
        let mut builder = GrammarBuilder::new();
        let import = builder.sequence(|s| {
            s.keyword(Keyword::Import).identifier();
        });
        let import = import.enhance_errors(
            &mut builder,
            |mismatch| mismatch.expects("identifier"),
            |mismatch| mismatch.with_hint("inner"),
        );
        let statement = builder.sequence(|s| {
            s.refer(import).operator(Operator::Semicolon);
        });
        let statement = statement.enhance_errors(
            &mut builder,
            |mismatch| mismatch.hint.is_some(),
            |mut mismatch| {
                let hint = mismatch.hint.take().unwrap_or_default();
                mismatch.with_hint(format!("{hint}, outer"))
            },
        );
        let rule = statement.flatten(&mut builder);
        let grammar = builder.build().expect("grammar");

        let tokens = vec![
            Token::keyword(Keyword::Import),
            Token::operator(Operator::Semicolon),
        ];
        let mismatch = failure_of(match_tokens(&grammar, rule, tokens).expect("match"));
        assert_eq!(mismatch.hint.as_deref(), Some("inner, outer"));

        // Mismatches outside the inner rule only pass the outer hook.
        let tokens = vec![Token::keyword(Keyword::Import), Token::identifier("io"), eoi()];
        let mismatch = failure_of(match_tokens(&grammar, rule, tokens).expect("match"));
        assert_eq!(mismatch.hint, None);
        assert_eq!(mismatch.expected_alternatives, vec!["operator ;"]);

        let tokens = vec![
            Token::keyword(Keyword::Import),
            Token::identifier("io"),
            Token::operator(Operator::Semicolon),
        ];
        assert!(match_tokens(&grammar, rule, tokens).expect("match").is_success());
    }

    #[test]
    fn ast_transformation_builds_typed_nodes() {
        #[derive(Debug, Clone, PartialEq)]
        struct Assignment {
            target: String,
        }

        let mut builder = GrammarBuilder::new();
        let rule = builder.sequence(|s| {
            s.keyword(Keyword::Set)
                .identifier()
                .operator(Operator::Assignment)
                .numeric_literal();
        });
        let rule = rule.ast_transformation(&mut builder, "assignment", |items| {
            items.next_keyword(Keyword::Set)?;
            let target = items.next_identifier()?;
            Ok(Assignment {
                target: target.as_identifier().unwrap_or_default().to_string(),
            })
        });
        let broken = builder.keyword(Keyword::Set);
        let broken = broken.ast_transformation(&mut builder, "broken", |items| {
            items.next_identifier().map(|_| ())
        });
        let grammar = builder.build().expect("grammar");

        let tokens = vec![
            Token::keyword(Keyword::Set),
            Token::identifier("x"),
            Token::operator(Operator::Assignment),
            Token::new(TokenKind::NumericLiteral("1".into()), Span::unknown()),
        ];
        let result = match_tokens(&grammar, rule, tokens).expect("match");
        assert_eq!(
            result.into_result().expect("success"),
            Assignment {
                target: "x".into()
            }
        );

        let error = match_tokens(&grammar, broken, keywords(&[Keyword::Set])).unwrap_err();
        assert!(matches!(
            error,
            TransformError::UnexpectedItem {
                building: "broken",
                ..
            }
        ));
    }

    #[test]
    fn expected_lists_what_live_paths_accept() {
        let (grammar, rule) = build(intrinsic_operator);
        let mut matcher = Matcher::new(&grammar, rule);
        assert!(matcher.step(Token::keyword(Keyword::Intrinsic)));
        assert!(matcher.step(Token::keyword(Keyword::Operator)));
        let expected: Vec<String> = matcher.expected().iter().map(ToString::to_string).collect();
        assert_eq!(expected, vec!["keyword nothrow", "keyword read"]);
        assert!(matcher.can_continue());
        assert!(!matcher.is_disambiguated());
    }
}
