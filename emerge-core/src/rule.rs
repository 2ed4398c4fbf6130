//! The grammar graph.
//!
//! Rules live in an arena owned by [`GrammarBuilder`] and are addressed by
//! [`RuleId`]. References make the graph cyclic; `build` validates it and
//! freezes it into an immutable [`Grammar`] that any number of parses can
//! share across threads.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::analysis;
use crate::diagnostic::ParsingMismatch;
use crate::error::{GrammarError, TransformError};
use crate::expected::{Expected, ExpectedToken};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed handle to a rule. `T` is the type of value the rule yields on
/// success.
pub struct Rule<T> {
    id: RuleId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Rule<T> {
    pub(crate) fn from_id(id: RuleId) -> Self {
        Rule {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(self) -> RuleId {
        self.id
    }
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Rule<T> {}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.id).finish()
    }
}

pub(crate) type MapFn = Arc<dyn Fn(Value) -> Result<Value, TransformError> + Send + Sync>;
pub(crate) type MismatchPredicate = Arc<dyn Fn(&ParsingMismatch) -> bool + Send + Sync>;
pub(crate) type MismatchRewrite = Arc<dyn Fn(ParsingMismatch) -> ParsingMismatch + Send + Sync>;

#[derive(Clone)]
pub(crate) enum RuleKind {
    Terminal(ExpectedToken),
    Sequence(Vec<RuleId>),
    EitherOf(Vec<RuleId>),
    Repeating {
        rule: RuleId,
        min: u32,
        max: Option<u32>,
    },
    /// Target is `None` between `declare` and `define`.
    Reference { target: Option<RuleId> },
    Transform { rule: RuleId, map: MapFn },
    Enhance {
        rule: RuleId,
        predicate: MismatchPredicate,
        rewrite: MismatchRewrite,
    },
}

impl RuleKind {
    fn label(&self) -> &'static str {
        match self {
            RuleKind::Terminal(_) => "terminal",
            RuleKind::Sequence(_) => "sequence",
            RuleKind::EitherOf(_) => "either-of",
            RuleKind::Repeating { .. } => "repeating",
            RuleKind::Reference { .. } => "reference",
            RuleKind::Transform { .. } => "transform",
            RuleKind::Enhance { .. } => "enhance",
        }
    }

    /// Rules this rule may start matching, in declaration order.
    pub(crate) fn children(&self) -> Vec<RuleId> {
        match self {
            RuleKind::Terminal(_) => Vec::new(),
            RuleKind::Sequence(rules) | RuleKind::EitherOf(rules) => rules.clone(),
            RuleKind::Repeating { rule, .. }
            | RuleKind::Transform { rule, .. }
            | RuleKind::Enhance { rule, .. } => vec![*rule],
            RuleKind::Reference { target } => target.iter().copied().collect(),
        }
    }

    /// Whether matching this rule involves choosing between paths.
    pub(crate) fn is_choice(&self) -> bool {
        matches!(self, RuleKind::EitherOf(_) | RuleKind::Repeating { .. })
    }
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Terminal(expected) => f.debug_tuple("Terminal").field(expected).finish(),
            RuleKind::Sequence(rules) => f.debug_tuple("Sequence").field(rules).finish(),
            RuleKind::EitherOf(rules) => f.debug_tuple("EitherOf").field(rules).finish(),
            RuleKind::Repeating { rule, min, max } => f
                .debug_struct("Repeating")
                .field("rule", rule)
                .field("min", min)
                .field("max", max)
                .finish(),
            RuleKind::Reference { target } => {
                f.debug_struct("Reference").field("target", target).finish()
            }
            RuleKind::Transform { rule, .. } => {
                f.debug_struct("Transform").field("rule", rule).finish_non_exhaustive()
            }
            RuleKind::Enhance { rule, .. } => {
                f.debug_struct("Enhance").field("rule", rule).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RuleNode {
    pub kind: RuleKind,
    pub name: Option<String>,
}

/// Mutable arena in which a grammar is assembled.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    nodes: Vec<RuleNode>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push<T>(&mut self, kind: RuleKind) -> Rule<T> {
        let id = RuleId(self.nodes.len() as u32);
        self.nodes.push(RuleNode { kind, name: None });
        Rule::from_id(id)
    }

    /// Creates a named placeholder for a rule that is defined later,
    /// which is how recursive rules are written.
    pub fn declare<T>(&mut self, name: &str) -> Rule<T> {
        let rule = self.push(RuleKind::Reference { target: None });
        self.named(rule, name)
    }

    pub fn define<T>(&mut self, declared: Rule<T>, rule: Rule<T>) -> Result<(), GrammarError> {
        let name = self.describe(declared.id);
        let node = &mut self.nodes[declared.id.index()];
        match &mut node.kind {
            RuleKind::Reference { target: Some(_) } => Err(GrammarError::AlreadyDefined { name }),
            RuleKind::Reference { target } => {
                *target = Some(rule.id);
                Ok(())
            }
            _ => Err(GrammarError::NotAReference { name }),
        }
    }

    /// Attaches a name used in logs and construction errors.
    pub fn named<T>(&mut self, rule: Rule<T>, name: &str) -> Rule<T> {
        self.nodes[rule.id.index()].name = Some(name.to_string());
        rule
    }

    fn describe(&self, id: RuleId) -> String {
        describe(&self.nodes, id)
    }

    /// Validates the graph and freezes it.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        let nodes = self.nodes;
        for (index, node) in nodes.iter().enumerate() {
            let id = RuleId(index as u32);
            match &node.kind {
                RuleKind::EitherOf(alternatives) if alternatives.is_empty() => {
                    return Err(GrammarError::EmptyEitherOf {
                        rule: describe(&nodes, id),
                    });
                }
                RuleKind::Repeating {
                    min,
                    max: Some(max),
                    ..
                } if min > max => {
                    return Err(GrammarError::InvalidRepetitionBounds {
                        rule: describe(&nodes, id),
                        min: *min,
                        max: *max,
                    });
                }
                RuleKind::Reference { target: None } => {
                    return Err(GrammarError::UndefinedReference {
                        name: describe(&nodes, id),
                    });
                }
                _ => {}
            }
        }

        let nullable = analysis::nullable(&nodes);
        if let Some(id) = analysis::find_left_recursion(&nodes, &nullable) {
            return Err(GrammarError::LeftRecursion {
                rule: describe(&nodes, id),
            });
        }

        let grammar = Grammar { nodes, nullable };
        grammar.log_nondeterministic_choices();
        debug!(rules = grammar.nodes.len(), "grammar built");
        Ok(grammar)
    }
}

fn describe(nodes: &[RuleNode], id: RuleId) -> String {
    let node = &nodes[id.index()];
    match &node.name {
        Some(name) => name.clone(),
        None => format!("{} {id}", node.kind.label()),
    }
}

/// An immutable, validated grammar.
#[derive(Debug)]
pub struct Grammar {
    nodes: Vec<RuleNode>,
    nullable: Vec<bool>,
}

impl Grammar {
    pub(crate) fn kind(&self, id: RuleId) -> &RuleKind {
        &self.nodes[id.index()].kind
    }

    pub fn name(&self, id: RuleId) -> Option<&str> {
        self.nodes[id.index()].name.as_deref()
    }

    pub fn describe(&self, id: RuleId) -> String {
        describe(&self.nodes, id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the rule can succeed without consuming a token.
    pub fn is_nullable<T>(&self, rule: Rule<T>) -> bool {
        self.nullable[rule.id.index()]
    }

    /// The terminals that can accept the first token of the rule.
    pub fn first_set<T>(&self, rule: Rule<T>) -> Vec<Expected> {
        analysis::first_set(&self.nodes, &self.nullable, rule.id)
    }

    fn log_nondeterministic_choices(&self) {
        for (index, node) in self.nodes.iter().enumerate() {
            let RuleKind::EitherOf(alternatives) = &node.kind else {
                continue;
            };
            let firsts: Vec<Vec<Expected>> = alternatives
                .iter()
                .map(|alt| analysis::first_set(&self.nodes, &self.nullable, *alt))
                .collect();
            for (a, left) in firsts.iter().enumerate() {
                for right in &firsts[a + 1..] {
                    let overlaps = left
                        .iter()
                        .any(|l| right.iter().any(|r| l.could_match_same_token_as(r)));
                    if overlaps {
                        debug!(
                            rule = %self.describe(RuleId(index as u32)),
                            "alternatives share a first token; resolved while matching"
                        );
                    }
                }
            }
        }
    }
}
