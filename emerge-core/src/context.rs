//! Per-parse bookkeeping for rule occurrences.
//!
//! Every (rule, start position) pair gets exactly one [`ContextState`].
//! Callers waiting for an occurrence to complete are stored as
//! [`Continuation`] values on it; completions are recorded per end
//! position so that late callers can be served from the memo.

use std::collections::{BTreeMap, HashMap};

use crate::rule::RuleId;

/// Live paths are only ever compared against one, so counting stops here.
pub(crate) const PATH_COUNT_LIMIT: usize = 2;

/// Identifies one occurrence of a rule in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchingContext {
    pub rule: RuleId,
    /// Index of the first token the occurrence may consume.
    pub start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ContextId(usize);

/// A completed sub-match: the context and the position it ended at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Child {
    pub context: ContextId,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LinkId(usize);

/// One iteration of a repetition, chained to the iterations before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RepetitionLink {
    pub previous: Option<LinkId>,
    pub child: Child,
    /// Number of iterations up to and including this one.
    pub count: u32,
}

/// What a parent does once the child it started completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResumeState {
    /// Element `index` of a sequence; `children` holds the elements before it.
    Sequence { index: usize, children: Vec<Child> },
    Alternative(usize),
    /// The next iteration of a repetition; `previous` is the last one done.
    Repetition { previous: Option<LinkId> },
    /// References, transforms and enhancements complete with their inner rule.
    Delegate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Continuation {
    /// The rule the matcher was started with.
    Root,
    Resume { parent: ContextId, state: ResumeState },
}

/// One way an occurrence completed at a given end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Derivation {
    Token,
    Alternative { index: usize, child: Child },
    Children(Vec<Child>),
    /// The last iteration of a repetition, `None` for zero iterations.
    Repetition(Option<LinkId>),
    Inner(Child),
}

/// The token that left a choice with a single live path.
///
/// Marks are informational: they are exposed through
/// [`Matcher::resolved_contexts`](crate::matcher::Matcher::resolved_contexts)
/// and logged. Mismatches are attributed from the live-path count, which
/// already excludes every branch a mark could rule out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub token_index: usize,
}

#[derive(Debug)]
pub(crate) struct ContextState {
    pub key: MatchingContext,
    pub parents: Vec<Continuation>,
    pub completions: BTreeMap<usize, Vec<Derivation>>,
    pub resolved_by: Option<Resolution>,
    /// Paths from the root to this context, saturated at [`PATH_COUNT_LIMIT`].
    pub paths: usize,
    /// Contexts with a continuation into this one, once per continuation.
    dependents: Vec<ContextId>,
}

impl ContextState {
    /// Records the resolving token once; later calls keep the first.
    /// Returns whether the mark was new.
    pub fn mark_as_removing_ambiguity(&mut self, token_index: usize) -> bool {
        if self.resolved_by.is_some() {
            return false;
        }
        self.resolved_by = Some(Resolution { token_index });
        true
    }

    /// Records a derivation; returns whether it is the first one for `end`.
    pub fn record(&mut self, end: usize, derivation: Derivation) -> bool {
        let derivations = self.completions.entry(end).or_default();
        let first = derivations.is_empty();
        if !derivations.contains(&derivation) {
            derivations.push(derivation);
        }
        first
    }
}

#[derive(Debug, Default)]
pub(crate) struct ContextTable {
    states: Vec<ContextState>,
    index: HashMap<MatchingContext, ContextId>,
    links: Vec<RepetitionLink>,
}

impl ContextTable {
    /// Returns the context for `key` and whether it was just created.
    pub fn get_or_insert(&mut self, key: MatchingContext) -> (ContextId, bool) {
        if let Some(id) = self.index.get(&key) {
            return (*id, false);
        }
        let id = ContextId(self.states.len());
        self.states.push(ContextState {
            key,
            parents: Vec::new(),
            completions: BTreeMap::new(),
            resolved_by: None,
            paths: 0,
            dependents: Vec::new(),
        });
        self.index.insert(key, id);
        (id, true)
    }

    /// Adds a caller waiting on `context` and raises the path count of
    /// `context` and of every context below it.
    ///
    /// Counts only grow and saturate, so each context is updated at most
    /// [`PATH_COUNT_LIMIT`] times over a whole parse.
    pub fn add_parent(&mut self, context: ContextId, continuation: Continuation) {
        let added = match &continuation {
            Continuation::Root => 1,
            Continuation::Resume { parent, .. } => {
                let parent = &mut self.states[parent.0];
                parent.dependents.push(context);
                parent.paths
            }
        };
        self.states[context.0].parents.push(continuation);

        let mut work = vec![(context, added)];
        while let Some((id, added)) = work.pop() {
            let state = &mut self.states[id.0];
            let paths = (state.paths + added).min(PATH_COUNT_LIMIT);
            let increase = paths - state.paths;
            if increase == 0 {
                continue;
            }
            state.paths = paths;
            work.extend(state.dependents.iter().map(|dependent| (*dependent, increase)));
        }
    }

    pub fn lookup(&self, key: MatchingContext) -> Option<ContextId> {
        self.index.get(&key).copied()
    }

    pub fn get(&self, id: ContextId) -> &ContextState {
        &self.states[id.0]
    }

    pub fn get_mut(&mut self, id: ContextId) -> &mut ContextState {
        &mut self.states[id.0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextState> {
        self.states.iter()
    }

    pub fn push_link(&mut self, link: RepetitionLink) -> LinkId {
        self.links.push(link);
        LinkId(self.links.len() - 1)
    }

    pub fn link(&self, id: LinkId) -> &RepetitionLink {
        &self.links[id.0]
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// The iterations ending in `last`, first to last.
    pub fn iterations(&self, last: Option<LinkId>) -> Vec<Child> {
        let mut children = Vec::new();
        let mut current = last;
        while let Some(id) = current {
            let link = self.link(id);
            children.push(link.child);
            current = link.previous;
        }
        children.reverse();
        children
    }
}
