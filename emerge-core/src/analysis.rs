//! Static properties of the grammar graph, computed once at build time.

use std::collections::HashSet;

use crate::expected::Expected;
use crate::rule::{RuleId, RuleKind, RuleNode};

/// For every rule, whether it can succeed without consuming a token.
pub(crate) fn nullable(nodes: &[RuleNode]) -> Vec<bool> {
    let mut nullable = vec![false; nodes.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, node) in nodes.iter().enumerate() {
            if nullable[index] {
                continue;
            }
            let is_nullable = match &node.kind {
                RuleKind::Terminal(_) => false,
                RuleKind::Sequence(rules) => rules.iter().all(|rule| nullable[rule.index()]),
                RuleKind::EitherOf(rules) => rules.iter().any(|rule| nullable[rule.index()]),
                RuleKind::Repeating { rule, min, .. } => *min == 0 || nullable[rule.index()],
                RuleKind::Reference { target } => {
                    target.is_some_and(|target| nullable[target.index()])
                }
                RuleKind::Transform { rule, .. } | RuleKind::Enhance { rule, .. } => {
                    nullable[rule.index()]
                }
            };
            if is_nullable {
                nullable[index] = true;
                changed = true;
            }
        }
    }
    nullable
}

/// Rules that may be started at the same position as `node`.
fn leading(node: &RuleNode, nullable: &[bool]) -> Vec<RuleId> {
    match &node.kind {
        RuleKind::Sequence(rules) => {
            let mut leading = Vec::new();
            for rule in rules {
                leading.push(*rule);
                if !nullable[rule.index()] {
                    break;
                }
            }
            leading
        }
        RuleKind::Repeating { max: Some(0), .. } => Vec::new(),
        kind => kind.children(),
    }
}

pub(crate) fn first_set(nodes: &[RuleNode], nullable: &[bool], rule: RuleId) -> Vec<Expected> {
    let mut first = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![rule];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let node = &nodes[id.index()];
        if let RuleKind::Terminal(token) = &node.kind {
            first.push(Expected {
                origin: id,
                token: token.clone(),
            });
            continue;
        }
        // Reversed so that the stack yields them in declaration order.
        stack.extend(leading(node, nullable).into_iter().rev());
    }
    first
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Finds a rule that can reach itself without consuming a token.
/// Named rules on the cycle are preferred for reporting.
pub(crate) fn find_left_recursion(nodes: &[RuleNode], nullable: &[bool]) -> Option<RuleId> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    (0..nodes.len()).find_map(|index| {
        visit(
            RuleId(index as u32),
            nodes,
            nullable,
            &mut marks,
            &mut path,
        )
    })
}

fn visit(
    id: RuleId,
    nodes: &[RuleNode],
    nullable: &[bool],
    marks: &mut [Mark],
    path: &mut Vec<RuleId>,
) -> Option<RuleId> {
    match marks[id.index()] {
        Mark::Done => return None,
        Mark::Active => {
            let start = path.iter().position(|on_path| *on_path == id).unwrap_or(0);
            let named = path[start..]
                .iter()
                .copied()
                .find(|on_path| nodes[on_path.index()].name.is_some());
            return Some(named.unwrap_or(id));
        }
        Mark::Unvisited => {}
    }

    marks[id.index()] = Mark::Active;
    path.push(id);
    for next in leading(&nodes[id.index()], nullable) {
        if let Some(found) = visit(next, nodes, nullable, marks, path) {
            return Some(found);
        }
    }
    path.pop();
    marks[id.index()] = Mark::Done;
    None
}
