//! The clause tree built by the parser and annotated by the evaluator.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Node `0` is
//! the root; its `down` is the first phrase of the statement. Siblings at one
//! nesting level are chained through `left`/`right`, and each sibling's `up`
//! is the node whose `down` opened the level. A node with a `down` is a group
//! (a parenthesized statement); a node without one is a leaf phrase.
//!
//! Evaluation state is kept beside the nodes: answers in [`WhereResult`]
//! slots and candidate restrictions in [`WhereConstraint`] slots, so that
//! several nodes can share one slot without aliasing.

use std::fmt;

use crate::lexer::Keyword;
use crate::recordset::RecordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    /// `a nor b` keeps the records of `a` that are not in `b`.
    Nor,
}

impl Operator {
    pub fn from_keyword(keyword: Keyword) -> Option<Operator> {
        match keyword {
            Keyword::And => Some(Operator::And),
            Keyword::Or => Some(Operator::Or),
            Keyword::Nor => Some(Operator::Nor),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Nor => "nor",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lower {
    From,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upper {
    To,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Is,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Before,
    After,
    Like,
    Starts,
    Present,
    Range(Lower, Upper),
}

impl Condition {
    pub fn single(keyword: Keyword) -> Option<Condition> {
        match keyword {
            Keyword::Is => Some(Condition::Is),
            Keyword::Eq => Some(Condition::Eq),
            Keyword::Ne => Some(Condition::Ne),
            Keyword::Lt => Some(Condition::Lt),
            Keyword::Le => Some(Condition::Le),
            Keyword::Gt => Some(Condition::Gt),
            Keyword::Ge => Some(Condition::Ge),
            Keyword::Before => Some(Condition::Before),
            Keyword::After => Some(Condition::After),
            Keyword::Like => Some(Condition::Like),
            Keyword::Starts => Some(Condition::Starts),
            Keyword::Present => Some(Condition::Present),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Condition::Is => "is",
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Lt => "lt",
            Condition::Le => "le",
            Condition::Gt => "gt",
            Condition::Ge => "ge",
            Condition::Before => "before",
            Condition::After => "after",
            Condition::Like => "like",
            Condition::Starts => "starts",
            Condition::Present => "present",
            Condition::Range(lower, upper) => {
                let lower = match lower {
                    Lower::From => "from",
                    Lower::Above => "above",
                };
                let upper = match upper {
                    Upper::To => "to",
                    Upper::Below => "below",
                };
                return write!(f, "{lower} {upper}");
            }
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Single(String),
    Range(String, String),
}

impl Value {
    pub fn single(&self) -> Option<&str> {
        match self {
            Value::Single(v) => Some(v),
            Value::Range(..) => None,
        }
    }
}

// ------------- Evaluation slots -------------
/// An answer; `None` means not evaluated yet, which is not the same as empty.
#[derive(Debug, Clone, Default)]
pub struct WhereResult {
    pub answer: Option<RecordSet>,
}

/// A restriction on the records a scanned condition needs to look at.
#[derive(Debug, Clone, Default)]
pub struct WhereConstraint {
    pub result: Option<RecordSet>,
    /// Some member of the run is still waiting on a scan.
    pub pending: bool,
}

// ------------- Clause -------------
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) up: Option<NodeId>,
    pub(crate) down: Option<NodeId>,
    pub(crate) operator: Option<Operator>,
    pub(crate) field: Option<String>,
    pub(crate) condition: Option<Condition>,
    pub(crate) value: Option<Value>,
    pub(crate) not_phrase: bool,
    pub(crate) not_condition: bool,
    pub(crate) not_value: bool,
    pub(crate) num: bool,
    pub(crate) alpha: bool,
    pub(crate) result: Option<ResultId>,
    pub(crate) constraint: Option<ConstraintId>,
    /// The result slot now holds the combination with the left sibling.
    pub(crate) combined: bool,
}

impl WhereClause {
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }
    pub fn up(&self) -> Option<NodeId> {
        self.up
    }
    pub fn down(&self) -> Option<NodeId> {
        self.down
    }
    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
    pub fn condition(&self) -> Option<Condition> {
        self.condition
    }
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
    pub fn not_phrase(&self) -> bool {
        self.not_phrase
    }
    pub fn not_condition(&self) -> bool {
        self.not_condition
    }
    pub fn not_value(&self) -> bool {
        self.not_value
    }
    pub fn num(&self) -> bool {
        self.num
    }
    pub fn alpha(&self) -> bool {
        self.alpha
    }
    pub fn is_leaf(&self) -> bool {
        self.down.is_none()
    }
    /// Exactly one of the phrase and condition negations is set.
    pub fn inverted(&self) -> bool {
        self.not_phrase != self.not_condition
    }
}

// ------------- ClauseTree -------------
#[derive(Debug, Clone)]
pub struct ClauseTree {
    nodes: Vec<WhereClause>,
    results: Vec<WhereResult>,
    constraints: Vec<WhereConstraint>,
}

impl Default for ClauseTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ClauseTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![WhereClause::default()],
            results: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].down.is_none()
    }

    pub fn node(&self, id: NodeId) -> &WhereClause {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut WhereClause {
        &mut self.nodes[id.0]
    }

    pub(crate) fn add(&mut self, clause: WhereClause) -> NodeId {
        self.nodes.push(clause);
        NodeId(self.nodes.len() - 1)
    }

    /// Every node: a node, then its nested level, then its right siblings.
    pub fn walk_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = self.node(id);
            if let Some(right) = node.right {
                stack.push(right);
            }
            if let Some(down) = node.down {
                stack.push(down);
            }
        }
        order
    }

    /// The node and its right siblings.
    pub fn siblings(&self, first: NodeId) -> Vec<NodeId> {
        let mut run = vec![first];
        let mut current = first;
        while let Some(right) = self.node(current).right {
            run.push(right);
            current = right;
        }
        run
    }

    /// The node whose `down` opened the level `id` is on.
    pub fn get_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            let node = self.node(current);
            match (node.up, node.left) {
                (Some(up), _) => return up,
                (None, Some(left)) => current = left,
                (None, None) => return current,
            }
        }
    }

    // ------------- evaluation slots -------------
    pub(crate) fn clear_evaluation(&mut self) {
        self.results.clear();
        self.constraints.clear();
        for node in &mut self.nodes {
            node.result = None;
            node.constraint = None;
            node.combined = false;
        }
    }

    pub(crate) fn new_result(&mut self, answer: Option<RecordSet>) -> ResultId {
        self.results.push(WhereResult { answer });
        ResultId(self.results.len() - 1)
    }

    pub(crate) fn result(&self, id: ResultId) -> &WhereResult {
        &self.results[id.0]
    }

    pub(crate) fn result_mut(&mut self, id: ResultId) -> &mut WhereResult {
        &mut self.results[id.0]
    }

    pub(crate) fn new_constraint(&mut self) -> ConstraintId {
        self.constraints.push(WhereConstraint::default());
        ConstraintId(self.constraints.len() - 1)
    }

    pub(crate) fn constraint(&self, id: ConstraintId) -> &WhereConstraint {
        &self.constraints[id.0]
    }

    pub(crate) fn constraint_mut(&mut self, id: ConstraintId) -> &mut WhereConstraint {
        &mut self.constraints[id.0]
    }

    /// The answer held for a node, if it has been evaluated.
    pub fn answer(&self, id: NodeId) -> Option<&RecordSet> {
        self.node(id)
            .result
            .and_then(|r| self.result(r).answer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut ClauseTree, up: NodeId, left: Option<NodeId>, field: &str) -> NodeId {
        let id = tree.add(WhereClause {
            up: Some(up),
            left,
            field: Some(field.into()),
            operator: left.map(|_| Operator::Or),
            ..WhereClause::default()
        });
        match left {
            Some(left) => tree.node_mut(left).right = Some(id),
            None => tree.node_mut(up).down = Some(id),
        }
        id
    }

    #[test]
    fn walk_order_goes_down_before_right() {
        let mut tree = ClauseTree::new();
        let group = tree.add(WhereClause {
            up: Some(NodeId::ROOT),
            ..WhereClause::default()
        });
        tree.node_mut(NodeId::ROOT).down = Some(group);
        let a = leaf(&mut tree, group, None, "a");
        let b = leaf(&mut tree, group, Some(a), "b");
        let c = leaf(&mut tree, NodeId::ROOT, Some(group), "c");
        assert_eq!(tree.walk_order(), vec![NodeId::ROOT, group, a, b, c]);
        assert_eq!(tree.siblings(a), vec![a, b]);
        assert_eq!(tree.get_root(b), group);
        assert_eq!(tree.get_root(c), NodeId::ROOT);
    }

    #[test]
    fn slots_are_cleared() {
        let mut tree = ClauseTree::new();
        let slot = tree.new_result(Some(RecordSet::default()));
        tree.node_mut(NodeId::ROOT).result = Some(slot);
        assert!(tree.answer(NodeId::ROOT).is_some());
        tree.clear_evaluation();
        assert!(tree.answer(NodeId::ROOT).is_none());
    }
}
