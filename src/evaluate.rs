//! Two-phase evaluation of a clause tree against a [`Datasource`].
//!
//! Phase 1 resolves every leaf an index can answer and combines each level
//! whose members are all resolved. Along the way every run of `and`/`nor`
//! siblings narrows a shared [`WhereConstraint`] to the records the run can
//! still match, starting from the constraint of the enclosing run. Phase 2
//! scans, once, the union of the constraints of the leaves left over and
//! tests each leaf only against records inside its own constraint. A final
//! pass combines whatever phase 1 could not.
//!
//! A leaf's scanned answer is exact only inside its constraint. That is
//! enough: outside it the run is already excluded by its resolved members or
//! by an enclosing run, so the combined answer equals a full scan.

use std::collections::HashMap;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, trace};

use crate::clause::{ClauseTree, Condition, ConstraintId, NodeId, Operator, Value};
use crate::datasource::{Datasource, KeyRange};
use crate::error::{Result, WhereError};
use crate::parser::like_pattern;
use crate::recordset::{RecordNumber, RecordSet};

fn invariant(message: &str) -> WhereError {
    WhereError::Invariant(message.to_string())
}

// ------------- Predicates for scanned leaves -------------
#[derive(Debug)]
enum Predicate {
    Equal(String),
    NotEqual(String),
    Compare(KeyRange),
    Pattern(Regex),
    Prefix(String),
    Present,
}

impl Predicate {
    fn for_leaf(condition: Condition, value: Option<&Value>, not_value: bool) -> Result<Predicate> {
        let single = || {
            value
                .and_then(Value::single)
                .map(str::to_string)
                .ok_or_else(|| invariant("condition without a value"))
        };
        Ok(match condition {
            Condition::Present => Predicate::Present,
            Condition::Is if not_value => Predicate::NotEqual(single()?),
            Condition::Is | Condition::Eq => Predicate::Equal(single()?),
            Condition::Ne => Predicate::NotEqual(single()?),
            Condition::Starts => Predicate::Prefix(single()?),
            Condition::Like => {
                let pattern = single()?;
                let regex = like_pattern(&pattern).map_err(|e| WhereError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Predicate::Pattern(regex)
            }
            _ => {
                let value = value.ok_or_else(|| invariant("condition without a value"))?;
                let range = KeyRange::for_condition(condition, value)
                    .ok_or_else(|| invariant("comparison without bounds"))?;
                Predicate::Compare(range)
            }
        })
    }

    /// True when any occurrence satisfies the predicate.
    fn matches(&self, values: &[String]) -> bool {
        match self {
            Predicate::Present => !values.is_empty(),
            Predicate::Equal(v) => values.iter().any(|x| x == v),
            Predicate::NotEqual(v) => values.iter().any(|x| x != v),
            Predicate::Compare(range) => values.iter().any(|x| range.contains(x)),
            Predicate::Pattern(regex) => values.iter().any(|x| regex.is_match(x)),
            Predicate::Prefix(p) => values.iter().any(|x| x.starts_with(p.as_str())),
        }
    }
}

// ------------- Evaluator -------------
pub struct Evaluator<'a, D: Datasource + ?Sized> {
    datasource: &'a D,
    scope: &'a str,
    use_indexes: bool,
}

impl<'a, D: Datasource + ?Sized> Evaluator<'a, D> {
    pub fn new(datasource: &'a D, scope: &'a str) -> Self {
        Self {
            datasource,
            scope,
            use_indexes: true,
        }
    }

    /// With `false` every leaf is resolved by scanning.
    pub fn use_indexes(mut self, use_indexes: bool) -> Self {
        self.use_indexes = use_indexes;
        self
    }

    /// Evaluate `tree`, leaving the answer on its root.
    pub fn evaluate(&self, tree: &mut ClauseTree) -> Result<RecordSet> {
        let started = Instant::now();
        tree.clear_evaluation();
        if tree.is_empty() {
            return self.datasource.empty_set(self.scope);
        }
        let existence = self.datasource.full_existence(self.scope)?;
        let mut evaluation = Evaluation {
            datasource: self.datasource,
            scope: self.scope,
            use_indexes: self.use_indexes,
            tree,
            existence,
            pending: Vec::new(),
        };
        let root = NodeId::ROOT;
        let slot = evaluation.tree.new_result(None);
        evaluation.tree.node_mut(root).result = Some(slot);

        evaluation.index_level(root, None)?;
        if evaluation.tree.answer(root).is_none() {
            evaluation.scan()?;
            evaluation.result_level(root)?;
        }
        let answer = evaluation
            .tree
            .answer(root)
            .cloned()
            .ok_or_else(|| invariant("statement has no answer"))?;
        debug!(
            us = started.elapsed().as_micros() as u64,
            records = answer.count(),
            "evaluated"
        );
        Ok(answer)
    }
}

struct Evaluation<'a, 't, D: Datasource + ?Sized> {
    datasource: &'a D,
    scope: &'a str,
    use_indexes: bool,
    tree: &'t mut ClauseTree,
    existence: RecordSet,
    /// Leaves phase 1 could not resolve.
    pending: Vec<NodeId>,
}

impl<D: Datasource + ?Sized> Evaluation<'_, '_, D> {
    fn empty(&self) -> RecordSet {
        RecordSet::new(self.existence.segment_size())
    }

    fn members(&self, parent: NodeId) -> Result<Vec<NodeId>> {
        let first = self
            .tree
            .node(parent)
            .down()
            .ok_or_else(|| invariant("group without phrases"))?;
        Ok(self.tree.siblings(first))
    }

    fn constraint_of(&self, node: NodeId) -> Result<ConstraintId> {
        self.tree
            .node(node)
            .constraint
            .ok_or_else(|| invariant("node without constraint"))
    }

    fn set_answer(&mut self, node: NodeId, answer: RecordSet) -> Result<()> {
        let slot = self
            .tree
            .node(node)
            .result
            .ok_or_else(|| invariant("node without result slot"))?;
        self.tree.result_mut(slot).answer = Some(answer);
        Ok(())
    }

    fn invert_if(&self, inverted: bool, answer: RecordSet) -> RecordSet {
        if inverted {
            self.existence.difference(&answer)
        } else {
            answer
        }
    }

    // ------------- phase 1 -------------
    fn index_level(&mut self, parent: NodeId, inherited: Option<RecordSet>) -> Result<()> {
        let members = self.members(parent)?;
        for &n in &members {
            let node = self.tree.node(n);
            let shared = match (node.operator(), node.left()) {
                (Some(Operator::And | Operator::Nor), Some(left)) => {
                    self.tree.node(left).constraint
                }
                _ => None,
            };
            let constraint = match shared {
                Some(c) => c,
                None => {
                    let c = self.tree.new_constraint();
                    self.tree.constraint_mut(c).result = inherited.clone();
                    c
                }
            };
            let slot = self.tree.new_result(None);
            let node = self.tree.node_mut(n);
            node.constraint = Some(constraint);
            node.result = Some(slot);
        }

        for &n in &members {
            if !self.tree.node(n).is_leaf() {
                continue;
            }
            if let Some(found) = self.lookup(n)? {
                let answer = self.invert_if(self.tree.node(n).inverted(), found);
                self.set_answer(n, answer)?;
                self.restrict(n)?;
            }
        }

        for &n in members.iter().rev() {
            if self.tree.node(n).is_leaf() {
                continue;
            }
            let c = self.constraint_of(n)?;
            let restriction = self.tree.constraint(c).result.clone();
            if restriction.as_ref().is_some_and(RecordSet::is_empty) {
                trace!(node = n.index(), "group skipped, no candidate records");
                let empty = self.empty();
                self.set_answer(n, empty)?;
                continue;
            }
            self.index_level(n, restriction)?;
            if self.tree.answer(n).is_some() {
                self.restrict(n)?;
            }
        }

        let mut complete = true;
        for &n in &members {
            if self.tree.answer(n).is_some() {
                continue;
            }
            let c = self.constraint_of(n)?;
            let emptied = self
                .tree
                .constraint(c)
                .result
                .as_ref()
                .is_some_and(RecordSet::is_empty);
            if emptied && self.tree.node(n).is_leaf() {
                let empty = self.empty();
                self.set_answer(n, empty)?;
                continue;
            }
            complete = false;
            self.tree.constraint_mut(c).pending = true;
            if self.tree.node(n).is_leaf() {
                self.pending.push(n);
            }
        }
        if complete {
            self.combine(parent, &members)?;
        }
        Ok(())
    }

    /// Narrow the run constraint of a resolved node by what it lets through.
    fn restrict(&mut self, n: NodeId) -> Result<()> {
        let c = self.constraint_of(n)?;
        let answer = self
            .tree
            .answer(n)
            .ok_or_else(|| invariant("restricting by an unresolved node"))?;
        let allowed = match self.tree.node(n).operator() {
            Some(Operator::Nor) => self.existence.difference(answer),
            _ => answer.clone(),
        };
        let constraint = self.tree.constraint_mut(c);
        match &mut constraint.result {
            Some(current) => current.intersect_with(&allowed),
            None => constraint.result = Some(allowed),
        }
        Ok(())
    }

    fn lookup(&self, n: NodeId) -> Result<Option<RecordSet>> {
        if !self.use_indexes {
            return Ok(None);
        }
        let node = self.tree.node(n);
        let (Some(field), Some(condition), Some(value)) =
            (node.field(), node.condition(), node.value())
        else {
            return Ok(None);
        };
        let found = match (condition, value) {
            (Condition::Is, Value::Single(_)) if node.not_value() => None,
            (Condition::Is | Condition::Eq, Value::Single(v)) => {
                self.datasource.lookup_equal(self.scope, field, v)?
            }
            (Condition::Like, Value::Single(v)) => match like_pattern(v) {
                Ok(regex) => self.datasource.lookup_pattern(self.scope, field, &regex)?,
                // reported by the scan
                Err(_) => None,
            },
            (Condition::Starts, Value::Single(v)) => {
                self.datasource.lookup_prefix(self.scope, field, v)?
            }
            (Condition::Ne | Condition::Present, _) => None,
            _ => match KeyRange::for_condition(condition, value) {
                Some(range) => self.datasource.lookup_range(self.scope, field, &range)?,
                None => None,
            },
        };
        trace!(
            field,
            condition = %condition,
            indexed = found.is_some(),
            "index lookup"
        );
        Ok(found)
    }

    // ------------- phase 2 -------------
    fn scan(&mut self) -> Result<()> {
        let leaves = std::mem::take(&mut self.pending);
        if leaves.is_empty() {
            return Ok(());
        }
        let mut predicates = Vec::with_capacity(leaves.len());
        let mut constraints = Vec::with_capacity(leaves.len());
        for &n in &leaves {
            let node = self.tree.node(n);
            let field = node
                .field()
                .ok_or_else(|| invariant("leaf without field"))?
                .to_string();
            let condition = node
                .condition()
                .ok_or_else(|| invariant("leaf without condition"))?;
            let predicate = Predicate::for_leaf(condition, node.value(), node.not_value())?;
            predicates.push((field, predicate));
            constraints.push(self.constraint_of(n)?);
        }

        let mut candidates = Some(self.empty());
        let mut seen = Vec::new();
        for &c in &constraints {
            if seen.contains(&c) {
                continue;
            }
            seen.push(c);
            match (&mut candidates, &self.tree.constraint(c).result) {
                (Some(union), Some(restriction)) => union.union_with(restriction),
                _ => {
                    candidates = None;
                    break;
                }
            }
        }
        let candidates = candidates.unwrap_or_else(|| self.existence.clone());
        debug!(
            nodes = leaves.len(),
            candidates = candidates.count(),
            "scanning records for conditions without an index"
        );

        let mut matches: Vec<RecordSet> = leaves.iter().map(|_| self.empty()).collect();
        for record in &candidates {
            let mut values: HashMap<&str, Vec<String>> = HashMap::new();
            for (i, (field, predicate)) in predicates.iter().enumerate() {
                let inside = self
                    .tree
                    .constraint(constraints[i])
                    .result
                    .as_ref()
                    .is_none_or(|k| k.contains(record));
                if !inside {
                    continue;
                }
                if !values.contains_key(field.as_str()) {
                    let fetched = self.fetch(record, field)?;
                    values.insert(field.as_str(), fetched);
                }
                let occurrences = values.get(field.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                if predicate.matches(occurrences) {
                    matches[i].insert(record);
                }
            }
        }

        for (&n, found) in leaves.iter().zip(matches) {
            let answer = self.invert_if(self.tree.node(n).inverted(), found);
            self.set_answer(n, answer)?;
        }
        Ok(())
    }

    fn fetch(&self, record: RecordNumber, field: &str) -> Result<Vec<String>> {
        self.datasource.fetch_field_values(self.scope, record, field)
    }

    // ------------- combination -------------
    fn result_level(&mut self, parent: NodeId) -> Result<()> {
        if self.tree.answer(parent).is_some() {
            return Ok(());
        }
        let members = self.members(parent)?;
        for &n in &members {
            if !self.tree.node(n).is_leaf() {
                self.result_level(n)?;
            }
        }
        self.combine(parent, &members)
    }

    /// The node holding the running combination that `node` belongs to.
    fn representative(&self, mut node: NodeId) -> NodeId {
        while self.tree.node(node).combined {
            match self.tree.node(node).left() {
                Some(left) => node = left,
                None => break,
            }
        }
        node
    }

    fn combine(&mut self, parent: NodeId, members: &[NodeId]) -> Result<()> {
        for operator in [Operator::Nor, Operator::And, Operator::Or] {
            for &n in members {
                let node = self.tree.node(n);
                if node.operator() != Some(operator) || node.combined {
                    continue;
                }
                let left = node.left().ok_or_else(|| invariant("operator without left phrase"))?;
                let target = self.representative(left);
                let own = node.result.ok_or_else(|| invariant("node without result slot"))?;
                let into = self
                    .tree
                    .node(target)
                    .result
                    .ok_or_else(|| invariant("node without result slot"))?;
                let right = self
                    .tree
                    .result_mut(own)
                    .answer
                    .take()
                    .ok_or_else(|| invariant("combining an unresolved phrase"))?;
                let accumulated = self
                    .tree
                    .result_mut(into)
                    .answer
                    .as_mut()
                    .ok_or_else(|| invariant("combining into an unresolved phrase"))?;
                match operator {
                    Operator::And => accumulated.intersect_with(&right),
                    Operator::Or => accumulated.union_with(&right),
                    Operator::Nor => accumulated.remove_recordset(&right),
                }
                let node = self.tree.node_mut(n);
                node.result = Some(into);
                node.combined = true;
            }
        }
        self.answer(parent, members)
    }

    fn answer(&mut self, parent: NodeId, members: &[NodeId]) -> Result<()> {
        let first = *members.first().ok_or_else(|| invariant("empty level"))?;
        let slot = self
            .tree
            .node(first)
            .result
            .ok_or_else(|| invariant("node without result slot"))?;
        let combined = self
            .tree
            .result_mut(slot)
            .answer
            .take()
            .ok_or_else(|| invariant("level has no answer"))?;
        let answer = self.invert_if(self.tree.node(parent).inverted(), combined);
        self.set_answer(parent, answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::memory::MemoryDatabase;
    use crate::parser::parse;
    use crate::recordset::SegmentSize;

    fn database() -> MemoryDatabase {
        let mut db = MemoryDatabase::new(SegmentSize::new(4, 1, 1));
        db.create_file("file", &["f1", "f2"], &["f"]);
        for (f1, f) in [("a", "x"), ("b", "y"), ("c", "x"), ("d", "y"), ("e", "x")] {
            db.add_record("file", &[("f1", f1), ("f", f)]).expect("add record");
        }
        db
    }

    fn run(db: &MemoryDatabase, statement: &str, use_indexes: bool) -> Vec<RecordNumber> {
        let mut tree = parse(&lex(statement)).expect("parse ok");
        Evaluator::new(db, "file")
            .use_indexes(use_indexes)
            .evaluate(&mut tree)
            .expect("evaluate ok")
            .iter()
            .collect()
    }

    #[test]
    fn or_after_a_pending_run_is_kept() {
        let db = database();
        let statement = "f1 eq a or f1 ge b and f eq x or f1 eq e";
        assert_eq!(run(&db, statement, true), vec![0, 2, 4]);
        assert_eq!(run(&db, statement, false), vec![0, 2, 4]);
    }

    #[test]
    fn emptied_runs_are_not_scanned() {
        let db = database();
        let mut tree = parse(&lex("f1 eq z and f eq x or f1 eq b")).expect("parse ok");
        let answer = Evaluator::new(&db, "file").evaluate(&mut tree).expect("evaluate ok");
        assert_eq!(answer.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(db.fetch_count(), 0);
    }

    #[test]
    fn partially_resolved_runs_are_pending() {
        let db = database();
        let mut tree = parse(&lex("f1 ge b and f eq x")).expect("parse ok");
        Evaluator::new(&db, "file").evaluate(&mut tree).expect("evaluate ok");
        let first = tree.node(NodeId::ROOT).down().expect("phrase");
        let c = tree.node(first).constraint.expect("constraint");
        assert!(tree.constraint(c).pending);
        assert_eq!(
            tree.constraint(c).result.as_ref().map(|k| k.iter().collect::<Vec<_>>()),
            Some(vec![1, 2, 3, 4])
        );
    }

    #[test]
    fn empty_statement_is_empty() {
        let db = database();
        let mut tree = parse(&[]).expect("parse ok");
        let answer = Evaluator::new(&db, "file").evaluate(&mut tree).expect("evaluate ok");
        assert!(answer.is_empty());
    }
}
