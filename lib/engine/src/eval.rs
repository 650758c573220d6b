//! Recursive evaluation of the algebra tree against a [`Dataset`].
//!
//! Every operator materializes its operand solutions; the specialized
//! variants ([`GraphPattern::AskBgp`], [`GraphPattern::LazyBgp`], ...) are
//! what keeps materialization bounded where the optimizer proved a bound
//! exists. The shared [`EvaluationContext`] is ticked at every iteration
//! boundary so a long evaluation notices its deadline.

use crate::context::EvaluationContext;
use crate::dataset::{ActiveGraph, Dataset};
use crate::error::EvaluationError;
use crate::expression;
use itertools::Itertools;
use rdf_quarry_algebra::{
    Expression, GraphPattern, NamedNodePattern, OrderExpression, PropertyPath, TermPattern,
    TriplePattern,
};
use rdf_quarry_model::{compare_terms, NamedNode, Solution, Term, Triple, Variable};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::ControlFlow;

pub struct SimpleEvaluator<'a> {
    dataset: &'a dyn Dataset,
    context: &'a EvaluationContext,
}

impl<'a> SimpleEvaluator<'a> {
    pub fn new(dataset: &'a dyn Dataset, context: &'a EvaluationContext) -> Self {
        Self { dataset, context }
    }

    pub fn evaluate(&self, pattern: &GraphPattern) -> Result<Vec<Solution>, EvaluationError> {
        self.evaluate_pattern(pattern, &ActiveGraph::Default)
    }

    fn evaluate_pattern(
        &self,
        pattern: &GraphPattern,
        graph: &ActiveGraph,
    ) -> Result<Vec<Solution>, EvaluationError> {
        match pattern {
            GraphPattern::Bgp { patterns } => self.evaluate_bgp(patterns, graph, None),
            GraphPattern::AskBgp { patterns } => self.evaluate_bgp(patterns, graph, Some(1)),
            GraphPattern::LazyBgp { patterns, required } => {
                self.evaluate_bgp(patterns, graph, Some(*required))
            }
            GraphPattern::Path {
                subject,
                path,
                object,
            } => self.evaluate_path(subject, path, object, graph),
            GraphPattern::Join { left, right } | GraphPattern::Product { left, right } => {
                self.join(left, right, graph, None)
            }
            GraphPattern::FilteredProduct {
                left,
                right,
                expression,
            } => self.join(left, right, graph, Some(expression)),
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => self.left_join(left, right, expression.as_ref(), graph),
            GraphPattern::Filter { expression, inner } => {
                let mut solutions = self.evaluate_pattern(inner, graph)?;
                solutions.retain(|s| {
                    expression::boolean(expression, s).unwrap_or(false)
                });
                Ok(solutions)
            }
            GraphPattern::Union { left, right } => {
                let mut solutions = self.evaluate_pattern(left, graph)?;
                if self.context.tick()?.is_break() {
                    return Ok(solutions);
                }
                solutions.extend(self.evaluate_pattern(right, graph)?);
                Ok(solutions)
            }
            GraphPattern::AskUnion { left, right } => {
                let solutions = self.evaluate_pattern(left, graph)?;
                if !solutions.is_empty() || self.context.tick()?.is_break() {
                    return Ok(solutions);
                }
                self.evaluate_pattern(right, graph)
            }
            GraphPattern::LazyUnion {
                left,
                right,
                required,
            } => {
                let mut solutions = self.evaluate_pattern(left, graph)?;
                if solutions.len() < *required && !self.context.tick()?.is_break() {
                    solutions.extend(self.evaluate_pattern(right, graph)?);
                }
                solutions.truncate(*required);
                Ok(solutions)
            }
            GraphPattern::Graph { name, inner } => self.evaluate_graph(name, inner),
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let mut solutions = self.evaluate_pattern(inner, graph)?;
                for solution in &mut solutions {
                    let term = expression::evaluate(expression, solution)?;
                    match solution.get(variable) {
                        Some(existing) if *existing != term => {
                            return Err(EvaluationError::ExtendConflict(variable.clone()))
                        }
                        _ => solution.bind(variable.clone(), term),
                    }
                }
                Ok(solutions)
            }
            GraphPattern::Minus { left, right } => {
                let mut solutions = self.evaluate_pattern(left, graph)?;
                let excluded = self.evaluate_pattern(right, graph)?;
                solutions.retain(|l| {
                    !excluded
                        .iter()
                        .any(|r| l.compatible_with(r) && l.shares_variable_with(r))
                });
                Ok(solutions)
            }
            GraphPattern::Project { inner, variables } => {
                let solutions = self.evaluate_pattern(inner, graph)?;
                Ok(solutions
                    .into_iter()
                    .map(|s| s.restricted_to(variables))
                    .collect())
            }
            GraphPattern::Service { .. } => Err(EvaluationError::UnsupportedService),
            GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
                let solutions = self.evaluate_pattern(inner, graph)?;
                Ok(solutions.into_iter().unique().collect())
            }
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                let solutions = self.evaluate_pattern(inner, graph)?;
                Ok(solutions
                    .into_iter()
                    .skip(*start)
                    .take(length.unwrap_or(usize::MAX))
                    .collect())
            }
            GraphPattern::OrderBy { inner, expression } => {
                let solutions = self.evaluate_pattern(inner, graph)?;
                Ok(order_solutions(solutions, expression))
            }
        }
    }

    fn evaluate_bgp(
        &self,
        patterns: &[TriplePattern],
        graph: &ActiveGraph,
        limit: Option<usize>,
    ) -> Result<Vec<Solution>, EvaluationError> {
        let mut out = Vec::new();
        self.match_rest(patterns, &Solution::new(), graph, limit, &mut out)?;
        Ok(out)
    }

    /// Incremental nested-loop matching: matches the first pattern with the
    /// bindings accumulated so far, then recurses into the rest. `Break`
    /// means "stop, keep what is in `out`", raised either by the solution
    /// limit or by an expired deadline with partial results enabled.
    fn match_rest(
        &self,
        patterns: &[TriplePattern],
        current: &Solution,
        graph: &ActiveGraph,
        limit: Option<usize>,
        out: &mut Vec<Solution>,
    ) -> Result<ControlFlow<()>, EvaluationError> {
        let Some((first, rest)) = patterns.split_first() else {
            out.push(current.clone());
            return Ok(if limit.is_some_and(|l| out.len() >= l) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            });
        };

        let subject = resolve_term_pattern(&first.subject, current);
        let object = resolve_term_pattern(&first.object, current);
        let predicate = match &first.predicate {
            NamedNodePattern::NamedNode(n) => Some(n.clone()),
            NamedNodePattern::Variable(v) => match current.get(v) {
                Some(Term::NamedNode(n)) => Some(n.clone()),
                // A predicate variable bound to a non-IRI can never match.
                Some(_) => return Ok(ControlFlow::Continue(())),
                None => None,
            },
        };

        for triple in
            self.dataset
                .triples_matching(graph, subject.as_ref(), predicate.as_ref(), object.as_ref())
        {
            if self.context.tick()?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
            let triple = triple?;
            let Some(next) = bind_triple(first, &triple, current) else {
                continue;
            };
            if self.match_rest(rest, &next, graph, limit, out)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Nested-loop join. With a filter expression this is the filtered
    /// product: the condition runs on each merged pair and an erroring
    /// condition rejects the pair.
    fn join(
        &self,
        left: &GraphPattern,
        right: &GraphPattern,
        graph: &ActiveGraph,
        filter: Option<&Expression>,
    ) -> Result<Vec<Solution>, EvaluationError> {
        let left = self.evaluate_pattern(left, graph)?;
        let right = self.evaluate_pattern(right, graph)?;
        let mut out = Vec::new();
        'outer: for l in &left {
            for r in &right {
                if self.context.tick()?.is_break() {
                    break 'outer;
                }
                let Some(merged) = l.merged_with(r) else {
                    continue;
                };
                let accepted =
                    filter.map_or(true, |e| expression::boolean(e, &merged).unwrap_or(false));
                if accepted {
                    out.push(merged);
                }
            }
        }
        Ok(out)
    }

    fn left_join(
        &self,
        left: &GraphPattern,
        right: &GraphPattern,
        filter: Option<&Expression>,
        graph: &ActiveGraph,
    ) -> Result<Vec<Solution>, EvaluationError> {
        let left = self.evaluate_pattern(left, graph)?;
        let right = self.evaluate_pattern(right, graph)?;
        let mut out = Vec::new();
        'outer: for l in &left {
            let mut extended = false;
            for r in &right {
                if self.context.tick()?.is_break() {
                    break 'outer;
                }
                let Some(merged) = l.merged_with(r) else {
                    continue;
                };
                let accepted =
                    filter.map_or(true, |e| expression::boolean(e, &merged).unwrap_or(false));
                if accepted {
                    out.push(merged);
                    extended = true;
                }
            }
            if !extended {
                out.push(l.clone());
            }
        }
        Ok(out)
    }

    fn evaluate_graph(
        &self,
        name: &NamedNodePattern,
        inner: &GraphPattern,
    ) -> Result<Vec<Solution>, EvaluationError> {
        match name {
            NamedNodePattern::NamedNode(n) => {
                self.evaluate_pattern(inner, &ActiveGraph::Named(n.clone()))
            }
            NamedNodePattern::Variable(variable) => {
                let mut out = Vec::new();
                for graph_name in self.dataset.named_graphs()? {
                    if self.context.tick()?.is_break() {
                        break;
                    }
                    let in_graph =
                        self.evaluate_pattern(inner, &ActiveGraph::Named(graph_name.clone()))?;
                    let selector = Term::from(graph_name);
                    for mut solution in in_graph {
                        match solution.get(variable) {
                            Some(existing) if *existing != selector => continue,
                            Some(_) => {}
                            None => solution.bind(variable.clone(), selector.clone()),
                        }
                        out.push(solution);
                    }
                }
                Ok(out)
            }
        }
    }

    fn evaluate_path(
        &self,
        subject: &TermPattern,
        path: &PropertyPath,
        object: &TermPattern,
        graph: &ActiveGraph,
    ) -> Result<Vec<Solution>, EvaluationError> {
        let pairs = self.path_pairs(path, graph)?;
        let mut out = Vec::new();
        for (start, end) in pairs {
            let mut solution = Solution::new();
            if bind_term(subject, &start, &mut solution) && bind_term(object, &end, &mut solution)
            {
                out.push(solution);
            }
        }
        Ok(out)
    }

    /// All (start, end) pairs connected by the path in the active graph.
    fn path_pairs(
        &self,
        path: &PropertyPath,
        graph: &ActiveGraph,
    ) -> Result<Vec<(Term, Term)>, EvaluationError> {
        Ok(match path {
            PropertyPath::Predicate(predicate) => {
                self.predicate_pairs(graph, Some(predicate), &[])?
            }
            PropertyPath::Reverse(inner) => self
                .path_pairs(inner, graph)?
                .into_iter()
                .map(|(s, o)| (o, s))
                .collect(),
            PropertyPath::Sequence(first, second) => {
                let first = self.path_pairs(first, graph)?;
                let mut by_start: FxHashMap<Term, Vec<Term>> = FxHashMap::default();
                for (s, o) in self.path_pairs(second, graph)? {
                    by_start.entry(s).or_default().push(o);
                }
                let mut out = Vec::new();
                for (start, middle) in first {
                    if self.context.tick()?.is_break() {
                        break;
                    }
                    if let Some(ends) = by_start.get(&middle) {
                        out.extend(ends.iter().map(|end| (start.clone(), end.clone())));
                    }
                }
                dedup_pairs(out)
            }
            PropertyPath::Alternative(left, right) => {
                let mut out = self.path_pairs(left, graph)?;
                out.extend(self.path_pairs(right, graph)?);
                dedup_pairs(out)
            }
            PropertyPath::ZeroOrOne(inner) => {
                let mut out = self.identity_pairs(graph)?;
                out.extend(self.path_pairs(inner, graph)?);
                dedup_pairs(out)
            }
            PropertyPath::ZeroOrMore(inner) => {
                let mut out = self.identity_pairs(graph)?;
                out.extend(self.closure(inner, graph)?);
                dedup_pairs(out)
            }
            PropertyPath::OneOrMore(inner) => self.closure(inner, graph)?,
            PropertyPath::NegatedPropertySet(excluded) => {
                self.predicate_pairs(graph, None, excluded)?
            }
        })
    }

    fn predicate_pairs(
        &self,
        graph: &ActiveGraph,
        predicate: Option<&NamedNode>,
        excluded: &[NamedNode],
    ) -> Result<Vec<(Term, Term)>, EvaluationError> {
        let mut out = Vec::new();
        for triple in self.dataset.triples_matching(graph, None, predicate, None) {
            if self.context.tick()?.is_break() {
                break;
            }
            let triple = triple?;
            if !excluded.contains(&triple.predicate) {
                out.push((triple.subject, triple.object));
            }
        }
        Ok(out)
    }

    /// The `(x, x)` pairs over every term occurring in the graph.
    fn identity_pairs(&self, graph: &ActiveGraph) -> Result<Vec<(Term, Term)>, EvaluationError> {
        let mut nodes = FxHashSet::default();
        for triple in self.dataset.triples_matching(graph, None, None, None) {
            if self.context.tick()?.is_break() {
                break;
            }
            let triple = triple?;
            nodes.insert(triple.subject);
            nodes.insert(triple.object);
        }
        Ok(nodes.into_iter().map(|n| (n.clone(), n)).collect())
    }

    /// The transitive closure of a path: every pair reachable through one or
    /// more steps, computed by breadth-first search from each start node.
    fn closure(
        &self,
        step: &PropertyPath,
        graph: &ActiveGraph,
    ) -> Result<Vec<(Term, Term)>, EvaluationError> {
        let mut edges: FxHashMap<Term, Vec<Term>> = FxHashMap::default();
        for (s, o) in self.path_pairs(step, graph)? {
            edges.entry(s).or_default().push(o);
        }
        let mut out = Vec::new();
        for start in edges.keys() {
            if self.context.tick()?.is_break() {
                break;
            }
            let mut reached = FxHashSet::default();
            let mut frontier = vec![start.clone()];
            while let Some(node) = frontier.pop() {
                let Some(nexts) = edges.get(&node) else {
                    continue;
                };
                for next in nexts {
                    if reached.insert(next.clone()) {
                        frontier.push(next.clone());
                    }
                }
            }
            out.extend(reached.into_iter().map(|end| (start.clone(), end)));
        }
        Ok(out)
    }
}

fn dedup_pairs(pairs: Vec<(Term, Term)>) -> Vec<(Term, Term)> {
    pairs.into_iter().unique().collect()
}

/// Stable sort by the order conditions; solutions where a condition errors
/// sort as unbound.
fn order_solutions(solutions: Vec<Solution>, conditions: &[OrderExpression]) -> Vec<Solution> {
    let mut keyed: Vec<(Vec<Option<Term>>, Solution)> = solutions
        .into_iter()
        .map(|solution| {
            let keys = conditions
                .iter()
                .map(|condition| {
                    let (OrderExpression::Asc(e) | OrderExpression::Desc(e)) = condition;
                    expression::evaluate(e, &solution).ok()
                })
                .collect();
            (keys, solution)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        for (condition, (x, y)) in conditions.iter().zip(a.iter().zip(b)) {
            let mut ordering = compare_terms(x.as_ref(), y.as_ref());
            if matches!(condition, OrderExpression::Desc(_)) {
                ordering = ordering.reverse();
            }
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    keyed.into_iter().map(|(_, solution)| solution).collect()
}

/// The ground term this position requires, given the bindings so far.
fn resolve_term_pattern(pattern: &TermPattern, current: &Solution) -> Option<Term> {
    match pattern {
        TermPattern::Variable(v) => current.get(v).cloned(),
        TermPattern::BlankNode(b) => current.get(&blank_node_variable(b.as_str())).cloned(),
        _ => pattern.as_term(),
    }
}

/// Binds the three positions of `pattern` against `triple` on top of
/// `current`, or returns `None` when a ground position or an existing
/// binding disagrees.
fn bind_triple(
    pattern: &TriplePattern,
    triple: &Triple,
    current: &Solution,
) -> Option<Solution> {
    let mut next = current.clone();
    if !bind_term(&pattern.subject, &triple.subject, &mut next) {
        return None;
    }
    let predicate_term = Term::from(triple.predicate.clone());
    match &pattern.predicate {
        NamedNodePattern::NamedNode(n) => {
            if *n != triple.predicate {
                return None;
            }
        }
        NamedNodePattern::Variable(v) => match next.get(v) {
            Some(existing) if *existing != predicate_term => return None,
            Some(_) => {}
            None => next.bind(v.clone(), predicate_term),
        },
    }
    if !bind_term(&pattern.object, &triple.object, &mut next) {
        return None;
    }
    Some(next)
}

fn bind_term(pattern: &TermPattern, term: &Term, solution: &mut Solution) -> bool {
    let variable = match pattern {
        TermPattern::Variable(v) => v.clone(),
        // Blank nodes in patterns act as variables that cannot be selected;
        // the pseudo-name is unwritable in the query language, so it cannot
        // collide and projection strips it.
        TermPattern::BlankNode(b) => blank_node_variable(b.as_str()),
        _ => return pattern.as_term().as_ref() == Some(term),
    };
    match solution.get(&variable) {
        Some(existing) => existing == term,
        None => {
            solution.bind(variable, term.clone());
            true
        }
    }
}

fn blank_node_variable(id: &str) -> Variable {
    Variable::new(format!("_:{id}"))
}
