//! Rewriting framework for the algebra tree.
//!
//! Rewrites are pure: a transformer maps a pattern to a new pattern and
//! leaves anything it cannot prove safe to change untouched. Depth is
//! threaded through the recursion (root is 0) so rules that only apply at or
//! near the root can tell where they are.

use crate::graph_pattern::GraphPattern;

pub trait Transformer {
    /// Applies the transformer to a whole tree.
    fn transform(&self, pattern: &GraphPattern) -> GraphPattern {
        self.transform_at_depth(pattern, 0)
    }

    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern;
}

/// Rebuilds a node with every direct child replaced by `f(child, depth + 1)`.
/// Leaf nodes are cloned unchanged.
pub fn transform_children<F>(pattern: &GraphPattern, depth: usize, f: &mut F) -> GraphPattern
where
    F: FnMut(&GraphPattern, usize) -> GraphPattern,
{
    let child_depth = depth + 1;
    match pattern {
        GraphPattern::Bgp { .. }
        | GraphPattern::Path { .. }
        | GraphPattern::AskBgp { .. }
        | GraphPattern::LazyBgp { .. } => pattern.clone(),
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
        },
        GraphPattern::Product { left, right } => GraphPattern::Product {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
            expression: expression.clone(),
        },
        GraphPattern::Filter { expression, inner } => GraphPattern::Filter {
            expression: expression.clone(),
            inner: Box::new(f(inner, child_depth)),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name: name.clone(),
            inner: Box::new(f(inner, child_depth)),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(f(inner, child_depth)),
            variable: variable.clone(),
            expression: expression.clone(),
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(f(inner, child_depth)),
            variables: variables.clone(),
        },
        GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name: name.clone(),
            inner: Box::new(f(inner, child_depth)),
            silent: *silent,
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(f(inner, child_depth)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(f(inner, child_depth)),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(f(inner, child_depth)),
            start: *start,
            length: *length,
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(f(inner, child_depth)),
            expression: expression.clone(),
        },
        GraphPattern::AskUnion { left, right } => GraphPattern::AskUnion {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
        },
        GraphPattern::LazyUnion {
            left,
            right,
            required,
        } => GraphPattern::LazyUnion {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
            required: *required,
        },
        GraphPattern::FilteredProduct {
            left,
            right,
            expression,
        } => GraphPattern::FilteredProduct {
            left: Box::new(f(left, child_depth)),
            right: Box::new(f(right, child_depth)),
            expression: expression.clone(),
        },
    }
}
