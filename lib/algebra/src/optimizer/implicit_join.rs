use crate::expression::Expression;
use crate::graph_pattern::GraphPattern;
use crate::optimizer::substitution::VariableSubstitution;
use crate::transform::{transform_children, Transformer};
use rdf_quarry_model::Variable;

/// Rewrites `FILTER(?a = ?b)` equality joins into an Extend.
///
/// When each of the two variables has exactly one binding site in the
/// filtered pattern, the equality can be enforced structurally: every
/// occurrence of `?b` is replaced by `?a` and an `Extend` re-binds `?b` so
/// the solutions keep both variables. Binding sites behind a scope boundary,
/// on the right of an OPTIONAL, or inside a union branch cannot be counted,
/// so those shapes disqualify the rewrite. When both sites are accept-all
/// patterns the filter stays: the filtered-product rewrite handles that
/// shape with a better plan.
pub struct ImplicitJoin;

impl Transformer for ImplicitJoin {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        let rebuilt =
            transform_children(pattern, depth, &mut |p, d| self.transform_at_depth(p, d));
        let GraphPattern::Filter { expression, inner } = rebuilt else {
            return rebuilt;
        };
        let Some((keep, replace)) = expression.as_variable_equality() else {
            return GraphPattern::Filter { expression, inner };
        };
        match (
            binding_sites(&inner, keep),
            binding_sites(&inner, replace),
        ) {
            (Sites::One { accept_all: a }, Sites::One { accept_all: b }) if !(a && b) => {
                let keep = keep.clone();
                let replace = replace.clone();
                let substituted =
                    VariableSubstitution::with_variable(replace.clone(), keep.clone())
                        .transform(&inner);
                GraphPattern::Extend {
                    inner: Box::new(substituted),
                    variable: replace,
                    expression: Expression::Variable(keep),
                }
            }
            _ => GraphPattern::Filter { expression, inner },
        }
    }
}

/// How often (and how safely) a variable is bound within a pattern, at the
/// scope of that pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sites {
    Zero,
    One { accept_all: bool },
    Many,
    /// Bound somewhere the rewrite must not reach.
    Unsafe,
}

impl Sites {
    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unsafe, _) | (_, Self::Unsafe) => Self::Unsafe,
            (Self::Zero, s) | (s, Self::Zero) => s,
            _ => Self::Many,
        }
    }
}

fn binding_sites(pattern: &GraphPattern, variable: &Variable) -> Sites {
    match pattern {
        GraphPattern::Bgp { patterns }
        | GraphPattern::AskBgp { patterns }
        | GraphPattern::LazyBgp { patterns, .. } => patterns
            .iter()
            .filter(|p| p.mentions_variable(variable))
            .fold(Sites::Zero, |sites, p| {
                sites.combine(Sites::One {
                    accept_all: p.is_accept_all(),
                })
            }),
        GraphPattern::Path {
            subject,
            path,
            object,
        } => {
            let occurs = subject.as_variable() == Some(variable)
                || object.as_variable() == Some(variable);
            if !occurs {
                Sites::Zero
            } else if path.has_repetition() {
                Sites::Unsafe
            } else {
                Sites::One { accept_all: false }
            }
        }
        GraphPattern::Join { left, right }
        | GraphPattern::Product { left, right }
        | GraphPattern::FilteredProduct { left, right, .. } => {
            binding_sites(left, variable).combine(binding_sites(right, variable))
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => {
            let mentioned_right = right.mentions_variable(variable)
                || expression
                    .as_ref()
                    .is_some_and(|e| e.variables().contains(variable));
            if mentioned_right {
                Sites::Unsafe
            } else {
                binding_sites(left, variable)
            }
        }
        GraphPattern::Union { left, right }
        | GraphPattern::AskUnion { left, right }
        | GraphPattern::LazyUnion { left, right, .. } => {
            if left.mentions_variable(variable) || right.mentions_variable(variable) {
                Sites::Unsafe
            } else {
                Sites::Zero
            }
        }
        // The right side never binds; substitution rewrites it consistently.
        GraphPattern::Minus { left, .. } => binding_sites(left, variable),
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::OrderBy { inner, .. } => binding_sites(inner, variable),
        GraphPattern::Graph { name, inner } => {
            let selector = if name.as_variable() == Some(variable) {
                Sites::One { accept_all: false }
            } else {
                Sites::Zero
            };
            selector.combine(binding_sites(inner, variable))
        }
        GraphPattern::Extend {
            inner,
            variable: bound,
            ..
        } => {
            let here = if bound == variable {
                Sites::One { accept_all: false }
            } else {
                Sites::Zero
            };
            here.combine(binding_sites(inner, variable))
        }
        GraphPattern::Project { variables, .. } => {
            if variables.contains(variable) {
                Sites::Unsafe
            } else {
                Sites::Zero
            }
        }
        GraphPattern::Service { .. } => {
            if pattern.mentions_variable(variable) {
                Sites::Unsafe
            } else {
                Sites::Zero
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Query;

    fn optimized(query: &str) -> String {
        let query = Query::parse(query, None).unwrap();
        ImplicitJoin.transform(query.pattern()).to_string()
    }

    #[test]
    fn simple_equality_becomes_an_extend() {
        let rewritten = optimized(
            "SELECT * WHERE { ?x a ?a . ?y a ?b FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(extend (?b ?a)"), "{rewritten}");
        assert!(!rewritten.contains("(filter"), "{rewritten}");
    }

    #[test]
    fn same_term_is_rewritten_too() {
        let rewritten = optimized(
            "SELECT * WHERE { ?x a ?a . ?y a ?b FILTER(sameTerm(?a, ?b)) }",
        );
        assert!(rewritten.contains("(extend (?b ?a)"), "{rewritten}");
    }

    #[test]
    fn multiple_binding_sites_disqualify() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?x ex:p ?a . ?x ex:q ?a . ?y ex:p ?b FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(filter (= ?a ?b)"), "{rewritten}");
    }

    #[test]
    fn optional_bound_variables_disqualify() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?x ex:p ?a OPTIONAL { ?y ex:q ?b } FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(filter (= ?a ?b)"), "{rewritten}");
    }

    #[test]
    fn union_branch_bindings_disqualify() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?x ex:p ?a { ?y ex:q ?b } UNION { ?y ex:r ?b } FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(filter (= ?a ?b)"), "{rewritten}");
    }

    #[test]
    fn subquery_projected_variables_disqualify() {
        let rewritten = optimized(
            "SELECT * WHERE { ?x a ?a { SELECT ?b WHERE { ?y a ?b } } FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(filter (= ?a ?b)"), "{rewritten}");
    }

    #[test]
    fn accept_all_pairs_are_left_for_the_product_rewrite() {
        let rewritten = optimized(
            "SELECT * WHERE { ?s1 ?p1 ?o1 . ?s2 ?p2 ?o2 FILTER(?o1 = ?o2) }",
        );
        assert!(rewritten.contains("(filter (= ?o1 ?o2)"), "{rewritten}");
    }

    #[test]
    fn rewrite_reaches_into_minus_right_sides() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?x ex:p ?a . ?y ex:q ?b MINUS { ?b ex:r ?a } FILTER(?a = ?b) }",
        );
        assert!(rewritten.contains("(extend (?b ?a)"), "{rewritten}");
        assert!(
            rewritten.contains("(triple ?a <http://example.org/r> ?a)"),
            "{rewritten}"
        );
    }
}
