use crate::graph_pattern::{GraphPattern, TriplePattern};
use crate::transform::{transform_children, Transformer};
use rdf_quarry_model::Variable;
use rustc_hash::FxHashSet;

/// Fuses a filter over a cross product into a `FilteredProduct`.
///
/// A filter whose variables span two variable-disjoint halves cannot be
/// pushed into either half, so without this rewrite the evaluator would
/// materialize the whole product before filtering. A `FilteredProduct`
/// applies the condition to each pair as it is enumerated. The halves come
/// either from splitting a BGP into its two connected components or from a
/// join of var-disjoint operands.
pub struct FilteredProductRewrite;

impl Transformer for FilteredProductRewrite {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        let rebuilt =
            transform_children(pattern, depth, &mut |p, d| self.transform_at_depth(p, d));
        let GraphPattern::Filter { expression, inner } = rebuilt else {
            return rebuilt;
        };
        let needed = expression.variables();
        if needed.is_empty() {
            return GraphPattern::Filter { expression, inner };
        }
        match *inner {
            GraphPattern::Bgp { ref patterns } if patterns.len() >= 2 => {
                match split_components(patterns) {
                    Some((left, right)) if spans_both(&needed, &left, &right) => {
                        GraphPattern::FilteredProduct {
                            left: Box::new(GraphPattern::Bgp { patterns: left }),
                            right: Box::new(GraphPattern::Bgp { patterns: right }),
                            expression,
                        }
                    }
                    _ => GraphPattern::Filter { expression, inner },
                }
            }
            GraphPattern::Join { ref left, ref right }
            | GraphPattern::Product { ref left, ref right } => {
                let left_vars = left.visible_variables();
                let right_vars = right.visible_variables();
                let disjoint = left_vars.is_disjoint(&right_vars);
                let spans = needed.iter().any(|v| left_vars.contains(v))
                    && needed.iter().any(|v| right_vars.contains(v))
                    && needed
                        .iter()
                        .all(|v| left_vars.contains(v) || right_vars.contains(v));
                if disjoint && spans {
                    GraphPattern::FilteredProduct {
                        left: left.clone(),
                        right: right.clone(),
                        expression,
                    }
                } else {
                    GraphPattern::Filter { expression, inner }
                }
            }
            inner => GraphPattern::Filter {
                expression,
                inner: Box::new(inner),
            },
        }
    }
}

fn spans_both(
    needed: &FxHashSet<Variable>,
    left: &[TriplePattern],
    right: &[TriplePattern],
) -> bool {
    let vars = |patterns: &[TriplePattern]| {
        patterns
            .iter()
            .flat_map(|p| p.variables().cloned())
            .collect::<FxHashSet<_>>()
    };
    let left_vars = vars(left);
    let right_vars = vars(right);
    needed.iter().any(|v| left_vars.contains(v))
        && needed.iter().any(|v| right_vars.contains(v))
        && needed
            .iter()
            .all(|v| left_vars.contains(v) || right_vars.contains(v))
}

/// Splits a BGP into exactly two variable-connected components, keeping the
/// source order within and between them. `None` when the BGP is connected or
/// falls apart into more than two pieces.
fn split_components(patterns: &[TriplePattern]) -> Option<(Vec<TriplePattern>, Vec<TriplePattern>)> {
    let mut components: Vec<(FxHashSet<Variable>, Vec<TriplePattern>)> = Vec::new();
    for pattern in patterns {
        let vars: FxHashSet<Variable> = pattern.variables().cloned().collect();
        let mut joined: Option<usize> = None;
        let mut i = 0;
        while i < components.len() {
            if !components[i].0.is_disjoint(&vars) {
                match joined {
                    None => {
                        components[i].0.extend(vars.iter().cloned());
                        components[i].1.push(pattern.clone());
                        joined = Some(i);
                        i += 1;
                    }
                    Some(target) => {
                        // The pattern bridges two components; merge them.
                        let (vars, mut patterns) = components.remove(i);
                        components[target].0.extend(vars);
                        components[target].1.append(&mut patterns);
                    }
                }
            } else {
                i += 1;
            }
        }
        if joined.is_none() {
            components.push((vars, vec![pattern.clone()]));
        }
    }
    if components.len() == 2 {
        let mut iter = components.into_iter();
        let (_, left) = iter.next()?;
        let (_, right) = iter.next()?;
        Some((left, right))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Query;

    fn optimized(query: &str) -> String {
        let query = Query::parse(query, None).unwrap();
        FilteredProductRewrite.transform(query.pattern()).to_string()
    }

    #[test]
    fn disconnected_bgp_becomes_a_filtered_product() {
        let rewritten = optimized(
            "SELECT * WHERE { ?s1 ?p1 ?o1 . ?s2 ?p2 ?o2 FILTER(?o1 = ?o2) }",
        );
        assert_eq!(
            rewritten,
            "(project (?s1 ?p1 ?o1 ?s2 ?p2 ?o2) (filtered-product (= ?o1 ?o2) \
             (bgp (triple ?s1 ?p1 ?o1)) (bgp (triple ?s2 ?p2 ?o2))))"
        );
    }

    #[test]
    fn join_of_disjoint_groups_becomes_a_filtered_product() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { { ?a ex:p ?b } { ?c ex:q ?d } FILTER(?b < ?d) }",
        );
        assert!(rewritten.contains("(filtered-product (< ?b ?d)"), "{rewritten}");
    }

    #[test]
    fn connected_bgps_are_left_alone() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?a ex:p ?b . ?b ex:q ?c FILTER(?a != ?c) }",
        );
        assert!(!rewritten.contains("filtered-product"), "{rewritten}");
    }

    #[test]
    fn filters_not_spanning_both_sides_are_left_alone() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?a ex:p ?b . ?c ex:q ?d FILTER(?b > 1) }",
        );
        assert!(!rewritten.contains("filtered-product"), "{rewritten}");
    }

    #[test]
    fn three_components_are_left_alone() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?a ex:p ?b . ?c ex:q ?d . ?e ex:r ?f FILTER(?b = ?d) }",
        );
        assert!(!rewritten.contains("filtered-product"), "{rewritten}");
    }
}
