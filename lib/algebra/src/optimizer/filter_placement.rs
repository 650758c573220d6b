use crate::graph_pattern::{GraphPattern, TriplePattern};
use crate::transform::{transform_children, Transformer};
use rdf_quarry_model::Variable;
use rustc_hash::FxHashSet;

/// Moves filters closer to the patterns that bind their variables.
///
/// A filter over a BGP whose variables are all bound by a proper prefix of
/// the (already reordered) patterns splits the BGP so the filter runs before
/// the remaining patterns join in. A filter over a join is pushed into the
/// operand that certainly binds all of its variables; an operand that only
/// may bind one of them, such as a union with the variable in a single
/// branch, is not a valid target, since the pushed filter would see the
/// variable unbound in solutions the join would still have completed. The
/// rewrite never crosses a scope boundary; a filter it cannot prove movable
/// stays where it is.
pub struct FilterPlacement;

impl Transformer for FilterPlacement {
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
            GraphPattern::Bgp { ref patterns } if patterns.len() > 1 => {
                match shortest_binding_prefix(patterns, &needed) {
                    Some(split) if split < patterns.len() => GraphPattern::Join {
                        left: Box::new(GraphPattern::Filter {
                            expression,
                            inner: Box::new(GraphPattern::Bgp {
                                patterns: patterns[..split].to_vec(),
                            }),
                        }),
                        right: Box::new(GraphPattern::Bgp {
                            patterns: patterns[split..].to_vec(),
                        }),
                    },
                    _ => GraphPattern::Filter { expression, inner },
                }
            }
            GraphPattern::Join { left, right } => {
                if needed.is_subset(&left.certain_variables()) {
                    GraphPattern::Join {
                        left: Box::new(GraphPattern::Filter {
                            expression,
                            inner: left,
                        }),
                        right,
                    }
                } else if needed.is_subset(&right.certain_variables()) {
                    GraphPattern::Join {
                        left,
                        right: Box::new(GraphPattern::Filter {
                            expression,
                            inner: right,
                        }),
                    }
                } else {
                    GraphPattern::Filter {
                        expression,
                        inner: Box::new(GraphPattern::Join { left, right }),
                    }
                }
            }
            inner => GraphPattern::Filter {
                expression,
                inner: Box::new(inner),
            },
        }
    }
}

/// The length of the shortest pattern prefix binding every needed variable,
/// or `None` when even the full BGP does not bind them all.
fn shortest_binding_prefix(
    patterns: &[TriplePattern],
    needed: &FxHashSet<Variable>,
) -> Option<usize> {
    let mut bound: FxHashSet<&Variable> = FxHashSet::default();
    for (i, pattern) in patterns.iter().enumerate() {
        bound.extend(pattern.variables());
        if needed.iter().all(|v| bound.contains(v)) {
            return Some(i + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ReorderBgp;
    use crate::Query;

    fn optimized(query: &str) -> String {
        let query = Query::parse(query, None).unwrap();
        let reordered = ReorderBgp.transform(query.pattern());
        FilterPlacement.transform(&reordered).to_string()
    }

    #[test]
    fn splits_a_bgp_when_a_prefix_binds_the_filter() {
        let rewritten = optimized(
            "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#> \
             SELECT * WHERE { ?s rdfs:label ?label . ?s a ?type \
             FILTER(langMatches(lang(?label), \"en\")) }",
        );
        assert!(rewritten.contains("(join (filter "), "{rewritten}");
        assert!(
            rewritten.contains("(filter (langMatches (lang ?label) \"en\") (bgp (triple ?s <http://www.w3.org/2000/01/rdf-schema#label> ?label)))"),
            "{rewritten}"
        );
    }

    #[test]
    fn keeps_the_filter_when_only_the_full_bgp_binds_it() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?s ex:p ?a . ?s ex:q ?b FILTER(?a = ?b) }",
        );
        assert!(rewritten.starts_with("(project (?s ?a ?b) (filter (= ?a ?b) (bgp"), "{rewritten}");
    }

    #[test]
    fn pushes_a_filter_into_the_join_operand_binding_it() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { { ?s ex:p ?a } GRAPH ?g { ?s ex:q ?b } FILTER(?b > 1) }",
        );
        assert!(
            rewritten.contains("(join (bgp (triple ?s <http://example.org/p> ?a)) (filter (> ?b \"1\"^^<http://www.w3.org/2001/XMLSchema#integer>) (graph ?g"),
            "{rewritten}"
        );
    }

    #[test]
    fn unions_binding_a_variable_in_one_branch_are_not_push_targets() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { { { ?s ex:a ?o } UNION { ?s ex:b ?z } } \
             { ?z ex:r ?w } FILTER(?z = ex:z1) }",
        );
        assert!(rewritten.contains("(join (union"), "{rewritten}");
        assert!(
            rewritten.contains(
                "(filter (= ?z <http://example.org/z1>) \
                 (bgp (triple ?z <http://example.org/r> ?w)))"
            ),
            "{rewritten}"
        );
    }

    #[test]
    fn filters_stay_put_when_no_operand_certainly_binds_them() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { { { ?s ex:a ?o } UNION { ?s ex:b ?z } } \
             { ?s ex:r ?w } FILTER(?z = ex:z1) }",
        );
        assert!(
            rewritten.contains("(filter (= ?z <http://example.org/z1>) (join"),
            "{rewritten}"
        );
    }
}
