use crate::graph_pattern::{GraphPattern, NamedNodePattern, TermPattern, TriplePattern};
use crate::transform::{transform_children, Transformer};
use rdf_quarry_model::vocab;
use std::cmp::Reverse;

/// Stable-sorts the triple patterns of every BGP by a selectivity estimate.
///
/// The estimate is the number of ground positions, except that an `rdf:type`
/// predicate counts as unbound: it appears on nearly every subject, so it
/// narrows little. More selective patterns run first in the nested-loop
/// evaluation; ties keep their source order.
pub struct ReorderBgp;

impl Transformer for ReorderBgp {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        let rebuilt =
            transform_children(pattern, depth, &mut |p, d| self.transform_at_depth(p, d));
        match rebuilt {
            GraphPattern::Bgp { mut patterns } => {
                patterns.sort_by_key(|p| Reverse(selectivity_score(p)));
                GraphPattern::Bgp { patterns }
            }
            other => other,
        }
    }
}

fn selectivity_score(pattern: &TriplePattern) -> u32 {
    let position = |p: &TermPattern| u32::from(!matches!(p, TermPattern::Variable(_)));
    let predicate = match &pattern.predicate {
        NamedNodePattern::NamedNode(n) if n.as_str() != vocab::rdf::TYPE => 1,
        _ => 0,
    };
    position(&pattern.subject) + predicate + position(&pattern.object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Query;

    fn optimized(query: &str) -> String {
        let query = Query::parse(query, None).unwrap();
        ReorderBgp.transform(query.pattern()).to_string()
    }

    #[test]
    fn grounded_patterns_move_to_the_front() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?s ?p ?o . ?s ex:name \"Alice\" }",
        );
        assert_eq!(
            rewritten,
            "(project (?s ?p ?o) (bgp (triple ?s <http://example.org/name> \"Alice\") \
             (triple ?s ?p ?o)))"
        );
    }

    #[test]
    fn rdf_type_predicates_count_as_unbound() {
        let rewritten = optimized(
            "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#> \
             SELECT * WHERE { ?s a ?type . ?s rdfs:label ?label }",
        );
        let type_at = rewritten.find("rdf-syntax-ns#type").unwrap();
        let label_at = rewritten.find("rdf-schema#label").unwrap();
        assert!(label_at < type_at, "{rewritten}");
    }

    #[test]
    fn ties_keep_source_order() {
        let rewritten = optimized(
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?a ex:p ?b . ?c ex:q ?d }",
        );
        let p_at = rewritten.find("example.org/p").unwrap();
        let q_at = rewritten.find("example.org/q").unwrap();
        assert!(p_at < q_at, "{rewritten}");
    }
}
