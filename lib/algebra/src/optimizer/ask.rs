use crate::graph_pattern::GraphPattern;
use crate::transform::Transformer;

/// Swaps in existence-check operators for ASK queries.
///
/// Only applied at the algebra root and through operators that pass
/// solutions straight through. An `AskBgp` stops at its first solution and
/// an `AskUnion` skips its right branch when the left found one, which is
/// all an ASK result needs. Anything below a join or other combining
/// operator keeps its exhaustive form, since those need full inputs.
pub struct AskSpecialization;

impl Transformer for AskSpecialization {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        match pattern {
            GraphPattern::Bgp { patterns } => GraphPattern::AskBgp {
                patterns: patterns.clone(),
            },
            GraphPattern::Union { left, right } => GraphPattern::AskUnion {
                left: Box::new(self.transform_at_depth(left, depth + 1)),
                right: Box::new(self.transform_at_depth(right, depth + 1)),
            },
            GraphPattern::Distinct { inner } => GraphPattern::Distinct {
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
            },
            GraphPattern::Reduced { inner } => GraphPattern::Reduced {
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
            },
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => GraphPattern::Slice {
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
                start: *start,
                length: *length,
            },
            GraphPattern::Project { inner, variables } => GraphPattern::Project {
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
                variables: variables.clone(),
            },
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Query;

    fn specialized(query: &str) -> String {
        let query = Query::parse(query, None).unwrap();
        AskSpecialization.transform(query.pattern()).to_string()
    }

    #[test]
    fn root_bgp_becomes_ask_bgp() {
        assert_eq!(
            specialized("ASK WHERE { ?s ?p ?o }"),
            "(ask-bgp (triple ?s ?p ?o))"
        );
    }

    #[test]
    fn union_branches_are_specialized_recursively() {
        let rewritten = specialized(
            "ASK WHERE { { ?s ?p ?o } UNION { { ?a ?b ?c } UNION { ?x ?y ?z } } }",
        );
        assert_eq!(
            rewritten,
            "(ask-union (ask-bgp (triple ?s ?p ?o)) \
             (ask-union (ask-bgp (triple ?a ?b ?c)) (ask-bgp (triple ?x ?y ?z))))"
        );
    }

    #[test]
    fn bgps_below_a_join_stay_exhaustive() {
        let rewritten = specialized(
            "PREFIX ex: <http://example.org/> \
             ASK WHERE { { ?s ex:p ?o } OPTIONAL { ?o ex:q ?v } }",
        );
        assert!(!rewritten.contains("ask-bgp"), "{rewritten}");
    }
}
