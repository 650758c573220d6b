use crate::graph_pattern::GraphPattern;
use crate::transform::Transformer;

/// Swaps in early-terminating operators for queries with a LIMIT.
///
/// `required` is `offset + limit` from the root slice: once that many
/// solutions exist, the slice can cut its window out of them, so producing
/// more is wasted work. Applied from the root through `Slice` and `Project`
/// only; an intervening ORDER BY or DISTINCT needs the full solution
/// sequence and stops the descent simply by not being passed through.
pub struct LazySpecialization {
    required: usize,
}

impl LazySpecialization {
    pub fn new(required: usize) -> Self {
        Self { required }
    }
}

impl Transformer for LazySpecialization {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        match pattern {
            GraphPattern::Bgp { patterns } => GraphPattern::LazyBgp {
                patterns: patterns.clone(),
                required: self.required,
            },
            GraphPattern::Union { left, right } => GraphPattern::LazyUnion {
                left: Box::new(self.transform_at_depth(left, depth + 1)),
                right: Box::new(self.transform_at_depth(right, depth + 1)),
                required: self.required,
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
        let required = query.offset() + query.limit().unwrap();
        LazySpecialization::new(required)
            .transform(query.pattern())
            .to_string()
    }

    #[test]
    fn limit_makes_the_root_bgp_lazy() {
        assert_eq!(
            specialized("SELECT * WHERE { ?s ?p ?o } LIMIT 10"),
            "(slice 0 10 (project (?s ?p ?o) (lazy-bgp 10 (triple ?s ?p ?o))))"
        );
    }

    #[test]
    fn offset_adds_to_the_required_count() {
        let rewritten = specialized("SELECT * WHERE { ?s ?p ?o } OFFSET 5 LIMIT 10");
        assert!(rewritten.contains("(lazy-bgp 15 "), "{rewritten}");
    }

    #[test]
    fn unions_become_lazy_with_specialized_branches() {
        let rewritten = specialized(
            "SELECT * WHERE { { ?s ?p ?o } UNION { ?a ?b ?c } } LIMIT 3",
        );
        assert!(rewritten.contains("(lazy-union 3 (lazy-bgp 3 "), "{rewritten}");
    }

    #[test]
    fn order_by_blocks_the_specialization() {
        let rewritten = specialized("SELECT * WHERE { ?s ?p ?o } ORDER BY ?s LIMIT 10");
        assert!(!rewritten.contains("lazy"), "{rewritten}");
    }

    #[test]
    fn distinct_blocks_the_specialization() {
        let rewritten = specialized("SELECT DISTINCT ?s WHERE { ?s ?p ?o } LIMIT 10");
        assert!(!rewritten.contains("lazy"), "{rewritten}");
    }
}
