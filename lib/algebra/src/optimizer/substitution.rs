use crate::expression::{Expression, OrderExpression};
use crate::graph_pattern::{GraphPattern, NamedNodePattern, TermPattern, TriplePattern};
use crate::transform::{transform_children, Transformer};
use rdf_quarry_model::{Term, Variable};

/// What a substituted variable is replaced with.
#[derive(Debug, Clone)]
pub enum Replacement {
    Variable(Variable),
    Term(Term),
}

/// Replaces every occurrence of a variable with another variable or a ground
/// term.
///
/// The rewrite recurses into OPTIONAL, UNION, MINUS, and GRAPH bodies, but
/// never into SERVICE, subqueries, or property paths with a repetition
/// operator: those scopes evaluate independently and a rewrite there could
/// change their meaning. A node that cannot hold the replacement (a literal
/// as a graph selector or predicate, a term as an extend target) is left
/// unchanged as a whole.
#[derive(Debug, Clone)]
pub struct VariableSubstitution {
    find: Variable,
    replacement: Replacement,
}

impl VariableSubstitution {
    pub fn new(find: Variable, replacement: Replacement) -> Self {
        Self { find, replacement }
    }

    pub fn with_variable(find: Variable, to: Variable) -> Self {
        Self::new(find, Replacement::Variable(to))
    }

    pub fn with_term(find: Variable, to: Term) -> Self {
        Self::new(find, Replacement::Term(to))
    }

    fn apply_term_pattern(&self, pattern: &TermPattern) -> TermPattern {
        match pattern {
            TermPattern::Variable(v) if *v == self.find => match &self.replacement {
                Replacement::Variable(to) => TermPattern::Variable(to.clone()),
                Replacement::Term(term) => term.clone().into(),
            },
            other => other.clone(),
        }
    }

    /// Rewrites a predicate or graph-selector position. `None` means the
    /// replacement does not fit there.
    fn apply_named_node_pattern(&self, pattern: &NamedNodePattern) -> Option<NamedNodePattern> {
        match pattern {
            NamedNodePattern::Variable(v) if *v == self.find => match &self.replacement {
                Replacement::Variable(to) => Some(NamedNodePattern::Variable(to.clone())),
                Replacement::Term(Term::NamedNode(node)) => {
                    Some(NamedNodePattern::NamedNode(node.clone()))
                }
                Replacement::Term(_) => None,
            },
            other => Some(other.clone()),
        }
    }

    fn apply_triple_pattern(&self, pattern: &TriplePattern) -> Option<TriplePattern> {
        Some(TriplePattern {
            subject: self.apply_term_pattern(&pattern.subject),
            predicate: self.apply_named_node_pattern(&pattern.predicate)?,
            object: self.apply_term_pattern(&pattern.object),
        })
    }

    fn apply_patterns(&self, patterns: &[TriplePattern]) -> Option<Vec<TriplePattern>> {
        patterns.iter().map(|p| self.apply_triple_pattern(p)).collect()
    }

    fn apply_expression(&self, expression: &Expression) -> Expression {
        fn binary(
            ctor: fn(Box<Expression>, Box<Expression>) -> Expression,
            s: &VariableSubstitution,
            a: &Expression,
            b: &Expression,
        ) -> Expression {
            ctor(
                Box::new(s.apply_expression(a)),
                Box::new(s.apply_expression(b)),
            )
        }
        match expression {
            Expression::NamedNode(_) | Expression::Literal(_) => expression.clone(),
            Expression::Variable(v) if *v == self.find => match &self.replacement {
                Replacement::Variable(to) => Expression::Variable(to.clone()),
                Replacement::Term(term) => term.clone().into(),
            },
            Expression::Variable(_) => expression.clone(),
            Expression::Bound(v) if *v == self.find => match &self.replacement {
                Replacement::Variable(to) => Expression::Bound(to.clone()),
                // BOUND of a ground term is inexpressible; keep the original.
                Replacement::Term(_) => expression.clone(),
            },
            Expression::Bound(_) => expression.clone(),
            Expression::Or(a, b) => binary(Expression::Or, self, a, b),
            Expression::And(a, b) => binary(Expression::And, self, a, b),
            Expression::Not(e) => Expression::Not(Box::new(self.apply_expression(e))),
            Expression::Equal(a, b) => binary(Expression::Equal, self, a, b),
            Expression::SameTerm(a, b) => binary(Expression::SameTerm, self, a, b),
            Expression::Greater(a, b) => binary(Expression::Greater, self, a, b),
            Expression::GreaterOrEqual(a, b) => binary(Expression::GreaterOrEqual, self, a, b),
            Expression::Less(a, b) => binary(Expression::Less, self, a, b),
            Expression::LessOrEqual(a, b) => binary(Expression::LessOrEqual, self, a, b),
            Expression::Add(a, b) => binary(Expression::Add, self, a, b),
            Expression::Subtract(a, b) => binary(Expression::Subtract, self, a, b),
            Expression::Multiply(a, b) => binary(Expression::Multiply, self, a, b),
            Expression::Divide(a, b) => binary(Expression::Divide, self, a, b),
            Expression::UnaryMinus(e) => {
                Expression::UnaryMinus(Box::new(self.apply_expression(e)))
            }
            Expression::FunctionCall(function, args) => Expression::FunctionCall(
                *function,
                args.iter().map(|a| self.apply_expression(a)).collect(),
            ),
        }
    }

    fn apply_order_expression(&self, expression: &OrderExpression) -> OrderExpression {
        match expression {
            OrderExpression::Asc(e) => OrderExpression::Asc(self.apply_expression(e)),
            OrderExpression::Desc(e) => OrderExpression::Desc(self.apply_expression(e)),
        }
    }
}

impl Transformer for VariableSubstitution {
    fn transform_at_depth(&self, pattern: &GraphPattern, depth: usize) -> GraphPattern {
        match pattern {
            GraphPattern::Bgp { patterns } => match self.apply_patterns(patterns) {
                Some(patterns) => GraphPattern::Bgp { patterns },
                None => pattern.clone(),
            },
            GraphPattern::AskBgp { patterns } => match self.apply_patterns(patterns) {
                Some(patterns) => GraphPattern::AskBgp { patterns },
                None => pattern.clone(),
            },
            GraphPattern::LazyBgp { patterns, required } => {
                match self.apply_patterns(patterns) {
                    Some(patterns) => GraphPattern::LazyBgp {
                        patterns,
                        required: *required,
                    },
                    None => pattern.clone(),
                }
            }
            GraphPattern::Path {
                subject,
                path,
                object,
            } => {
                if path.has_repetition() {
                    pattern.clone()
                } else {
                    GraphPattern::Path {
                        subject: self.apply_term_pattern(subject),
                        path: path.clone(),
                        object: self.apply_term_pattern(object),
                    }
                }
            }
            GraphPattern::Service { .. } | GraphPattern::Project { .. } => pattern.clone(),
            GraphPattern::Graph { name, inner } => match self.apply_named_node_pattern(name) {
                Some(name) => GraphPattern::Graph {
                    name,
                    inner: Box::new(self.transform_at_depth(inner, depth + 1)),
                },
                None => pattern.clone(),
            },
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let variable = if *variable == self.find {
                    match &self.replacement {
                        Replacement::Variable(to) => to.clone(),
                        Replacement::Term(_) => return pattern.clone(),
                    }
                } else {
                    variable.clone()
                };
                GraphPattern::Extend {
                    inner: Box::new(self.transform_at_depth(inner, depth + 1)),
                    variable,
                    expression: self.apply_expression(expression),
                }
            }
            GraphPattern::Filter { expression, inner } => GraphPattern::Filter {
                expression: self.apply_expression(expression),
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
            },
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => GraphPattern::LeftJoin {
                left: Box::new(self.transform_at_depth(left, depth + 1)),
                right: Box::new(self.transform_at_depth(right, depth + 1)),
                expression: expression.as_ref().map(|e| self.apply_expression(e)),
            },
            GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
                inner: Box::new(self.transform_at_depth(inner, depth + 1)),
                expression: expression
                    .iter()
                    .map(|e| self.apply_order_expression(e))
                    .collect(),
            },
            GraphPattern::FilteredProduct {
                left,
                right,
                expression,
            } => GraphPattern::FilteredProduct {
                left: Box::new(self.transform_at_depth(left, depth + 1)),
                right: Box::new(self.transform_at_depth(right, depth + 1)),
                expression: self.apply_expression(expression),
            },
            other => transform_children(other, depth, &mut |p, d| self.transform_at_depth(p, d)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Query;
    use rdf_quarry_model::{Literal, NamedNode};

    fn pattern_of(query: &str) -> GraphPattern {
        // SELECT * keeps the body free of an outer projection node.
        let query = Query::parse(query, None).unwrap();
        query.pattern().clone()
    }

    fn rename(pattern: &GraphPattern, from: &str, to: &str) -> String {
        VariableSubstitution::with_variable(Variable::new(from), Variable::new(to))
            .transform(pattern)
            .to_string()
    }

    fn ground(pattern: &GraphPattern, from: &str, to: impl Into<Term>) -> String {
        VariableSubstitution::with_term(Variable::new(from), to.into())
            .transform(pattern)
            .to_string()
    }

    #[test]
    fn renames_inside_bgp_and_filter() {
        let pattern = pattern_of("SELECT * WHERE { ?s ?p ?o FILTER(?o > 3) }");
        let GraphPattern::Project { inner, .. } = &pattern else {
            panic!("expected projection");
        };
        let rewritten = rename(inner, "o", "value");
        assert!(rewritten.contains("(triple ?s ?p ?value)"));
        assert!(rewritten.contains("(> ?value"));
    }

    #[test]
    fn renames_inside_optional_union_minus_and_graph() {
        for query in [
            "SELECT * WHERE { ?s ?p ?o OPTIONAL { ?o ?q ?v } }",
            "SELECT * WHERE { { ?s ?p ?o } UNION { ?o ?p ?s } }",
            "SELECT * WHERE { ?s ?p ?o MINUS { ?o ?q ?v } }",
            "SELECT * WHERE { GRAPH <http://example.org/g> { ?s ?p ?o } }",
        ] {
            let GraphPattern::Project { inner, .. } = pattern_of(query) else {
                panic!("expected projection");
            };
            let rewritten = rename(&inner, "o", "x");
            assert!(!rewritten.contains("?o"), "{rewritten}");
            assert!(rewritten.contains("?x"), "{rewritten}");
        }
    }

    #[test]
    fn replaces_a_variable_graph_selector_with_an_iri() {
        let GraphPattern::Project { inner, .. } =
            pattern_of("SELECT * WHERE { GRAPH ?g { ?s ?p ?o } }")
        else {
            panic!("expected projection");
        };
        let rewritten = ground(&inner, "g", NamedNode::new("http://example.org/g"));
        assert!(rewritten.contains("(graph <http://example.org/g>"));
    }

    #[test]
    fn literal_graph_selector_replacement_leaves_the_node_unchanged() {
        let GraphPattern::Project { inner, .. } =
            pattern_of("SELECT * WHERE { GRAPH ?g { ?s ?p ?o } }")
        else {
            panic!("expected projection");
        };
        let rewritten = ground(&inner, "g", Literal::new("not-a-graph-name"));
        assert_eq!(rewritten, inner.to_string());
    }

    #[test]
    fn does_not_rewrite_inside_service() {
        let GraphPattern::Project { inner, .. } = pattern_of(
            "SELECT * WHERE { SERVICE <http://example.org/sparql> { ?s ?p ?o } }",
        ) else {
            panic!("expected projection");
        };
        assert_eq!(rename(&inner, "o", "x"), inner.to_string());
    }

    #[test]
    fn does_not_rewrite_inside_subqueries() {
        let GraphPattern::Project { inner, .. } =
            pattern_of("SELECT * WHERE { { SELECT ?o WHERE { ?s ?p ?o } } }")
        else {
            panic!("expected projection");
        };
        assert_eq!(rename(&inner, "o", "x"), inner.to_string());
    }

    #[test]
    fn does_not_rewrite_repeating_path_endpoints() {
        let GraphPattern::Project { inner, .. } = pattern_of(
            "PREFIX ex: <http://example.org/> SELECT * WHERE { ?s ex:p+ ?o }",
        ) else {
            panic!("expected projection");
        };
        assert_eq!(rename(&inner, "o", "x"), inner.to_string());
    }

    #[test]
    fn grounds_a_variable_to_a_literal_in_object_position() {
        let GraphPattern::Project { inner, .. } = pattern_of("SELECT * WHERE { ?s ?p ?o }")
        else {
            panic!("expected projection");
        };
        let rewritten = ground(&inner, "o", Literal::new("42"));
        assert!(rewritten.contains("(triple ?s ?p \"42\")"));
    }

    #[test]
    fn literal_replacement_in_predicate_position_leaves_the_bgp_unchanged() {
        let GraphPattern::Project { inner, .. } = pattern_of("SELECT * WHERE { ?s ?p ?o }")
        else {
            panic!("expected projection");
        };
        assert_eq!(ground(&inner, "p", Literal::new("x")), inner.to_string());
    }
}
