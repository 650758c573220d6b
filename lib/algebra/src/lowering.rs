//! Lowering of `spargebra` parse trees into the engine's algebra.

use crate::expression::{Expression, Function, OrderExpression};
use crate::graph_pattern::{
    GraphPattern, NamedNodePattern, PropertyPath, TermPattern, TriplePattern,
};
use crate::query::{Query, QueryForm};
use rdf_quarry_model::{vocab, BlankNode, Literal, NamedNode, Variable};
use spargebra::algebra as alg;
use spargebra::term;

/// An error raised while turning query text into algebra.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryParseError {
    #[error(transparent)]
    Syntax(#[from] spargebra::SparqlSyntaxError),
    /// The query parsed but uses a feature outside the supported fragment.
    #[error("unsupported query feature: {0}")]
    Unsupported(String),
}

fn unsupported(what: impl Into<String>) -> QueryParseError {
    QueryParseError::Unsupported(what.into())
}

pub(crate) fn lower_query(query: &spargebra::Query) -> Result<Query, QueryParseError> {
    match query {
        spargebra::Query::Select { pattern, .. } => Ok(Query::new(
            QueryForm::Select,
            lower_pattern(pattern)?,
        )),
        spargebra::Query::Ask { pattern, .. } => {
            Ok(Query::new(QueryForm::Ask, lower_pattern(pattern)?))
        }
        spargebra::Query::Construct { .. } => Err(unsupported("CONSTRUCT queries")),
        spargebra::Query::Describe { .. } => Err(unsupported("DESCRIBE queries")),
    }
}

fn lower_pattern(pattern: &alg::GraphPattern) -> Result<GraphPattern, QueryParseError> {
    Ok(match pattern {
        alg::GraphPattern::Bgp { patterns } => GraphPattern::Bgp {
            patterns: patterns
                .iter()
                .map(lower_triple_pattern)
                .collect::<Result<_, _>>()?,
        },
        alg::GraphPattern::Path {
            subject,
            path,
            object,
        } => GraphPattern::Path {
            subject: lower_term_pattern(subject)?,
            path: lower_path(path),
            object: lower_term_pattern(object)?,
        },
        alg::GraphPattern::Join { left, right } => {
            let left = lower_pattern(left)?;
            let right = lower_pattern(right)?;
            // Operands with no variable in common can never constrain each
            // other, so the join is really a cross product.
            if left
                .visible_variables()
                .is_disjoint(&right.visible_variables())
            {
                GraphPattern::Product {
                    left: Box::new(left),
                    right: Box::new(right),
                }
            } else {
                GraphPattern::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        }
        alg::GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(lower_pattern(left)?),
            right: Box::new(lower_pattern(right)?),
            expression: expression.as_ref().map(lower_expression).transpose()?,
        },
        alg::GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expression: lower_expression(expr)?,
            inner: Box::new(lower_pattern(inner)?),
        },
        alg::GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(lower_pattern(left)?),
            right: Box::new(lower_pattern(right)?),
        },
        alg::GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name: lower_named_node_pattern(name),
            inner: Box::new(lower_pattern(inner)?),
        },
        alg::GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(lower_pattern(inner)?),
            variable: lower_variable(variable),
            expression: lower_expression(expression)?,
        },
        alg::GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(lower_pattern(left)?),
            right: Box::new(lower_pattern(right)?),
        },
        alg::GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(lower_pattern(inner)?),
            variables: variables.iter().map(lower_variable).collect(),
        },
        alg::GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name: lower_named_node_pattern(name),
            inner: Box::new(lower_pattern(inner)?),
            silent: *silent,
        },
        alg::GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(lower_pattern(inner)?),
        },
        alg::GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(lower_pattern(inner)?),
        },
        alg::GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(lower_pattern(inner)?),
            start: *start,
            length: *length,
        },
        alg::GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(lower_pattern(inner)?),
            expression: expression
                .iter()
                .map(lower_order_expression)
                .collect::<Result<_, _>>()?,
        },
        pattern => return Err(unsupported(format!("{pattern:?}"))),
    })
}

fn lower_triple_pattern(pattern: &term::TriplePattern) -> Result<TriplePattern, QueryParseError> {
    Ok(TriplePattern {
        subject: lower_term_pattern(&pattern.subject)?,
        predicate: lower_named_node_pattern(&pattern.predicate),
        object: lower_term_pattern(&pattern.object)?,
    })
}

fn lower_term_pattern(pattern: &term::TermPattern) -> Result<TermPattern, QueryParseError> {
    Ok(match pattern {
        term::TermPattern::NamedNode(n) => TermPattern::NamedNode(lower_named_node(n)),
        term::TermPattern::BlankNode(n) => {
            TermPattern::BlankNode(BlankNode::new(n.as_str()))
        }
        term::TermPattern::Literal(l) => TermPattern::Literal(lower_literal(l)),
        term::TermPattern::Variable(v) => TermPattern::Variable(lower_variable(v)),
    })
}

fn lower_named_node_pattern(pattern: &term::NamedNodePattern) -> NamedNodePattern {
    match pattern {
        term::NamedNodePattern::NamedNode(n) => NamedNodePattern::NamedNode(lower_named_node(n)),
        term::NamedNodePattern::Variable(v) => NamedNodePattern::Variable(lower_variable(v)),
    }
}

fn lower_path(path: &alg::PropertyPathExpression) -> PropertyPath {
    match path {
        alg::PropertyPathExpression::NamedNode(n) => PropertyPath::Predicate(lower_named_node(n)),
        alg::PropertyPathExpression::Reverse(p) => PropertyPath::Reverse(Box::new(lower_path(p))),
        alg::PropertyPathExpression::Sequence(a, b) => {
            PropertyPath::Sequence(Box::new(lower_path(a)), Box::new(lower_path(b)))
        }
        alg::PropertyPathExpression::Alternative(a, b) => {
            PropertyPath::Alternative(Box::new(lower_path(a)), Box::new(lower_path(b)))
        }
        alg::PropertyPathExpression::ZeroOrOne(p) => {
            PropertyPath::ZeroOrOne(Box::new(lower_path(p)))
        }
        alg::PropertyPathExpression::ZeroOrMore(p) => {
            PropertyPath::ZeroOrMore(Box::new(lower_path(p)))
        }
        alg::PropertyPathExpression::OneOrMore(p) => {
            PropertyPath::OneOrMore(Box::new(lower_path(p)))
        }
        alg::PropertyPathExpression::NegatedPropertySet(ps) => {
            PropertyPath::NegatedPropertySet(ps.iter().map(lower_named_node).collect())
        }
    }
}

fn lower_expression(expression: &alg::Expression) -> Result<Expression, QueryParseError> {
    fn binary(
        ctor: fn(Box<Expression>, Box<Expression>) -> Expression,
        a: &alg::Expression,
        b: &alg::Expression,
    ) -> Result<Expression, QueryParseError> {
        Ok(ctor(
            Box::new(lower_expression(a)?),
            Box::new(lower_expression(b)?),
        ))
    }
    match expression {
        alg::Expression::NamedNode(n) => Ok(Expression::NamedNode(lower_named_node(n))),
        alg::Expression::Literal(l) => Ok(Expression::Literal(lower_literal(l))),
        alg::Expression::Variable(v) => Ok(Expression::Variable(lower_variable(v))),
        alg::Expression::Or(a, b) => binary(Expression::Or, a, b),
        alg::Expression::And(a, b) => binary(Expression::And, a, b),
        alg::Expression::Not(inner) => Ok(Expression::Not(Box::new(lower_expression(inner)?))),
        alg::Expression::Equal(a, b) => binary(Expression::Equal, a, b),
        alg::Expression::SameTerm(a, b) => binary(Expression::SameTerm, a, b),
        alg::Expression::Greater(a, b) => binary(Expression::Greater, a, b),
        alg::Expression::GreaterOrEqual(a, b) => binary(Expression::GreaterOrEqual, a, b),
        alg::Expression::Less(a, b) => binary(Expression::Less, a, b),
        alg::Expression::LessOrEqual(a, b) => binary(Expression::LessOrEqual, a, b),
        alg::Expression::Add(a, b) => binary(Expression::Add, a, b),
        alg::Expression::Subtract(a, b) => binary(Expression::Subtract, a, b),
        alg::Expression::Multiply(a, b) => binary(Expression::Multiply, a, b),
        alg::Expression::Divide(a, b) => binary(Expression::Divide, a, b),
        alg::Expression::UnaryPlus(inner) => lower_expression(inner),
        alg::Expression::UnaryMinus(inner) => {
            Ok(Expression::UnaryMinus(Box::new(lower_expression(inner)?)))
        }
        alg::Expression::Bound(v) => Ok(Expression::Bound(lower_variable(v))),
        alg::Expression::FunctionCall(function, args) => {
            let function = lower_function(function)?;
            let args = args
                .iter()
                .map(lower_expression)
                .collect::<Result<_, _>>()?;
            Ok(Expression::FunctionCall(function, args))
        }
        expression => Err(unsupported(format!("{expression:?}"))),
    }
}

fn lower_function(function: &alg::Function) -> Result<Function, QueryParseError> {
    Ok(match function {
        alg::Function::Str => Function::Str,
        alg::Function::Lang => Function::Lang,
        alg::Function::LangMatches => Function::LangMatches,
        alg::Function::Datatype => Function::Datatype,
        alg::Function::Contains => Function::Contains,
        alg::Function::StrStarts => Function::StrStarts,
        alg::Function::StrEnds => Function::StrEnds,
        alg::Function::Concat => Function::Concat,
        alg::Function::SubStr => Function::SubStr,
        alg::Function::StrLen => Function::StrLen,
        alg::Function::UCase => Function::UCase,
        alg::Function::LCase => Function::LCase,
        alg::Function::IsIri => Function::IsIri,
        alg::Function::IsBlank => Function::IsBlank,
        alg::Function::IsLiteral => Function::IsLiteral,
        function => return Err(unsupported(format!("function {function}"))),
    })
}

fn lower_order_expression(
    expression: &alg::OrderExpression,
) -> Result<OrderExpression, QueryParseError> {
    Ok(match expression {
        alg::OrderExpression::Asc(e) => OrderExpression::Asc(lower_expression(e)?),
        alg::OrderExpression::Desc(e) => OrderExpression::Desc(lower_expression(e)?),
    })
}

fn lower_named_node(node: &term::NamedNode) -> NamedNode {
    NamedNode::new(node.as_str())
}

fn lower_variable(variable: &term::Variable) -> Variable {
    Variable::new(variable.as_str())
}

/// `xsd:string`-typed literals without a language tag are represented as
/// plain literals, keeping the plain vs. typed distinction meaningful for
/// terms built programmatically while staying consistent for parsed ones.
fn lower_literal(literal: &term::Literal) -> Literal {
    let (value, datatype, language) = literal.clone().destruct();
    if let Some(language) = language {
        Literal::new_language_tagged(value, language)
    } else {
        match datatype {
            Some(datatype) if datatype.as_str() != vocab::xsd::STRING => {
                Literal::new_typed(value, NamedNode::new(datatype.as_str()))
            }
            _ => Literal::new(value),
        }
    }
}
