use crate::expression::{Expression, OrderExpression};
use rdf_quarry_model::{BlankNode, Literal, NamedNode, Term, Variable};
use rustc_hash::FxHashSet;
use std::fmt;

/// A subject or object position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermPattern {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
    Variable(Variable),
}

impl TermPattern {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The ground term of this position, if it is not a variable.
    pub fn as_term(&self) -> Option<Term> {
        match self {
            Self::NamedNode(n) => Some(n.clone().into()),
            Self::BlankNode(n) => Some(n.clone().into()),
            Self::Literal(l) => Some(l.clone().into()),
            Self::Variable(_) => None,
        }
    }
}

impl From<Term> for TermPattern {
    fn from(term: Term) -> Self {
        match term {
            Term::NamedNode(n) => Self::NamedNode(n),
            Term::BlankNode(n) => Self::BlankNode(n),
            Term::Literal(l) => Self::Literal(l),
        }
    }
}

impl From<Variable> for TermPattern {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(n) => n.fmt(f),
            Self::BlankNode(n) => n.fmt(f),
            Self::Literal(l) => l.fmt(f),
            Self::Variable(v) => v.fmt(f),
        }
    }
}

/// A predicate position or a graph selector: an IRI or a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedNodePattern {
    NamedNode(NamedNode),
    Variable(Variable),
}

impl NamedNodePattern {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for NamedNodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode(n) => n.fmt(f),
            Self::Variable(v) => v.fmt(f),
        }
    }
}

/// A triple pattern inside a basic graph pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: NamedNodePattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<TermPattern>,
        predicate: NamedNodePattern,
        object: impl Into<TermPattern>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.subject
            .as_variable()
            .into_iter()
            .chain(self.predicate.as_variable())
            .chain(self.object.as_variable())
    }

    pub fn mentions_variable(&self, variable: &Variable) -> bool {
        self.variables().any(|v| v == variable)
    }

    /// True when all three positions are variables, so the pattern matches
    /// every triple in the active graph.
    pub fn is_accept_all(&self) -> bool {
        matches!(
            self,
            Self {
                subject: TermPattern::Variable(_),
                predicate: NamedNodePattern::Variable(_),
                object: TermPattern::Variable(_),
            }
        )
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(triple {} {} {})", self.subject, self.predicate, self.object)
    }
}

/// A property path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    Predicate(NamedNode),
    Reverse(Box<Self>),
    Sequence(Box<Self>, Box<Self>),
    Alternative(Box<Self>, Box<Self>),
    ZeroOrOne(Box<Self>),
    ZeroOrMore(Box<Self>),
    OneOrMore(Box<Self>),
    NegatedPropertySet(Vec<NamedNode>),
}

impl PropertyPath {
    /// True when the path contains a `*` or `+` repetition anywhere. Such
    /// paths are opaque to variable substitution because a rewrite could
    /// change which nodes the closure reaches.
    pub fn has_repetition(&self) -> bool {
        match self {
            Self::Predicate(_) | Self::NegatedPropertySet(_) => false,
            Self::Reverse(inner) | Self::ZeroOrOne(inner) => inner.has_repetition(),
            Self::Sequence(a, b) | Self::Alternative(a, b) => {
                a.has_repetition() || b.has_repetition()
            }
            Self::ZeroOrMore(_) | Self::OneOrMore(_) => true,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(p) => p.fmt(f),
            Self::Reverse(p) => write!(f, "(reverse {p})"),
            Self::Sequence(a, b) => write!(f, "(seq {a} {b})"),
            Self::Alternative(a, b) => write!(f, "(alt {a} {b})"),
            Self::ZeroOrOne(p) => write!(f, "(path? {p})"),
            Self::ZeroOrMore(p) => write!(f, "(path* {p})"),
            Self::OneOrMore(p) => write!(f, "(path+ {p})"),
            Self::NegatedPropertySet(ps) => {
                f.write_str("(notoneof")?;
                for p in ps {
                    write!(f, " {p}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A node of the query algebra tree.
///
/// The tree is immutable; rewrites rebuild the nodes they change. The last
/// five variants are evaluation-oriented specializations that only the
/// optimizer introduces, never the lowering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphPattern {
    /// A basic graph pattern, evaluated as an incremental nested-loop join
    /// over its triple patterns in order.
    Bgp { patterns: Vec<TriplePattern> },
    Path {
        subject: TermPattern,
        path: PropertyPath,
        object: TermPattern,
    },
    Join {
        left: Box<Self>,
        right: Box<Self>,
    },
    /// A join of two variable-disjoint operands, i.e. a cross product.
    Product {
        left: Box<Self>,
        right: Box<Self>,
    },
    LeftJoin {
        left: Box<Self>,
        right: Box<Self>,
        expression: Option<Expression>,
    },
    Filter {
        expression: Expression,
        inner: Box<Self>,
    },
    Union {
        left: Box<Self>,
        right: Box<Self>,
    },
    Graph {
        name: NamedNodePattern,
        inner: Box<Self>,
    },
    Extend {
        inner: Box<Self>,
        variable: Variable,
        expression: Expression,
    },
    Minus {
        left: Box<Self>,
        right: Box<Self>,
    },
    /// A projection. Also the scope boundary of a subquery: rewrites never
    /// reach through it.
    Project {
        inner: Box<Self>,
        variables: Vec<Variable>,
    },
    /// A federated sub-pattern. Opaque to every rewrite and not evaluable
    /// without an external connector.
    Service {
        name: NamedNodePattern,
        inner: Box<Self>,
        silent: bool,
    },
    Distinct {
        inner: Box<Self>,
    },
    Reduced {
        inner: Box<Self>,
    },
    Slice {
        inner: Box<Self>,
        start: usize,
        length: Option<usize>,
    },
    OrderBy {
        inner: Box<Self>,
        expression: Vec<OrderExpression>,
    },
    /// A BGP evaluated for an ASK query: stops after the first solution.
    AskBgp { patterns: Vec<TriplePattern> },
    /// A union evaluated for an ASK query: the right branch only runs when
    /// the left produced nothing.
    AskUnion {
        left: Box<Self>,
        right: Box<Self>,
    },
    /// A BGP that stops once `required` solutions have been produced.
    LazyBgp {
        patterns: Vec<TriplePattern>,
        required: usize,
    },
    /// A union that stops once `required` solutions have been produced.
    LazyUnion {
        left: Box<Self>,
        right: Box<Self>,
        required: usize,
    },
    /// A cross product with a filter applied pairwise during enumeration
    /// instead of over the materialized product.
    FilteredProduct {
        left: Box<Self>,
        right: Box<Self>,
        expression: Expression,
    },
}

impl GraphPattern {
    /// Collects the variables a solution of this pattern may bind.
    pub fn visible_variables(&self) -> FxHashSet<Variable> {
        let mut out = FxHashSet::default();
        self.add_visible_variables(&mut out);
        out
    }

    fn add_visible_variables(&self, out: &mut FxHashSet<Variable>) {
        match self {
            Self::Bgp { patterns } | Self::AskBgp { patterns } | Self::LazyBgp { patterns, .. } => {
                for pattern in patterns {
                    out.extend(pattern.variables().cloned());
                }
            }
            Self::Path {
                subject, object, ..
            } => {
                out.extend(subject.as_variable().cloned());
                out.extend(object.as_variable().cloned());
            }
            Self::Join { left, right }
            | Self::Product { left, right }
            | Self::Union { left, right }
            | Self::AskUnion { left, right }
            | Self::LazyUnion { left, right, .. }
            | Self::LeftJoin { left, right, .. }
            | Self::FilteredProduct { left, right, .. } => {
                left.add_visible_variables(out);
                right.add_visible_variables(out);
            }
            Self::Minus { left, .. } => left.add_visible_variables(out),
            Self::Filter { inner, .. }
            | Self::Distinct { inner }
            | Self::Reduced { inner }
            | Self::Slice { inner, .. }
            | Self::OrderBy { inner, .. }
            | Self::Service { inner, .. } => inner.add_visible_variables(out),
            Self::Graph { name, inner } => {
                out.extend(name.as_variable().cloned());
                inner.add_visible_variables(out);
            }
            Self::Extend {
                inner, variable, ..
            } => {
                out.insert(variable.clone());
                inner.add_visible_variables(out);
            }
            Self::Project { variables, .. } => out.extend(variables.iter().cloned()),
        }
    }

    /// Collects the variables bound in every solution of this pattern.
    ///
    /// Unlike [`Self::visible_variables`], which is a may-bind set, a
    /// variable bound by only one union branch, on the right of a left
    /// join, or by an extend whose expression can fail is left out.
    pub fn certain_variables(&self) -> FxHashSet<Variable> {
        match self {
            Self::Bgp { patterns } | Self::AskBgp { patterns } | Self::LazyBgp { patterns, .. } => {
                patterns
                    .iter()
                    .flat_map(|p| p.variables().cloned())
                    .collect()
            }
            Self::Path {
                subject, object, ..
            } => subject
                .as_variable()
                .into_iter()
                .chain(object.as_variable())
                .cloned()
                .collect(),
            Self::Join { left, right }
            | Self::Product { left, right }
            | Self::FilteredProduct { left, right, .. } => {
                let mut out = left.certain_variables();
                out.extend(right.certain_variables());
                out
            }
            Self::Union { left, right }
            | Self::AskUnion { left, right }
            | Self::LazyUnion { left, right, .. } => {
                let right = right.certain_variables();
                left.certain_variables()
                    .into_iter()
                    .filter(|v| right.contains(v))
                    .collect()
            }
            Self::LeftJoin { left, .. } | Self::Minus { left, .. } => left.certain_variables(),
            Self::Filter { inner, .. }
            | Self::Distinct { inner }
            | Self::Reduced { inner }
            | Self::Slice { inner, .. }
            | Self::OrderBy { inner, .. }
            | Self::Extend { inner, .. } => inner.certain_variables(),
            Self::Graph { name, inner } => {
                let mut out = inner.certain_variables();
                out.extend(name.as_variable().cloned());
                out
            }
            Self::Project { inner, variables } => {
                let inner = inner.certain_variables();
                variables
                    .iter()
                    .filter(|v| inner.contains(*v))
                    .cloned()
                    .collect()
            }
            Self::Service { .. } => FxHashSet::default(),
        }
    }

    /// True when the variable occurs anywhere in the subtree, including in
    /// expressions, graph selectors, and projection lists.
    pub fn mentions_variable(&self, variable: &Variable) -> bool {
        match self {
            Self::Bgp { patterns } | Self::AskBgp { patterns } | Self::LazyBgp { patterns, .. } => {
                patterns.iter().any(|p| p.mentions_variable(variable))
            }
            Self::Path {
                subject, object, ..
            } => {
                subject.as_variable() == Some(variable) || object.as_variable() == Some(variable)
            }
            Self::Join { left, right }
            | Self::Product { left, right }
            | Self::Union { left, right }
            | Self::AskUnion { left, right }
            | Self::LazyUnion { left, right, .. }
            | Self::Minus { left, right } => {
                left.mentions_variable(variable) || right.mentions_variable(variable)
            }
            Self::LeftJoin {
                left,
                right,
                expression,
            } => {
                left.mentions_variable(variable)
                    || right.mentions_variable(variable)
                    || expression
                        .as_ref()
                        .is_some_and(|e| e.variables().contains(variable))
            }
            Self::FilteredProduct {
                left,
                right,
                expression,
            } => {
                left.mentions_variable(variable)
                    || right.mentions_variable(variable)
                    || expression.variables().contains(variable)
            }
            Self::Filter { expression, inner } => {
                expression.variables().contains(variable) || inner.mentions_variable(variable)
            }
            Self::Graph { name, inner } => {
                name.as_variable() == Some(variable) || inner.mentions_variable(variable)
            }
            Self::Extend {
                inner,
                variable: var,
                expression,
            } => {
                var == variable
                    || expression.variables().contains(variable)
                    || inner.mentions_variable(variable)
            }
            Self::Project { inner, variables } => {
                variables.contains(variable) || inner.mentions_variable(variable)
            }
            Self::Service { name, inner, .. } => {
                name.as_variable() == Some(variable) || inner.mentions_variable(variable)
            }
            Self::Distinct { inner } | Self::Reduced { inner } | Self::Slice { inner, .. } => {
                inner.mentions_variable(variable)
            }
            Self::OrderBy { inner, expression } => {
                inner.mentions_variable(variable)
                    || expression.iter().any(|e| {
                        let (OrderExpression::Asc(e) | OrderExpression::Desc(e)) = e;
                        e.variables().contains(variable)
                    })
            }
        }
    }
}

fn fmt_patterns(f: &mut fmt::Formatter<'_>, patterns: &[TriplePattern]) -> fmt::Result {
    for pattern in patterns {
        write!(f, " {pattern}")?;
    }
    f.write_str(")")
}

impl fmt::Display for GraphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bgp { patterns } => {
                f.write_str("(bgp")?;
                fmt_patterns(f, patterns)
            }
            Self::Path {
                subject,
                path,
                object,
            } => write!(f, "(path {subject} {path} {object})"),
            Self::Join { left, right } => write!(f, "(join {left} {right})"),
            Self::Product { left, right } => write!(f, "(product {left} {right})"),
            Self::LeftJoin {
                left,
                right,
                expression,
            } => match expression {
                Some(e) => write!(f, "(leftjoin {left} {right} {e})"),
                None => write!(f, "(leftjoin {left} {right})"),
            },
            Self::Filter { expression, inner } => write!(f, "(filter {expression} {inner})"),
            Self::Union { left, right } => write!(f, "(union {left} {right})"),
            Self::Graph { name, inner } => write!(f, "(graph {name} {inner})"),
            Self::Extend {
                inner,
                variable,
                expression,
            } => write!(f, "(extend ({variable} {expression}) {inner})"),
            Self::Minus { left, right } => write!(f, "(minus {left} {right})"),
            Self::Project { inner, variables } => {
                f.write_str("(project (")?;
                for (i, v) in variables.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    v.fmt(f)?;
                }
                write!(f, ") {inner})")
            }
            Self::Service {
                name,
                inner,
                silent,
            } => {
                if *silent {
                    write!(f, "(service silent {name} {inner})")
                } else {
                    write!(f, "(service {name} {inner})")
                }
            }
            Self::Distinct { inner } => write!(f, "(distinct {inner})"),
            Self::Reduced { inner } => write!(f, "(reduced {inner})"),
            Self::Slice {
                inner,
                start,
                length,
            } => match length {
                Some(length) => write!(f, "(slice {start} {length} {inner})"),
                None => write!(f, "(slice {start} _ {inner})"),
            },
            Self::OrderBy { inner, expression } => {
                f.write_str("(order (")?;
                for (i, e) in expression.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    e.fmt(f)?;
                }
                write!(f, ") {inner})")
            }
            Self::AskBgp { patterns } => {
                f.write_str("(ask-bgp")?;
                fmt_patterns(f, patterns)
            }
            Self::AskUnion { left, right } => write!(f, "(ask-union {left} {right})"),
            Self::LazyBgp { patterns, required } => {
                write!(f, "(lazy-bgp {required}")?;
                fmt_patterns(f, patterns)
            }
            Self::LazyUnion {
                left,
                right,
                required,
            } => write!(f, "(lazy-union {required} {left} {right})"),
            Self::FilteredProduct {
                left,
                right,
                expression,
            } => write!(f, "(filtered-product {expression} {left} {right})"),
        }
    }
}
