use rdf_quarry_model::{Literal, NamedNode, Term, Variable};
use rustc_hash::FxHashSet;
use std::fmt;

/// A scalar filter expression.
///
/// Rendered in the same s-expression style as [`GraphPattern`], so optimizer
/// tests can assert on the shape of a whole plan.
///
/// [`GraphPattern`]: crate::GraphPattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    NamedNode(NamedNode),
    Literal(Literal),
    Variable(Variable),
    Or(Box<Self>, Box<Self>),
    And(Box<Self>, Box<Self>),
    Not(Box<Self>),
    Equal(Box<Self>, Box<Self>),
    SameTerm(Box<Self>, Box<Self>),
    Greater(Box<Self>, Box<Self>),
    GreaterOrEqual(Box<Self>, Box<Self>),
    Less(Box<Self>, Box<Self>),
    LessOrEqual(Box<Self>, Box<Self>),
    Add(Box<Self>, Box<Self>),
    Subtract(Box<Self>, Box<Self>),
    Multiply(Box<Self>, Box<Self>),
    Divide(Box<Self>, Box<Self>),
    UnaryMinus(Box<Self>),
    Bound(Variable),
    FunctionCall(Function, Vec<Self>),
}

impl Expression {
    /// Collects every variable the expression mentions.
    pub fn variables(&self) -> FxHashSet<Variable> {
        let mut out = FxHashSet::default();
        self.add_variables(&mut out);
        out
    }

    pub(crate) fn add_variables(&self, out: &mut FxHashSet<Variable>) {
        match self {
            Self::NamedNode(_) | Self::Literal(_) => {}
            Self::Variable(v) | Self::Bound(v) => {
                out.insert(v.clone());
            }
            Self::Or(a, b)
            | Self::And(a, b)
            | Self::Equal(a, b)
            | Self::SameTerm(a, b)
            | Self::Greater(a, b)
            | Self::GreaterOrEqual(a, b)
            | Self::Less(a, b)
            | Self::LessOrEqual(a, b)
            | Self::Add(a, b)
            | Self::Subtract(a, b)
            | Self::Multiply(a, b)
            | Self::Divide(a, b) => {
                a.add_variables(out);
                b.add_variables(out);
            }
            Self::Not(inner) | Self::UnaryMinus(inner) => inner.add_variables(out),
            Self::FunctionCall(_, args) => {
                for arg in args {
                    arg.add_variables(out);
                }
            }
        }
    }

    /// Matches `?a = ?b` and `sameTerm(?a, ?b)`, the shapes the implicit
    /// join rewrite recognizes.
    pub fn as_variable_equality(&self) -> Option<(&Variable, &Variable)> {
        match self {
            Self::Equal(a, b) | Self::SameTerm(a, b) => match (a.as_ref(), b.as_ref()) {
                (Self::Variable(a), Self::Variable(b)) if a != b => Some((a, b)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl From<Term> for Expression {
    fn from(term: Term) -> Self {
        match term {
            Term::NamedNode(node) => Self::NamedNode(node),
            Term::BlankNode(node) => {
                // Blank nodes in expressions only arise from substitution and
                // behave like constants without a lexical form to print.
                Self::Literal(Literal::new(node.to_string()))
            }
            Term::Literal(literal) => Self::Literal(literal),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn binary(
            f: &mut fmt::Formatter<'_>,
            op: &str,
            a: &Expression,
            b: &Expression,
        ) -> fmt::Result {
            write!(f, "({op} {a} {b})")
        }
        match self {
            Self::NamedNode(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
            Self::Variable(variable) => variable.fmt(f),
            Self::Or(a, b) => binary(f, "||", a, b),
            Self::And(a, b) => binary(f, "&&", a, b),
            Self::Not(inner) => write!(f, "(! {inner})"),
            Self::Equal(a, b) => binary(f, "=", a, b),
            Self::SameTerm(a, b) => binary(f, "sameTerm", a, b),
            Self::Greater(a, b) => binary(f, ">", a, b),
            Self::GreaterOrEqual(a, b) => binary(f, ">=", a, b),
            Self::Less(a, b) => binary(f, "<", a, b),
            Self::LessOrEqual(a, b) => binary(f, "<=", a, b),
            Self::Add(a, b) => binary(f, "+", a, b),
            Self::Subtract(a, b) => binary(f, "-", a, b),
            Self::Multiply(a, b) => binary(f, "*", a, b),
            Self::Divide(a, b) => binary(f, "/", a, b),
            Self::UnaryMinus(inner) => write!(f, "(- {inner})"),
            Self::Bound(variable) => write!(f, "(bound {variable})"),
            Self::FunctionCall(function, args) => {
                write!(f, "({function}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// The built-in scalar functions the engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Str,
    Lang,
    LangMatches,
    Datatype,
    Contains,
    StrStarts,
    StrEnds,
    Concat,
    SubStr,
    StrLen,
    UCase,
    LCase,
    IsIri,
    IsBlank,
    IsLiteral,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Lang => "lang",
            Self::LangMatches => "langMatches",
            Self::Datatype => "datatype",
            Self::Contains => "contains",
            Self::StrStarts => "strstarts",
            Self::StrEnds => "strends",
            Self::Concat => "concat",
            Self::SubStr => "substr",
            Self::StrLen => "strlen",
            Self::UCase => "ucase",
            Self::LCase => "lcase",
            Self::IsIri => "isIRI",
            Self::IsBlank => "isBlank",
            Self::IsLiteral => "isLiteral",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single ORDER BY condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderExpression {
    Asc(Expression),
    Desc(Expression),
}

impl fmt::Display for OrderExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc(e) => write!(f, "(asc {e})"),
            Self::Desc(e) => write!(f, "(desc {e})"),
        }
    }
}
