use rdf_quarry_model::{Term, Variable};
use std::error::Error;

/// An error raised while evaluating a query.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvaluationError {
    /// The deadline expired and the query did not opt into partial results.
    #[error("query evaluation exceeded its timeout")]
    Timeout,
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    /// A BIND target was already bound to a different term.
    #[error("cannot extend the already bound variable {0}")]
    ExtendConflict(Variable),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// SERVICE patterns need an external connector this engine does not ship.
    #[error("SERVICE evaluation is not supported")]
    UnsupportedService,
}

/// An error raised while evaluating a scalar expression against a solution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExpressionError {
    #[error("the variable {0} is not bound")]
    UnboundVariable(Variable),
    #[error("{function} requires literal arguments, got {term}")]
    NonLiteralArgument { function: &'static str, term: Term },
    /// The two literals fail the string-function argument compatibility
    /// rules (mixed language tags, a language tag next to a typed literal).
    #[error("{function} cannot combine its argument literals")]
    InvalidArgumentPair { function: &'static str },
    #[error("{function} requires a numeric argument")]
    NonNumericArgument { function: &'static str },
    #[error("{function} is not defined for {term}")]
    InvalidArgument { function: &'static str, term: Term },
    #[error("{0} has no effective boolean value")]
    NoEffectiveBooleanValue(Term),
    #[error("cannot compare {0} with {1}")]
    Incomparable(Term, Term),
    #[error("arithmetic requires numeric literals")]
    NonNumericOperand,
    #[error("{function} called with the wrong number of arguments")]
    WrongArity { function: &'static str },
    #[error("division by zero")]
    DivisionByZero,
}

/// An error reported by the dataset backing the query. Kept opaque so any
/// storage can slot in behind the [`Dataset`] trait.
///
/// [`Dataset`]: crate::Dataset
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DatasetError(Box<dyn Error + Send + Sync>);

impl DatasetError {
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(error.into())
    }
}
