//! Query algebra for the RDF Quarry engine: the operator tree, lowering
//! from `spargebra` parse trees, and the rewrite pipeline.

mod expression;
mod graph_pattern;
mod lowering;
pub mod optimizer;
mod query;
mod transform;

pub use expression::{Expression, Function, OrderExpression};
pub use graph_pattern::{
    GraphPattern, NamedNodePattern, PropertyPath, TermPattern, TriplePattern,
};
pub use lowering::QueryParseError;
pub use optimizer::{Optimizer, Replacement, VariableSubstitution};
pub use query::{Query, QueryForm};
pub use transform::{transform_children, Transformer};
