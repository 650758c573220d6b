//! Query evaluation for the RDF Quarry engine: the [`Dataset`] abstraction,
//! the recursive evaluator, scalar expression evaluation, and the
//! deadline-aware [`QueryEngine`] entry point.

mod context;
mod dataset;
mod engine;
mod error;
mod eval;
pub mod expression;
mod query_results;

pub use context::EvaluationContext;
pub use dataset::{ActiveGraph, Dataset, MemoryDataset, TripleIter};
pub use engine::{QueryEngine, DEFAULT_QUERY_TIMEOUT_MS};
pub use error::{DatasetError, EvaluationError, ExpressionError};
pub use eval::SimpleEvaluator;
pub use query_results::{QueryResults, QuerySolutions};
