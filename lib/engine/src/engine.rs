use crate::context::EvaluationContext;
use crate::dataset::Dataset;
use crate::error::EvaluationError;
use crate::eval::SimpleEvaluator;
use crate::query_results::{QueryResults, QuerySolutions};
use rdf_quarry_algebra::{Optimizer, Query, QueryForm};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The default query timeout: three minutes.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 180_000;

/// The query engine over a dataset.
///
/// The engine is cheap to share; the default timeout can be adjusted at any
/// time and applies to queries that do not carry their own.
pub struct QueryEngine {
    dataset: Arc<dyn Dataset>,
    default_timeout_ms: AtomicU64,
}

impl QueryEngine {
    pub fn new(dataset: Arc<dyn Dataset>) -> Self {
        Self {
            dataset,
            default_timeout_ms: AtomicU64::new(DEFAULT_QUERY_TIMEOUT_MS),
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms.load(Ordering::Relaxed)
    }

    /// Sets the engine-wide default timeout in milliseconds; zero disables
    /// it.
    pub fn set_default_timeout_ms(&self, timeout_ms: u64) {
        self.default_timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    /// Optimizes and evaluates the query, recording its wall-clock time on
    /// the query itself. The timing is recorded even when evaluation fails.
    pub fn process_query(&self, query: &mut Query) -> Result<QueryResults, EvaluationError> {
        Optimizer::optimize(query);
        let context = EvaluationContext::new(query, self.default_timeout_ms());
        let evaluator = SimpleEvaluator::new(self.dataset.as_ref(), &context);

        let started = Instant::now();
        let evaluated = evaluator.evaluate(query.pattern());
        query.set_execution_time(started.elapsed());
        let solutions = evaluated?;

        Ok(match query.form() {
            QueryForm::Ask => QueryResults::Boolean(!solutions.is_empty()),
            QueryForm::Select => {
                QueryResults::Solutions(QuerySolutions::new(solutions, context.timed_out()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use rdf_quarry_model::{NamedNode, Triple};

    fn engine() -> QueryEngine {
        let mut dataset = MemoryDataset::new();
        let iri = |s: &str| NamedNode::new(format!("http://example.org/{s}"));
        dataset.insert(Triple::new(iri("a"), iri("p"), iri("b")));
        dataset.insert(Triple::new(iri("b"), iri("p"), iri("c")));
        QueryEngine::new(Arc::new(dataset))
    }

    #[test]
    fn ask_returns_a_boolean() {
        let engine = engine();
        let mut query =
            Query::parse("ASK { <http://example.org/a> <http://example.org/p> ?o }", None)
                .unwrap();
        let results = engine.process_query(&mut query).unwrap();
        assert_eq!(results.as_boolean(), Some(true));

        let mut query =
            Query::parse("ASK { <http://example.org/c> <http://example.org/p> ?o }", None)
                .unwrap();
        let results = engine.process_query(&mut query).unwrap();
        assert_eq!(results.as_boolean(), Some(false));
    }

    #[test]
    fn select_returns_solutions_and_records_timing() {
        let engine = engine();
        let mut query = Query::parse("SELECT ?s WHERE { ?s ?p ?o }", None).unwrap();
        assert!(query.execution_time().is_none());
        let results = engine.process_query(&mut query).unwrap();
        let solutions = results.into_solutions().unwrap();
        assert_eq!(solutions.len(), 2);
        assert!(!solutions.is_partial());
        assert!(query.execution_time().is_some());
    }

    #[test]
    fn default_timeout_is_adjustable() {
        let engine = engine();
        assert_eq!(engine.default_timeout_ms(), DEFAULT_QUERY_TIMEOUT_MS);
        engine.set_default_timeout_ms(0);
        assert_eq!(engine.default_timeout_ms(), 0);
    }
}
