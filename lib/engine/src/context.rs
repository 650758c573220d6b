use crate::error::EvaluationError;
use rdf_quarry_algebra::Query;
use std::cell::Cell;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// Per-run evaluation state: the cooperative deadline and what to do when it
/// expires. One context is built per `process_query` call and never shared
/// across runs.
#[derive(Debug)]
pub struct EvaluationContext {
    deadline: Option<Instant>,
    effective_timeout: Duration,
    partial_results_on_timeout: bool,
    timed_out: Cell<bool>,
}

impl EvaluationContext {
    /// A nonzero per-query timeout overrides the engine default outright; a
    /// zero per-query value falls back to it. A zero effective timeout means
    /// unlimited.
    pub fn new(query: &Query, default_timeout_ms: u64) -> Self {
        let timeout_ms = if query.timeout_ms() > 0 {
            query.timeout_ms()
        } else {
            default_timeout_ms
        };
        let effective_timeout = Duration::from_millis(timeout_ms);
        let deadline = if timeout_ms > 0 {
            Some(Instant::now() + effective_timeout)
        } else {
            None
        };
        Self {
            deadline,
            effective_timeout,
            partial_results_on_timeout: query.partial_results_on_timeout(),
            timed_out: Cell::new(false),
        }
    }

    /// The resolved timeout this run is using; zero means unlimited.
    pub fn effective_timeout(&self) -> Duration {
        self.effective_timeout
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.get()
    }

    /// Checked at every iteration boundary of the evaluator. `Break` tells
    /// the caller to stop and surface what it has accumulated so far; an
    /// expired deadline without partial results fails the whole query.
    pub fn tick(&self) -> Result<ControlFlow<()>, EvaluationError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.timed_out.set(true);
                if self.partial_results_on_timeout {
                    Ok(ControlFlow::Break(()))
                } else {
                    Err(EvaluationError::Timeout)
                }
            }
            _ => Ok(ControlFlow::Continue(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str) -> Query {
        Query::parse(text, None).unwrap()
    }

    #[test]
    fn per_query_timeout_overrides_the_default() {
        let mut q = query("SELECT * WHERE { ?s ?p ?o }");
        q.set_timeout_ms(500);
        let context = EvaluationContext::new(&q, 180_000);
        assert_eq!(context.effective_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn zero_per_query_timeout_falls_back_to_the_default() {
        let q = query("SELECT * WHERE { ?s ?p ?o }");
        let context = EvaluationContext::new(&q, 2_000);
        assert_eq!(context.effective_timeout(), Duration::from_millis(2_000));
    }

    #[test]
    fn zero_everywhere_means_unlimited() {
        let q = query("SELECT * WHERE { ?s ?p ?o }");
        let context = EvaluationContext::new(&q, 0);
        assert_eq!(context.effective_timeout(), Duration::ZERO);
        assert!(context.tick().unwrap().is_continue());
        assert!(!context.timed_out());
    }

    #[test]
    fn expiry_without_partial_results_is_an_error() {
        let mut q = query("SELECT * WHERE { ?s ?p ?o }");
        q.set_timeout_ms(1);
        let context = EvaluationContext::new(&q, 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(context.tick(), Err(EvaluationError::Timeout)));
        assert!(context.timed_out());
    }

    #[test]
    fn expiry_with_partial_results_breaks() {
        let mut q = query("SELECT * WHERE { ?s ?p ?o }");
        q.set_timeout_ms(1);
        q.set_partial_results_on_timeout(true);
        let context = EvaluationContext::new(&q, 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(context.tick().unwrap().is_break());
        assert!(context.timed_out());
    }
}
