use crate::lowering::lower_query;
use crate::{GraphPattern, QueryParseError};
use std::fmt;
use std::time::Duration;

/// The query form, which decides how results are shaped and which
/// specializations the optimizer may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
}

/// A parsed and lowered query: the algebra tree plus per-query execution
/// settings.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) form: QueryForm,
    pub(crate) pattern: GraphPattern,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: usize,
    timeout_ms: u64,
    partial_results_on_timeout: bool,
    execution_time: Option<Duration>,
}

impl Query {
    /// Parses a SPARQL query string and lowers it into the engine's algebra.
    pub fn parse(query: &str, base_iri: Option<&str>) -> Result<Self, QueryParseError> {
        let parsed = spargebra::Query::parse(query, base_iri)?;
        lower_query(&parsed)
    }

    pub(crate) fn new(form: QueryForm, pattern: GraphPattern) -> Self {
        let (offset, limit) = match &pattern {
            GraphPattern::Slice { start, length, .. } => (*start, *length),
            _ => (0, None),
        };
        Self {
            form,
            pattern,
            limit,
            offset,
            timeout_ms: 0,
            partial_results_on_timeout: false,
            execution_time: None,
        }
    }

    pub fn form(&self) -> QueryForm {
        self.form
    }

    pub fn pattern(&self) -> &GraphPattern {
        &self.pattern
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The per-query timeout in milliseconds. Zero means "use the engine's
    /// default"; a nonzero value overrides the default entirely.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Whether an expired deadline should surface the solutions accumulated
    /// so far instead of failing the query.
    pub fn partial_results_on_timeout(&self) -> bool {
        self.partial_results_on_timeout
    }

    pub fn set_partial_results_on_timeout(&mut self, partial: bool) {
        self.partial_results_on_timeout = partial;
    }

    /// Wall-clock time of the last evaluation, including one that timed out.
    pub fn execution_time(&self) -> Option<Duration> {
        self.execution_time
    }

    pub fn set_execution_time(&mut self, execution_time: Duration) {
        self.execution_time = Some(execution_time);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pattern.fmt(f)
    }
}
