use rdf_quarry_model::Solution;

/// The outcome of a successful evaluation.
#[derive(Debug, Clone)]
pub enum QueryResults {
    /// SELECT results, possibly cut short by a timeout.
    Solutions(QuerySolutions),
    /// ASK result.
    Boolean(bool),
}

impl QueryResults {
    pub fn into_solutions(self) -> Option<QuerySolutions> {
        match self {
            Self::Solutions(solutions) => Some(solutions),
            Self::Boolean(_) => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Solutions(_) => None,
        }
    }
}

/// A materialized solution sequence with its completeness flag.
#[derive(Debug, Clone)]
pub struct QuerySolutions {
    solutions: Vec<Solution>,
    partial: bool,
}

impl QuerySolutions {
    pub(crate) fn new(solutions: Vec<Solution>, partial: bool) -> Self {
        Self { solutions, partial }
    }

    /// True when the deadline expired and the sequence is a prefix of the
    /// full result.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Solution> {
        self.solutions.iter()
    }

    pub fn into_vec(self) -> Vec<Solution> {
        self.solutions
    }
}

impl<'a> IntoIterator for &'a QuerySolutions {
    type Item = &'a Solution;
    type IntoIter = std::slice::Iter<'a, Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.iter()
    }
}

impl IntoIterator for QuerySolutions {
    type Item = Solution;
    type IntoIter = std::vec::IntoIter<Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.into_iter()
    }
}
