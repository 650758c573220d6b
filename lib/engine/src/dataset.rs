use crate::error::DatasetError;
use rdf_quarry_model::{NamedNode, Term, Triple};
use std::collections::BTreeMap;

/// The graph a pattern is currently matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveGraph {
    Default,
    Named(NamedNode),
}

pub type TripleIter<'a> = Box<dyn Iterator<Item = Result<Triple, DatasetError>> + 'a>;

/// A pattern-matching oracle over an RDF dataset.
///
/// The engine only ever asks for the triples of one graph matching a
/// partially ground pattern; everything else (joins, filters, ordering) is
/// the evaluator's job. Errors surface per item so streaming backends can
/// fail mid-iteration.
pub trait Dataset: Send + Sync {
    fn triples_matching<'a>(
        &'a self,
        graph: &ActiveGraph,
        subject: Option<&Term>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> TripleIter<'a>;

    /// The names of all named graphs, for GRAPH patterns with a variable
    /// selector.
    fn named_graphs(&self) -> Result<Vec<NamedNode>, DatasetError>;
}

/// A simple in-memory dataset for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    default_graph: Vec<Triple>,
    named_graphs: BTreeMap<NamedNode, Vec<Triple>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple) {
        self.default_graph.push(triple);
    }

    pub fn insert_named(&mut self, graph: NamedNode, triple: Triple) {
        self.named_graphs.entry(graph).or_default().push(triple);
    }

    pub fn len(&self) -> usize {
        self.default_graph.len() + self.named_graphs.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dataset for MemoryDataset {
    fn triples_matching<'a>(
        &'a self,
        graph: &ActiveGraph,
        subject: Option<&Term>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> TripleIter<'a> {
        let triples = match graph {
            ActiveGraph::Default => Some(&self.default_graph),
            ActiveGraph::Named(name) => self.named_graphs.get(name),
        };
        let Some(triples) = triples else {
            return Box::new(std::iter::empty());
        };
        let subject = subject.cloned();
        let predicate = predicate.cloned();
        let object = object.cloned();
        Box::new(
            triples
                .iter()
                .filter(move |t| {
                    subject.as_ref().map_or(true, |s| t.subject == *s)
                        && predicate.as_ref().map_or(true, |p| t.predicate == *p)
                        && object.as_ref().map_or(true, |o| t.object == *o)
                })
                .map(|t| Ok(t.clone())),
        )
    }

    fn named_graphs(&self) -> Result<Vec<NamedNode>, DatasetError> {
        Ok(self.named_graphs.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(format!("http://example.org/{s}"))
    }

    #[test]
    fn matches_by_bound_positions() {
        let mut dataset = MemoryDataset::new();
        dataset.insert(Triple::new(iri("a"), iri("p"), iri("b")));
        dataset.insert(Triple::new(iri("a"), iri("q"), iri("c")));
        dataset.insert(Triple::new(iri("d"), iri("p"), iri("b")));

        let by_predicate: Vec<_> = dataset
            .triples_matching(&ActiveGraph::Default, None, Some(&iri("p")), None)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(by_predicate.len(), 2);

        let subject = Term::from(iri("a"));
        let fully: Vec<_> = dataset
            .triples_matching(
                &ActiveGraph::Default,
                Some(&subject),
                Some(&iri("q")),
                None,
            )
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(fully.len(), 1);
    }

    #[test]
    fn named_graphs_are_separate() {
        let mut dataset = MemoryDataset::new();
        dataset.insert(Triple::new(iri("a"), iri("p"), iri("b")));
        dataset.insert_named(iri("g"), Triple::new(iri("x"), iri("p"), iri("y")));

        let in_default: Vec<_> = dataset
            .triples_matching(&ActiveGraph::Default, None, None, None)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(in_default.len(), 1);

        let in_named: Vec<_> = dataset
            .triples_matching(&ActiveGraph::Named(iri("g")), None, None, None)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(in_named[0].subject, Term::from(iri("x")));
        assert_eq!(dataset.named_graphs().unwrap(), vec![iri("g")]);

        let missing: Vec<_> = dataset
            .triples_matching(&ActiveGraph::Named(iri("nope")), None, None, None)
            .collect();
        assert!(missing.is_empty());
    }
}
