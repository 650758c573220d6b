//! RDF Quarry: a SPARQL graph pattern optimizer and query engine.
//!
//! Queries are parsed into an algebra tree, rewritten by a fixed optimizer
//! pipeline, and evaluated against any [`engine::Dataset`]:
//!
//! ```
//! use rdf_quarry::algebra::Query;
//! use rdf_quarry::engine::{MemoryDataset, QueryEngine};
//! use rdf_quarry::model::{NamedNode, Triple};
//! use std::sync::Arc;
//!
//! let mut dataset = MemoryDataset::new();
//! dataset.insert(Triple::new(
//!     NamedNode::new("http://example.org/alice"),
//!     NamedNode::new("http://example.org/knows"),
//!     NamedNode::new("http://example.org/bob"),
//! ));
//!
//! let engine = QueryEngine::new(Arc::new(dataset));
//! let mut query = Query::parse("SELECT ?who WHERE { ?anyone <http://example.org/knows> ?who }", None)?;
//! let results = engine.process_query(&mut query)?;
//! assert_eq!(results.into_solutions().map(|s| s.len()), Some(1));
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

pub mod model {
    pub use rdf_quarry_model::*;
}

pub mod algebra {
    pub use rdf_quarry_algebra::*;
}

pub mod engine {
    pub use rdf_quarry_engine::*;
}
