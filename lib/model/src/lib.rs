//! Data model for the RDF Quarry query engine.
//!
//! This crate owns the term types instead of re-using an RDF 1.1 library
//! model: the engine's string functions distinguish plain literals from
//! `xsd:string`-typed literals, a distinction RDF 1.1 models normalize away.

mod ordering;
mod solution;
mod term;
pub mod vocab;

pub use ordering::compare_terms;
pub use solution::Solution;
pub use term::{BlankNode, Literal, NamedNode, Term, Triple, Variable};
