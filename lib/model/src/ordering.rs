//! Total order over optional terms for ORDER BY.

use crate::{Literal, Term};
use std::cmp::Ordering;

/// Compares two optional terms with the ORDER BY total order:
/// unbound < blank node < IRI < literal.
///
/// Literals compare by datatype IRI (plain literals first), then by language
/// tag, then by lexical value. The order is total and deterministic so that
/// stable sorts produce reproducible result sequences.
pub fn compare_terms(a: Option<&Term>, b: Option<&Term>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Term::BlankNode(a), Term::BlankNode(b)) => a.as_str().cmp(b.as_str()),
            (Term::BlankNode(_), _) => Ordering::Less,
            (_, Term::BlankNode(_)) => Ordering::Greater,
            (Term::NamedNode(a), Term::NamedNode(b)) => a.as_str().cmp(b.as_str()),
            (Term::NamedNode(_), _) => Ordering::Less,
            (_, Term::NamedNode(_)) => Ordering::Greater,
            (Term::Literal(a), Term::Literal(b)) => compare_literals(a, b),
        },
    }
}

fn compare_literals(a: &Literal, b: &Literal) -> Ordering {
    let datatype = |l: &Literal| l.datatype().map(|dt| dt.as_str().to_owned());
    datatype(a)
        .cmp(&datatype(b))
        .then_with(|| a.language().cmp(&b.language()))
        .then_with(|| a.value().cmp(b.value()))
}
