use crate::{Term, Variable};
use std::collections::btree_map::{BTreeMap, Iter};
use std::fmt;

/// A solution mapping from variables to terms.
///
/// Backed by an ordered map so that solutions compare, hash, and iterate
/// deterministically. This is what makes Distinct a plain seen-set and test
/// output stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Solution {
    bindings: BTreeMap<Variable, Term>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.bindings.get(variable)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Binds `variable` to `term`, replacing any previous binding.
    pub fn bind(&mut self, variable: Variable, term: Term) {
        self.bindings.insert(variable, term);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Variable, Term> {
        self.bindings.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.bindings.keys()
    }

    /// Two solutions are compatible when every variable bound in both maps
    /// to the same term.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.bindings
            .iter()
            .all(|(variable, term)| other.get(variable).map_or(true, |t| t == term))
    }

    /// Merges two compatible solutions, or returns `None` when a shared
    /// variable is bound to different terms.
    pub fn merged_with(&self, other: &Self) -> Option<Self> {
        let mut merged = self.clone();
        for (variable, term) in &other.bindings {
            match merged.get(variable) {
                Some(existing) if existing != term => return None,
                Some(_) => {}
                None => merged.bind(variable.clone(), term.clone()),
            }
        }
        Some(merged)
    }

    /// True when the two solutions bind at least one common variable.
    pub fn shares_variable_with(&self, other: &Self) -> bool {
        self.bindings.keys().any(|v| other.contains(v))
    }

    /// Projects the solution down to the given variables.
    pub fn restricted_to(&self, variables: &[Variable]) -> Self {
        let bindings = variables
            .iter()
            .filter_map(|v| self.get(v).map(|t| (v.clone(), t.clone())))
            .collect();
        Self { bindings }
    }
}

impl FromIterator<(Variable, Term)> for Solution {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (variable, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{variable} -> {term}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamedNode;

    fn solution(bindings: &[(&str, &str)]) -> Solution {
        bindings
            .iter()
            .map(|(v, iri)| (Variable::new(*v), NamedNode::new(*iri).into()))
            .collect()
    }

    #[test]
    fn disjoint_solutions_are_compatible() {
        let a = solution(&[("x", "http://example.org/a")]);
        let b = solution(&[("y", "http://example.org/b")]);
        assert!(a.compatible_with(&b));
        assert_eq!(a.merged_with(&b).map(|m| m.len()), Some(2));
    }

    #[test]
    fn conflicting_solutions_do_not_merge() {
        let a = solution(&[("x", "http://example.org/a")]);
        let b = solution(&[("x", "http://example.org/b")]);
        assert!(!a.compatible_with(&b));
        assert_eq!(a.merged_with(&b), None);
    }

    #[test]
    fn shared_equal_bindings_merge() {
        let a = solution(&[("x", "http://example.org/a"), ("y", "http://example.org/b")]);
        let b = solution(&[("x", "http://example.org/a")]);
        assert!(a.shares_variable_with(&b));
        assert_eq!(a.merged_with(&b), Some(a.clone()));
    }

    #[test]
    fn restriction_drops_other_variables() {
        let a = solution(&[("x", "http://example.org/a"), ("y", "http://example.org/b")]);
        let restricted = a.restricted_to(&[Variable::new("y"), Variable::new("z")]);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.contains(&Variable::new("y")));
    }
}
