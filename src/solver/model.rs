use rustc_hash::FxHashMap;

use crate::terms::{Literal, Term, TermStore, TermView};

/// A boolean assignment over the interned atoms of a SAT result.
///
/// The model covers every atom the solver interned, including auxiliary
/// atoms introduced by preprocessing. Theory-specific values are not
/// modeled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    assignments: FxHashMap<Term, bool>,
}

impl Model {
    pub(crate) fn new(assignments: FxHashMap<Term, bool>) -> Self {
        Self { assignments }
    }

    /// The value of a term in the model, stripping an outer negation.
    /// `None` if the term has no interned atom.
    pub fn value_of(&self, store: &TermStore, t: Term) -> Option<bool> {
        match store.view(t) {
            TermView::True => Some(true),
            TermView::False => Some(false),
            TermView::Not(u) => self.value_of(store, u).map(|b| !b),
            _ => self.assignments.get(&t).copied(),
        }
    }

    /// The value of a literal in the model.
    pub fn evaluate_lit(&self, lit: Literal) -> Option<bool> {
        self.assignments.get(&lit.term()).map(|&b| b == lit.sign())
    }

    /// The number of assigned atoms.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// `true` if no atom is assigned.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterates over the assigned atoms.
    pub fn iter(&self) -> impl Iterator<Item = (Term, bool)> + '_ {
        self.assignments.iter().map(|(&t, &b)| (t, b))
    }
}
