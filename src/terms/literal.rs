use super::{Term, TermStore};

/// A signed atom over an absolute term.
///
/// The constructor strips an outer negation from the term and folds the
/// stripped sign into the literal's sign, so two literals differing only by
/// a normalizable negation collapse onto the same representation:
/// `Literal::new(s, not(p), true) == Literal::new(s, p, false)`.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Literal {
    term: Term,
    sign: bool,
}

/// Reports whether [`Literal::norm`] flipped the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {
    /// The literal already carried the canonical (positive) sign.
    SameSign,
    /// Canonicalization flipped the sign.
    Negated,
}

impl Literal {
    /// Creates a literal over the absolute form of `term`.
    pub fn new(store: &TermStore, term: Term, sign: bool) -> Self {
        let (abs, same) = store.abs(term);
        Self { term: abs, sign: sign == same }
    }

    /// The underlying absolute term.
    pub const fn term(self) -> Term {
        self.term
    }

    /// The sign of this literal.
    pub const fn sign(self) -> bool {
        self.sign
    }

    /// Returns this literal with the sign inverted. `l.negate().negate() == l`.
    #[must_use]
    pub const fn negate(self) -> Self {
        Self { term: self.term, sign: !self.sign }
    }

    /// Splits the literal into its positive form and a tag reporting
    /// whether the sign was flipped to get there.
    ///
    /// This is the contract the SAT layer uses to collapse dual atoms onto
    /// a single variable.
    pub const fn norm(self) -> (Self, Normalized) {
        if self.sign {
            (self, Normalized::SameSign)
        } else {
            (self.negate(), Normalized::Negated)
        }
    }

    /// Renders the literal for diagnostics.
    pub fn to_string(self, store: &TermStore) -> String {
        let sign = if self.sign { "" } else { "~" };
        format!("{sign}{}", store.to_string(self.term))
    }
}

#[cfg(test)]
mod tests {
    use super::{Literal, Normalized};
    use crate::terms::TermStore;

    #[test]
    fn test_negation_collapses() {
        let store = TermStore::new();
        let p = store.bool_const("p").unwrap();
        let np = store.not(p).unwrap();
        assert_eq!(Literal::new(&store, np, true), Literal::new(&store, p, false));
        assert_eq!(Literal::new(&store, np, false), Literal::new(&store, p, true));
    }

    #[test]
    fn test_negate_involution() {
        let store = TermStore::new();
        let p = store.bool_const("p").unwrap();
        let l = Literal::new(&store, p, false);
        assert_eq!(l.negate().negate(), l);
        assert_ne!(l.negate(), l);
    }

    #[test]
    fn test_norm_idempotent() {
        let store = TermStore::new();
        let p = store.bool_const("p").unwrap();
        for sign in [true, false] {
            let l = Literal::new(&store, p, sign);
            let (n, _) = l.norm();
            assert_eq!(n.norm(), (n, Normalized::SameSign));
            assert!(n.sign());
        }
    }
}
