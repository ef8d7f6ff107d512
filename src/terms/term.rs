use thiserror::Error;

/// A hash-consed term.
///
/// Terms are created and owned by a [`TermStore`](super::TermStore); a
/// `Term` is an opaque id with identity equality. Two structurally equal
/// terms built on the same store are always the same `Term`.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Term(pub(crate) u32);

impl Term {
    /// The numeric id of this term.
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// An interned sort.
///
/// [`Sort::BOOL`] is predefined; all other sorts are atomic and created by
/// name via [`TermStore::sort`](super::TermStore::sort).
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Sort(pub(crate) u32);

impl Sort {
    /// The builtin boolean sort.
    pub const BOOL: Self = Self(0);

    /// Returns `true` if this is the boolean sort.
    pub const fn is_bool(self) -> bool {
        self.0 == Self::BOOL.0
    }
}

/// A declared function symbol.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FunSym(pub(crate) u32);

/// An interned symbol name.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Symbol(pub(crate) u32);

/// A shallow, owned view of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermView {
    /// The boolean constant `true`.
    True,
    /// The boolean constant `false`.
    False,
    /// An uninterpreted constant of some sort.
    Const(Symbol, Sort),
    /// A function application to an ordered argument sequence.
    App(FunSym, Vec<Term>),
    /// An equality between two terms of the same sort.
    Eq(Term, Term),
    /// A boolean negation. The negated term is never itself a negation.
    Not(Term),
}

/// Errors raised during term construction.
///
/// Construction fails without modifying the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermError {
    /// A function was applied to the wrong number of arguments.
    #[error("function '{fun}' expects {expected} arguments, got {actual}")]
    Arity {
        /// Name of the function symbol.
        fun: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },
    /// An argument of a function application has the wrong sort.
    #[error("argument {index} of '{fun}' has the wrong sort")]
    ArgumentSort {
        /// Name of the function symbol.
        fun: String,
        /// Index of the offending argument.
        index: usize,
    },
    /// Equality between terms of different sorts.
    #[error("equality between terms of different sorts")]
    EqSorts,
    /// Negation applied to a non-boolean term.
    #[error("negation of a non-boolean term")]
    NotOnNonBool,
    /// A propositional atom requested over a non-boolean term.
    #[error("atom over a non-boolean term")]
    AtomOnNonBool,
    /// A constant was redeclared with a different sort.
    #[error("constant '{0}' redeclared with a different sort")]
    ConstRedeclared(String),
    /// A function was redeclared with a different signature.
    #[error("function '{0}' redeclared with a different signature")]
    FunRedeclared(String),
}
