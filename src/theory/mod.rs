mod cc;

pub use cc::*;

use crate::sat::{CoreSolver, DeferredExplain, ProofToken, Tristate};
use crate::terms::{Literal, Term, TermStore};

/// A lazily evaluated justification for a theory propagation.
///
/// The wrapped closure yields `(lits, token)` such that the conjunction of
/// `lits` implies the propagated literal. It is called at most once, and
/// only if conflict analysis needs the reason.
pub struct Consequence(pub(crate) DeferredExplain);

impl Consequence {
    /// Wraps an explanation closure.
    pub fn new<F>(explain: F) -> Self
    where
        F: FnOnce() -> (Vec<Literal>, ProofToken) + 'static,
    {
        Self(Box::new(explain))
    }

    /// An eager justification from already-known literals.
    pub fn from_lits(lits: Vec<Literal>, token: ProofToken) -> Self {
        Self(Box::new(move || (lits, token)))
    }
}

/// The action handle passed to theory plugins and the congruence closure.
///
/// All communication back into the search goes through this handle; theory
/// code never returns errors and never touches the engine directly.
pub struct TheoryArg<'a> {
    core: &'a mut CoreSolver,
    store: &'a TermStore,
}

impl<'a> TheoryArg<'a> {
    pub(crate) fn new(core: &'a mut CoreSolver, store: &'a TermStore) -> Self {
        Self { core, store }
    }

    /// The term store.
    pub const fn store(&self) -> &'a TermStore {
        self.store
    }

    /// Reports that the given literals are jointly false under the current
    /// assignment. The engine treats their disjunction as a conflict clause
    /// at the current level.
    pub fn raise_conflict(&mut self, lits: &[Literal], token: ProofToken) {
        self.core.theory_conflict(lits, token);
    }

    /// Enqueues a theory-propagated literal at the current level with a
    /// lazy justification.
    pub fn propagate(&mut self, lit: Literal, reason: Consequence) {
        self.core.theory_propagate(lit, reason.0);
    }

    /// Installs a clause after the current dispatch round. `keep` makes the
    /// clause survive restarts and clause-database reductions.
    pub fn add_clause(&mut self, lits: &[Literal], keep: bool, token: ProofToken) {
        self.core.queue_clause(lits, keep, token);
    }

    /// Interns a literal, creating its SAT variable on first sight.
    pub fn mk_lit(&mut self, lit: Literal) -> crate::sat::Lit {
        self.core.make_atom(lit)
    }

    /// The current truth value of a literal, `Undef` if not interned or
    /// unassigned.
    pub fn value(&self, lit: Literal) -> Tristate {
        self.core.atom_of(lit).map_or(Tristate::Undef, |l| self.core.value(l))
    }

    /// Calls `f` for every literal on the SAT trail, in assignment order.
    pub fn iter_assumptions<F: FnMut(Literal)>(&self, mut f: F) {
        for lit in self.core.trail_literals() {
            f(lit);
        }
    }

    /// Declares the theory's reasoning incomplete for the current
    /// assignment. If the final check accepts an assignment after this was
    /// called, the solver answers unknown instead of SAT.
    pub fn set_incomplete(&mut self) {
        self.core.set_incomplete();
    }
}

/// A theory plugin.
///
/// Plugins observe the trail through [`partial_check`](Theory::partial_check)
/// and [`final_check`](Theory::final_check) and answer through the
/// [`TheoryArg`] handle. `push_level`/`pop_levels` bracket speculative
/// assignments: after a push and a matching pop, the plugin's observable
/// state must equal its state before the push.
pub trait Theory {
    /// A short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Called after every propagation fixpoint with the literals asserted
    /// since the last check.
    fn partial_check(&mut self, acts: &mut TheoryArg, lits: &[Literal]) {
        let _ = (acts, lits);
    }

    /// Called when all variables are assigned; the last chance to object
    /// before the engine reports a model.
    fn final_check(&mut self, acts: &mut TheoryArg) {
        let _ = acts;
    }

    /// Opens a speculative level.
    fn push_level(&mut self);

    /// Closes the last `n` speculative levels.
    fn pop_levels(&mut self, n: usize);

    /// A term was added to the congruence closure.
    fn on_cc_new_term(&mut self, store: &TermStore, t: Term) {
        let _ = (store, t);
    }

    /// Two congruence classes are about to merge.
    fn on_cc_pre_merge(&mut self, acts: &mut TheoryArg, a: Term, b: Term) {
        let _ = (acts, a, b);
    }

    /// Two congruence classes have merged.
    fn on_cc_post_merge(&mut self, acts: &mut TheoryArg, a: Term, b: Term) {
        let _ = (acts, a, b);
    }

    /// The congruence closure found the asserted literals inconsistent;
    /// `lits` is the conflict clause the engine is about to learn. Called
    /// before the conflict reaches the engine.
    fn on_cc_conflict(&mut self, acts: &mut TheoryArg, lits: &[Literal]) {
        let _ = (acts, lits);
    }

    /// The congruence closure is about to propagate `lit`, justified by
    /// the listed asserted literals.
    fn on_cc_propagate(&mut self, acts: &mut TheoryArg, lit: Literal, reason: &[Literal]) {
        let _ = (acts, lit, reason);
    }
}
