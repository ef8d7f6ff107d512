use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::handlers::{Computation, ComputationHandler, NopHandler, SolverEvent};
use crate::proof::ProofBuilder;
use crate::sat::{not, CoreSolver, Lit, Premise, SolverState, Tristate};
use crate::simplify::{PreprocessHook, SimplifyHook};
use crate::terms::{Literal, Term, TermError, TermStore};
use crate::theory::{CongruenceClosure, Theory};

use super::{Model, SolveResult, SolverConfig, SolverInternal, SolverStats, UnknownReason};

/// A propositional atom handle, as returned by
/// [`Solver::mk_atom_t`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Atom(pub(crate) Lit);

impl Atom {
    /// This atom with the opposite sign.
    #[must_use]
    pub const fn negate(self) -> Self {
        Self(not(self.0))
    }
}

enum SearchStatus {
    Sat,
    Unsat,
    Restart,
    Incomplete,
    Canceled,
}

/// The top-level CDCL(T) solver.
///
/// The solver owns the CDCL engine and the theory interface; the term
/// store stays with the caller and is passed into each call, so terms can
/// be created between solve calls.
///
/// # Examples
///
/// ```
/// # use smalt::solver::Solver;
/// # use smalt::terms::TermStore;
/// let store = TermStore::new();
/// let p = store.bool_const("p").unwrap();
/// let mut solver = Solver::new(&store);
/// let a = solver.mk_atom_t(&store, p, true).unwrap();
/// solver.add_clause(&[a]);
/// assert!(solver.solve(&store).is_sat());
/// ```
pub struct Solver {
    core: CoreSolver,
    si: SolverInternal,
    states: Vec<SolverState>,
}

impl Solver {
    /// Creates a solver with the default configuration.
    pub fn new(store: &TermStore) -> Self {
        Self::with_config(store, SolverConfig::default())
    }

    /// Creates a solver with a custom configuration.
    pub fn with_config(store: &TermStore, config: SolverConfig) -> Self {
        Self { core: CoreSolver::new_with_config(config), si: SolverInternal::new(store), states: Vec::new() }
    }

    /// The configuration the solver was created with.
    pub const fn config(&self) -> &SolverConfig {
        &self.core.config
    }

    /// The counters collected so far.
    pub const fn stats(&self) -> &SolverStats {
        &self.core.stats
    }

    /// Registers a theory plugin. Plugins are dispatched in registration
    /// order.
    pub fn add_theory(&mut self, theory: Box<dyn Theory>) {
        self.si.add_theory(theory);
    }

    /// Registers several theory plugins at once.
    pub fn add_theory_l(&mut self, theories: Vec<Box<dyn Theory>>) {
        for theory in theories {
            self.si.add_theory(theory);
        }
    }

    /// Registers a simplification hook; most recently added hooks are
    /// tried first.
    pub fn add_simplifier(&mut self, hook: SimplifyHook) {
        self.si.add_simplifier(hook);
    }

    /// Registers a preprocessing hook; most recently added hooks are
    /// tried first.
    pub fn add_preprocessor(&mut self, hook: PreprocessHook) {
        self.si.add_preprocessor(hook);
    }

    /// Replaces the congruence closure. Must happen before any atom is
    /// created.
    pub fn set_congruence_closure(&mut self, cc: Box<dyn CongruenceClosure>) {
        debug_assert_eq!(self.core.n_vars(), 0, "the congruence closure must be installed before any atom exists");
        self.si.set_congruence_closure(cc);
    }

    /// Interns a term as a signed atom.
    ///
    /// The term is simplified and preprocessed first, and every boolean
    /// subterm gets its own atom bound in the congruence closure.
    pub fn mk_atom_t(&mut self, store: &TermStore, t: Term, sign: bool) -> Result<Atom, TermError> {
        if !store.ty(t).is_bool() {
            return Err(TermError::AtomOnNonBool);
        }
        let lit = self.si.preprocess_lit(&mut self.core, store, Literal::new(store, t, sign));
        self.si.bind_bool_subterms(&mut self.core, store, lit.term());
        Ok(Atom(self.core.make_atom(lit)))
    }

    /// Interns a term as a positive atom.
    pub fn mk_atom(&mut self, store: &TermStore, t: Term) -> Result<Atom, TermError> {
        self.mk_atom_t(store, t, true)
    }

    /// Asserts a clause. Returns `false` if the database became
    /// unsatisfiable at level 0.
    pub fn add_clause(&mut self, atoms: &[Atom]) -> bool {
        let lits: Vec<Lit> = atoms.iter().map(|a| a.0).collect();
        self.core.add_clause(lits, Premise::Hypothesis)
    }

    /// The truth value of an atom under the current trail.
    pub fn value(&self, atom: Atom) -> Tristate {
        self.core.value(atom.0)
    }

    /// Opens an assertion level.
    pub fn push(&mut self) {
        self.si.push_level();
        let state = self.core.save_state();
        self.states.push(state);
    }

    /// Closes the last `n` assertion levels, removing the clauses asserted
    /// under them.
    pub fn pop(&mut self, n: usize) -> Result<(), String> {
        if n == 0 {
            return Ok(());
        }
        if n > self.states.len() {
            return Err(format!("cannot pop {n} levels, only {} are open", self.states.len()));
        }
        let target = self.states.len() - n;
        let state = self.states[target].clone();
        self.states.truncate(target);
        self.si.pop_levels(n);
        self.core.load_state(&state)?;
        self.core.reset_theory_head();
        Ok(())
    }

    /// Solves the current assertions.
    pub fn solve(&mut self, store: &TermStore) -> SolveResult {
        self.solve_with(store, &[], &mut NopHandler::new(), false)
    }

    /// Solves under local assumptions, with a handler controlling
    /// cancellation and an optional structural check of the produced
    /// proof.
    #[allow(clippy::too_many_lines)]
    pub fn solve_with(
        &mut self,
        store: &TermStore,
        assumptions: &[Atom],
        handler: &mut dyn ComputationHandler,
        check: bool,
    ) -> SolveResult {
        if !handler.should_resume(SolverEvent::ComputationStarted(Computation::Solve)) {
            return SolveResult::Unknown(UnknownReason::Timeout);
        }

        // bracket the whole call so the theory side forgets everything
        // asserted during it; the next call re-feeds the trail
        self.si.push_level();
        let local_state = if assumptions.is_empty() {
            None
        } else {
            let state = self.core.save_state();
            for a in assumptions {
                self.core.add_clause(vec![a.0], Premise::Local);
            }
            Some(state)
        };

        self.core.init_learntsize();
        let restart_first = self.core.config.low_level_config().restart_first();
        let restart_inc = self.core.config.low_level_config().restart_inc();
        let max_conflicts = self.core.config.low_level_config().max_conflicts();
        let conflicts_before = self.core.stats.conflicts;

        let mut curr_restarts = 0;
        let mut budget_exhausted = false;
        let status = loop {
            let rest_base = CoreSolver::luby(restart_inc, curr_restarts);
            let budget = (rest_base * restart_first as f64) as u64;
            match self.search(store, handler, budget) {
                SearchStatus::Restart => {
                    curr_restarts += 1;
                    self.core.stats.restarts += 1;
                    self.core.trace_state();
                    if max_conflicts.is_some_and(|max| self.core.stats.conflicts - conflicts_before >= max) {
                        budget_exhausted = true;
                        break SearchStatus::Restart;
                    }
                }
                other => break other,
            }
        };

        let result = match status {
            SearchStatus::Sat => SolveResult::Sat(self.extract_model()),
            SearchStatus::Unsat => self.extract_unsat(handler, check),
            SearchStatus::Incomplete => SolveResult::Unknown(UnknownReason::Incomplete),
            SearchStatus::Canceled => SolveResult::Unknown(UnknownReason::Timeout),
            SearchStatus::Restart => {
                debug_assert!(budget_exhausted);
                SolveResult::Unknown(UnknownReason::MaxConflicts)
            }
        };

        // unwind the decision levels, then the solve bracket
        self.pop_to(0);
        self.si.pop_levels(1);
        if let Some(state) = local_state {
            self.core.load_state(&state).expect("the pre-solve snapshot is always valid");
        }
        self.core.reset_theory_head();

        if !handler.should_resume(SolverEvent::ComputationFinished(Computation::Solve)) {
            return SolveResult::Unknown(UnknownReason::Timeout);
        }
        result
    }

    fn search(&mut self, store: &TermStore, handler: &mut dyn ComputationHandler, nof_conflicts: u64) -> SearchStatus {
        if !self.core.ok() {
            return SearchStatus::Unsat;
        }
        let mut conflict_c = 0;
        loop {
            if let Some(confl) = self.core.propagate() {
                conflict_c += 1;
                self.core.on_conflict_budget();
                if !handler.should_resume(SolverEvent::ConflictDetected) {
                    return SearchStatus::Canceled;
                }
                let conflict_level = self.core.conflict_level(confl);
                if conflict_level == 0 {
                    self.core.set_root_conflict(confl);
                    return SearchStatus::Unsat;
                }
                // a late theory conflict may live entirely below the
                // current level
                self.pop_to(conflict_level);
                let learnt = self.core.analyze(confl);
                let bt_level = self.core.analyze_bt_level;
                self.pop_to(bt_level);
                self.core.record_learnt(learnt);
                continue;
            }

            if self.core.theory_head() < self.core.n_assigns() {
                if !handler.should_resume(SolverEvent::TheoryCheck) {
                    return SearchStatus::Canceled;
                }
                let batch = self.core.theory_batch();
                self.core.advance_theory_head();
                self.si.assert_lits(&mut self.core, store, false, &batch);
                self.core.drain_pending_clauses();
                continue;
            }

            if conflict_c >= nof_conflicts {
                if !handler.should_resume(SolverEvent::Restart) {
                    return SearchStatus::Canceled;
                }
                self.pop_to(0);
                return SearchStatus::Restart;
            }
            if self.core.should_reduce() {
                self.core.reduce_db();
            }

            match self.core.pick_branch_lit() {
                None => {
                    // all variables assigned: the theories get a final say
                    if !handler.should_resume(SolverEvent::TheoryCheck) {
                        return SearchStatus::Canceled;
                    }
                    self.si.assert_lits(&mut self.core, store, true, &[]);
                    self.core.drain_pending_clauses();
                    if self.core.has_more_work() {
                        continue;
                    }
                    if self.core.take_incomplete() {
                        return SearchStatus::Incomplete;
                    }
                    return SearchStatus::Sat;
                }
                Some(next) => {
                    self.core.stats.decisions += 1;
                    self.si.push_level();
                    self.core.new_decision_level();
                    self.core.unchecked_enqueue(next, None);
                }
            }
        }
    }

    /// Backjumps the engine and the theory side together.
    fn pop_to(&mut self, level: usize) {
        let current = self.core.decision_level();
        if current > level {
            self.si.pop_levels(current - level);
            self.core.cancel_until(level);
        }
    }

    fn extract_model(&self) -> Model {
        let mut assignments = FxHashMap::default();
        for (v, lit) in self.core.var_literals() {
            match self.core.var_value(v) {
                Tristate::True => assignments.insert(lit.term(), true),
                Tristate::False => assignments.insert(lit.term(), false),
                Tristate::Undef => None,
            };
        }
        Model::new(assignments)
    }

    fn extract_unsat(&mut self, handler: &mut dyn ComputationHandler, check: bool) -> SolveResult {
        if !self.core.config.proof_generation() {
            return SolveResult::Unsat { proof: None, unsat_core: None };
        }
        let Some(conflict) = self.core.root_conflict() else {
            return SolveResult::Unsat { proof: None, unsat_core: None };
        };
        if !handler.should_resume(SolverEvent::ComputationStarted(Computation::ProofReconstruction)) {
            return SolveResult::Unsat { proof: None, unsat_core: None };
        }
        match ProofBuilder::new(&mut self.core).prove_unsat(conflict) {
            Ok(proof) => {
                if check {
                    if let Err(e) = proof.validate() {
                        warn!("discarding a structurally invalid proof: {e}");
                        return SolveResult::Unsat { proof: None, unsat_core: None };
                    }
                }
                let unsat_core = Some(proof.unsat_core());
                SolveResult::Unsat { proof: Some(proof), unsat_core }
            }
            Err(e) => {
                debug!("proof reconstruction failed: {e}");
                SolveResult::Unsat { proof: None, unsat_core: None }
            }
        }
    }
}
