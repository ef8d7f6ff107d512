use std::cell::RefCell;
use std::rc::Rc;

use crate::sat::{ProofToken, Tristate};
use crate::solver::{SolveResult, Solver, SolverConfig, UnknownReason};
use crate::terms::{Literal, TermStore};
use crate::theory::{Consequence, Theory, TheoryArg};

/// Propagates `conclusion` whenever `premise` is asserted.
struct ImplicationTheory {
    premise: Literal,
    conclusion: Literal,
}

impl Theory for ImplicationTheory {
    fn name(&self) -> &'static str {
        "implication"
    }

    fn partial_check(&mut self, acts: &mut TheoryArg, _lits: &[Literal]) {
        if acts.value(self.premise) == Tristate::True && acts.value(self.conclusion) != Tristate::True {
            let premise = self.premise;
            acts.propagate(self.conclusion, Consequence::new(move || (vec![premise], ProofToken(7))));
        }
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}
}

/// Rejects any total assignment making both stored literals true.
struct AtMostOneTheory {
    first: Literal,
    second: Literal,
}

impl Theory for AtMostOneTheory {
    fn name(&self) -> &'static str {
        "at-most-one"
    }

    fn final_check(&mut self, acts: &mut TheoryArg) {
        if acts.value(self.first) == Tristate::True && acts.value(self.second) == Tristate::True {
            acts.raise_conflict(&[self.first.negate(), self.second.negate()], ProofToken(8));
        }
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}
}

/// Counts the congruence-closure events it is shown.
#[derive(Default)]
struct CcEventLog {
    propagations: usize,
    conflicts: usize,
}

struct CcObserver {
    log: Rc<RefCell<CcEventLog>>,
}

impl Theory for CcObserver {
    fn name(&self) -> &'static str {
        "cc-observer"
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}

    fn on_cc_propagate(&mut self, _acts: &mut TheoryArg, _lit: Literal, reason: &[Literal]) {
        assert!(!reason.is_empty());
        self.log.borrow_mut().propagations += 1;
    }

    fn on_cc_conflict(&mut self, _acts: &mut TheoryArg, lits: &[Literal]) {
        assert!(!lits.is_empty());
        self.log.borrow_mut().conflicts += 1;
    }
}

struct IncompleteTheory;

impl Theory for IncompleteTheory {
    fn name(&self) -> &'static str {
        "incomplete"
    }

    fn final_check(&mut self, acts: &mut TheoryArg) {
        acts.set_incomplete();
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}
}

#[test]
fn test_theory_propagation_unsat() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let q = store.bool_const("q").unwrap();
    let lp = Literal::new(&store, p, true);
    let lq = Literal::new(&store, q, true);

    let mut solver = Solver::with_config(&store, SolverConfig::new().with_proof_generation(true));
    solver.add_theory(Box::new(ImplicationTheory { premise: lp, conclusion: lq }));
    let ap = solver.mk_atom(&store, p).unwrap();
    let aq = solver.mk_atom(&store, q).unwrap();
    solver.add_clause(&[ap]);
    solver.add_clause(&[aq.negate()]);

    let result = solver.solve(&store);
    assert!(result.is_unsat());
    let core = result.unsat_core().unwrap();
    assert!(core.contains(&[lp]));
    assert!(core.contains(&[lq.negate()]));
    let proof = result.proof().unwrap();
    assert!(proof.validate().is_ok());
}

#[test]
fn test_theory_propagation_counts() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let q = store.bool_const("q").unwrap();
    let lp = Literal::new(&store, p, true);
    let lq = Literal::new(&store, q, true);

    let mut solver = Solver::new(&store);
    solver.add_theory(Box::new(ImplicationTheory { premise: lp, conclusion: lq }));
    let ap = solver.mk_atom(&store, p).unwrap();
    solver.mk_atom(&store, q).unwrap();
    solver.add_clause(&[ap]);

    let result = solver.solve(&store);
    let model = result.model().unwrap();
    assert_eq!(model.value_of(&store, q), Some(true));
    assert!(solver.stats().theory_propagations > 0);
}

#[test]
fn test_final_check_conflict() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let q = store.bool_const("q").unwrap();
    let lp = Literal::new(&store, p, true);
    let lq = Literal::new(&store, q, true);

    let mut solver = Solver::new(&store);
    solver.add_theory(Box::new(AtMostOneTheory { first: lp, second: lq }));
    let ap = solver.mk_atom(&store, p).unwrap();
    let aq = solver.mk_atom(&store, q).unwrap();
    solver.add_clause(&[ap, aq]);

    let result = solver.solve(&store);
    let model = result.model().unwrap();
    let both = model.value_of(&store, p) == Some(true) && model.value_of(&store, q) == Some(true);
    assert!(!both);
}

#[test]
fn test_incomplete_theory_reports_unknown() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let mut solver = Solver::new(&store);
    solver.add_theory(Box::new(IncompleteTheory));
    let a = solver.mk_atom(&store, p).unwrap();
    solver.add_clause(&[a]);
    let result = solver.solve(&store);
    assert!(matches!(result, SolveResult::Unknown(UnknownReason::Incomplete)));
}

#[test]
fn test_euf_congruence_unsat() {
    // a = b together with f(a) != f(b) contradicts congruence
    let store = TermStore::new();
    let u = store.sort("U");
    let a = store.constant("a", u).unwrap();
    let b = store.constant("b", u).unwrap();
    let f = store.declare_fun("f", &[u], u).unwrap();
    let fa = store.app(f, &[a]).unwrap();
    let fb = store.app(f, &[b]).unwrap();
    let eq_ab = store.eq(a, b).unwrap();
    let eq_fafb = store.eq(fa, fb).unwrap();

    let mut solver = Solver::with_config(&store, SolverConfig::new().with_proof_generation(true));
    let atom_ab = solver.mk_atom(&store, eq_ab).unwrap();
    let atom_fafb = solver.mk_atom(&store, eq_fafb).unwrap();
    solver.add_clause(&[atom_ab]);
    solver.add_clause(&[atom_fafb.negate()]);

    let result = solver.solve(&store);
    assert!(result.is_unsat());
    let core = result.unsat_core().unwrap();
    assert!(core.contains(&[Literal::new(&store, eq_ab, true)]));
    assert!(core.contains(&[Literal::new(&store, eq_fafb, false)]));
    assert!(result.proof().unwrap().validate().is_ok());
}

#[test]
fn test_euf_transitivity_sat_and_unsat() {
    let store = TermStore::new();
    let u = store.sort("U");
    let a = store.constant("a", u).unwrap();
    let b = store.constant("b", u).unwrap();
    let c = store.constant("c", u).unwrap();
    let eq_ab = store.eq(a, b).unwrap();
    let eq_bc = store.eq(b, c).unwrap();
    let eq_ac = store.eq(a, c).unwrap();

    let mut solver = Solver::new(&store);
    let atom_ab = solver.mk_atom(&store, eq_ab).unwrap();
    let atom_bc = solver.mk_atom(&store, eq_bc).unwrap();
    let atom_ac = solver.mk_atom(&store, eq_ac).unwrap();
    solver.add_clause(&[atom_ab]);
    solver.add_clause(&[atom_bc]);
    assert!(solver.solve(&store).is_sat());

    solver.add_clause(&[atom_ac.negate()]);
    assert!(solver.solve(&store).is_unsat());
}

#[test]
fn test_plugins_observe_cc_reasoning() {
    let store = TermStore::new();
    let u = store.sort("U");
    let a = store.constant("a", u).unwrap();
    let b = store.constant("b", u).unwrap();
    let f = store.declare_fun("f", &[u], u).unwrap();
    let fa = store.app(f, &[a]).unwrap();
    let fb = store.app(f, &[b]).unwrap();
    let eq_ab = store.eq(a, b).unwrap();
    let eq_fafb = store.eq(fa, fb).unwrap();

    // propagation: with a = b asserted, the closure derives f(a) = f(b)
    let log = Rc::new(RefCell::new(CcEventLog::default()));
    let mut solver = Solver::new(&store);
    solver.add_theory(Box::new(CcObserver { log: Rc::clone(&log) }));
    let atom_ab = solver.mk_atom(&store, eq_ab).unwrap();
    solver.mk_atom(&store, eq_fafb).unwrap();
    solver.add_clause(&[atom_ab]);
    assert!(solver.solve(&store).is_sat());
    assert!(log.borrow().propagations > 0);

    // conflict: adding f(a) != f(b) contradicts congruence
    let log = Rc::new(RefCell::new(CcEventLog::default()));
    let mut solver = Solver::new(&store);
    solver.add_theory(Box::new(CcObserver { log: Rc::clone(&log) }));
    let atom_ab = solver.mk_atom(&store, eq_ab).unwrap();
    let atom_fafb = solver.mk_atom(&store, eq_fafb).unwrap();
    solver.add_clause(&[atom_ab]);
    solver.add_clause(&[atom_fafb.negate()]);
    assert!(solver.solve(&store).is_unsat());
    assert!(log.borrow().conflicts > 0);
}

#[test]
fn test_euf_propagates_equality_atom() {
    // with a = b asserted, the atom for f(a) = f(b) must come out true
    let store = TermStore::new();
    let u = store.sort("U");
    let a = store.constant("a", u).unwrap();
    let b = store.constant("b", u).unwrap();
    let f = store.declare_fun("f", &[u], u).unwrap();
    let fa = store.app(f, &[a]).unwrap();
    let fb = store.app(f, &[b]).unwrap();
    let eq_ab = store.eq(a, b).unwrap();
    let eq_fafb = store.eq(fa, fb).unwrap();

    let mut solver = Solver::new(&store);
    let atom_ab = solver.mk_atom(&store, eq_ab).unwrap();
    solver.mk_atom(&store, eq_fafb).unwrap();
    solver.add_clause(&[atom_ab]);

    let result = solver.solve(&store);
    let model = result.model().unwrap();
    assert_eq!(model.value_of(&store, eq_fafb), Some(true));
}
