use smalt::handlers::NopHandler;
use smalt::sat::{ProofToken, Tristate};
use smalt::solver::{Atom, Solver, SolverConfig};
use smalt::terms::{Literal, TermStore};
use smalt::theory::{Consequence, Theory, TheoryArg};

fn pigeon_hole(solver: &mut Solver, store: &TermStore, holes: usize) -> usize {
    let pigeons = holes + 1;
    let mut atoms: Vec<Vec<Atom>> = vec![vec![]; pigeons];
    for (p, row) in atoms.iter_mut().enumerate() {
        for h in 0..holes {
            let t = store.bool_const(&format!("p{p}h{h}")).unwrap();
            row.push(solver.mk_atom(store, t).unwrap());
        }
    }
    let mut count = 0;
    for row in &atoms {
        solver.add_clause(row);
        count += 1;
    }
    for h in 0..holes {
        for p1 in 0..pigeons {
            for p2 in (p1 + 1)..pigeons {
                solver.add_clause(&[atoms[p1][h].negate(), atoms[p2][h].negate()]);
                count += 1;
            }
        }
    }
    count
}

#[test]
fn trivial_unsat_has_a_one_step_proof() {
    let store = TermStore::new();
    let a = store.bool_const("a").unwrap();
    let mut solver = Solver::with_config(&store, SolverConfig::new().with_proof_generation(true));
    let atom = solver.mk_atom(&store, a).unwrap();
    solver.add_clause(&[atom]);
    solver.add_clause(&[atom.negate()]);

    let result = solver.solve(&store);
    assert!(result.is_unsat());
    let proof = result.proof().unwrap();
    assert_eq!(proof.resolution_steps(), 1);
    let core = result.unsat_core().unwrap();
    assert_eq!(core.len(), 2);
    assert!(core.contains(&[Literal::new(&store, a, true)]));
    assert!(core.contains(&[Literal::new(&store, a, false)]));
}

#[test]
fn sat_models_fix_implied_variables() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let q = store.bool_const("q").unwrap();
    let mut solver = Solver::new(&store);
    let ap = solver.mk_atom(&store, p).unwrap();
    let aq = solver.mk_atom(&store, q).unwrap();
    solver.add_clause(&[ap, aq]);
    solver.add_clause(&[ap.negate(), aq]);

    let result = solver.solve(&store);
    assert!(result.is_sat());
    assert_eq!(result.model().unwrap().value_of(&store, q), Some(true));
}

struct FunctionCongruence {
    premise: Literal,
    conclusion: Literal,
}

impl Theory for FunctionCongruence {
    fn name(&self) -> &'static str {
        "function-congruence"
    }

    fn partial_check(&mut self, acts: &mut TheoryArg, _lits: &[Literal]) {
        if acts.value(self.premise) == Tristate::True && acts.value(self.conclusion) != Tristate::True {
            let premise = self.premise;
            acts.propagate(self.conclusion, Consequence::new(move || (vec![premise], ProofToken(1))));
        }
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}
}

#[test]
fn theory_propagation_reaches_the_core() {
    // a plugin propagating f(a) = f(b) from a stored fact a = b; the
    // propositional side only sees two opaque atoms
    let store = TermStore::new();
    let ab = store.bool_const("a_eq_b").unwrap();
    let fafb = store.bool_const("fa_eq_fb").unwrap();
    let lab = Literal::new(&store, ab, true);
    let lfafb = Literal::new(&store, fafb, true);

    let mut solver = Solver::with_config(&store, SolverConfig::new().with_proof_generation(true));
    solver.add_theory(Box::new(FunctionCongruence { premise: lab, conclusion: lfafb }));
    let atom_ab = solver.mk_atom(&store, ab).unwrap();
    let atom_fafb = solver.mk_atom(&store, fafb).unwrap();
    solver.add_clause(&[atom_ab]);
    solver.add_clause(&[atom_fafb.negate()]);

    let result = solver.solve(&store);
    assert!(result.is_unsat());
    let core = result.unsat_core().unwrap();
    assert!(core.contains(&[lab]));
    assert!(core.contains(&[lfafb.negate()]));
}

#[test]
fn push_pop_isolates_assertions() {
    let store = TermStore::new();
    let p = store.bool_const("p").unwrap();
    let mut solver = Solver::new(&store);
    let a = solver.mk_atom(&store, p).unwrap();

    solver.push();
    solver.add_clause(&[a]);
    let result = solver.solve(&store);
    assert_eq!(result.model().unwrap().value_of(&store, p), Some(true));
    solver.pop(1).unwrap();

    solver.add_clause(&[a.negate()]);
    let result = solver.solve(&store);
    assert_eq!(result.model().unwrap().value_of(&store, p), Some(false));
}

#[test]
fn restarts_do_not_change_the_outcome() {
    let store = TermStore::new();

    let eager = SolverConfig::new().with_proof_generation(true).with_low_level_config(
        smalt::solver::LowLevelConfig::new().with_restart_first(1),
    );
    let mut restarting = Solver::with_config(&store, eager);
    let n_clauses = pigeon_hole(&mut restarting, &store, 4);
    let restarting_result = restarting.solve(&store);

    let lazy = SolverConfig::new().with_proof_generation(true).with_low_level_config(
        smalt::solver::LowLevelConfig::new().with_restart_first(isize::MAX >> 8),
    );
    let mut steady = Solver::with_config(&store, lazy);
    pigeon_hole(&mut steady, &store, 4);
    let steady_result = steady.solve(&store);

    assert!(restarting.stats().restarts > steady.stats().restarts);
    assert!(restarting_result.is_unsat());
    assert!(steady_result.is_unsat());
    // the pigeonhole formula is minimally unsatisfiable, so both cores
    // contain every clause
    assert_eq!(restarting_result.unsat_core().unwrap().len(), n_clauses);
    assert_eq!(steady_result.unsat_core().unwrap().len(), n_clauses);
}

#[test]
fn dot_proofs_are_well_formed() {
    let store = TermStore::new();
    let mut solver = Solver::with_config(&store, SolverConfig::new().with_proof_generation(true));
    pigeon_hole(&mut solver, &store, 2);
    let mut handler = NopHandler::new();
    let result = solver.solve_with(&store, &[], &mut handler, true);
    let dot = result.proof().unwrap().to_dot(&store);

    let mut declared = std::collections::HashSet::new();
    let mut edges = Vec::new();
    let mut pivot_out: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for line in dot.lines() {
        let line = line.trim();
        if let Some((from, to)) = line.strip_suffix(';').and_then(|l| l.split_once(" -> ")) {
            edges.push((from.to_string(), to.to_string()));
            if from.starts_with('p') {
                *pivot_out.entry(from.to_string()).or_default() += 1;
            }
        } else if let Some(name) = line.split_whitespace().next() {
            if name.starts_with('c') || name.starts_with('p') {
                declared.insert(name.to_string());
            }
        }
    }
    assert!(!edges.is_empty());
    for (from, to) in &edges {
        assert!(declared.contains(from), "undeclared edge source {from}");
        assert!(declared.contains(to), "undeclared edge target {to}");
    }
    // every pivot node points at exactly its two parents
    for (pivot, out) in pivot_out {
        assert_eq!(out, 2, "pivot {pivot} has out-degree {out}");
    }
}

#[test]
fn timeouts_surface_as_unknown() {
    use smalt::handlers::{TimeoutHandler, Timer};
    use std::time::Duration;

    let store = TermStore::new();
    let mut solver = Solver::new(&store);
    pigeon_hole(&mut solver, &store, 6);
    let mut handler = TimeoutHandler::new(Timer::SingleTimeout(Duration::ZERO));
    let result = solver.solve_with(&store, &[], &mut handler, false);
    assert!(result.is_unknown());
}
