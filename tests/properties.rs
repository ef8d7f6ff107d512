use proptest::prelude::*;
use smalt::solver::{Solver, SolverConfig};
use smalt::terms::{Literal, TermStore};

const N_VARS: usize = 5;

type TestClause = Vec<(usize, bool)>;

fn clause_strategy() -> impl Strategy<Value = TestClause> {
    prop::collection::vec((0..N_VARS, any::<bool>()), 1..=3)
}

fn formula_strategy() -> impl Strategy<Value = Vec<TestClause>> {
    prop::collection::vec(clause_strategy(), 1..=10)
}

fn brute_force_sat(formula: &[TestClause]) -> bool {
    (0_u32..(1 << N_VARS)).any(|assignment| {
        formula.iter().all(|clause| {
            clause.iter().any(|&(v, sign)| ((assignment >> v) & 1 == 1) == sign)
        })
    })
}

fn load(solver: &mut Solver, store: &TermStore, formula: &[TestClause]) {
    let atoms: Vec<_> = (0..N_VARS)
        .map(|v| {
            let t = store.bool_const(&format!("x{v}")).unwrap();
            solver.mk_atom(store, t).unwrap()
        })
        .collect();
    for clause in formula {
        let lits: Vec<_> = clause.iter().map(|&(v, sign)| if sign { atoms[v] } else { atoms[v].negate() }).collect();
        solver.add_clause(&lits);
    }
}

proptest! {
    #[test]
    fn solver_agrees_with_brute_force(formula in formula_strategy()) {
        let store = TermStore::new();
        let mut solver = Solver::new(&store);
        load(&mut solver, &store, &formula);
        let result = solver.solve(&store);
        prop_assert_eq!(result.is_sat(), brute_force_sat(&formula));
    }

    #[test]
    fn models_satisfy_the_formula(formula in formula_strategy()) {
        let store = TermStore::new();
        let mut solver = Solver::new(&store);
        load(&mut solver, &store, &formula);
        let result = solver.solve(&store);
        if let Some(model) = result.model() {
            for clause in &formula {
                let satisfied = clause.iter().any(|&(v, sign)| {
                    let t = store.bool_const(&format!("x{v}")).unwrap();
                    model.value_of(&store, t) == Some(sign)
                });
                prop_assert!(satisfied);
            }
        }
    }

    #[test]
    fn proofs_validate_and_cores_are_unsat(formula in formula_strategy()) {
        let store = TermStore::new();
        let config = SolverConfig::new().with_proof_generation(true);
        let mut solver = Solver::with_config(&store, config);
        load(&mut solver, &store, &formula);
        let result = solver.solve(&store);
        prop_assert_eq!(result.is_sat(), brute_force_sat(&formula));
        if result.is_unsat() {
            let proof = result.proof().expect("proof generation was on");
            prop_assert!(proof.validate().is_ok());

            // the reported core must itself be unsatisfiable
            let core = result.unsat_core().expect("core accompanies the proof");
            let core_formula: Vec<Vec<(usize, bool)>> = core
                .clauses()
                .iter()
                .map(|clause| {
                    clause
                        .iter()
                        .map(|lit| {
                            let name = store.to_string(lit.term());
                            let v: usize = name.trim_start_matches('x').parse().unwrap();
                            (v, lit.sign())
                        })
                        .collect()
                })
                .collect();
            prop_assert!(!brute_force_sat(&core_formula));
        }
    }

    #[test]
    fn push_pop_round_trip(base in formula_strategy(), extra in formula_strategy()) {
        let store = TermStore::new();
        let mut solver = Solver::new(&store);
        load(&mut solver, &store, &base);

        solver.push();
        for clause in &extra {
            let lits: Vec<_> = clause
                .iter()
                .map(|&(v, sign)| {
                    let t = store.bool_const(&format!("x{v}")).unwrap();
                    let atom = solver.mk_atom(&store, t).unwrap();
                    if sign { atom } else { atom.negate() }
                })
                .collect();
            solver.add_clause(&lits);
        }
        let _ = solver.solve(&store);
        solver.pop(1).unwrap();

        let after = solver.solve(&store);
        prop_assert_eq!(after.is_sat(), brute_force_sat(&base));
    }

    #[test]
    fn literal_normalization_is_idempotent(sign in any::<bool>(), negations in 0_usize..4) {
        let store = TermStore::new();
        let mut t = store.bool_const("p").unwrap();
        for _ in 0..negations {
            t = store.not(t).unwrap();
        }
        let lit = Literal::new(&store, t, sign);
        let (normalized, _) = lit.norm();
        prop_assert!(normalized.sign());
        prop_assert_eq!(normalized.norm().0, normalized);
        prop_assert_eq!(lit.negate().negate(), lit);
    }
}
