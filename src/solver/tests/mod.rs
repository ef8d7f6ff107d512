mod theory_tests;

use crate::solver::{ClauseMinimization, SolverConfig};

/// The configurations behavior tests run against.
pub(crate) fn solver_configs() -> Vec<SolverConfig> {
    let mut configs = Vec::new();
    for proof_generation in [false, true] {
        for clause_minimization in [ClauseMinimization::None, ClauseMinimization::Basic, ClauseMinimization::Deep] {
            for initial_phase in [false, true] {
                configs.push(
                    SolverConfig::new()
                        .with_proof_generation(proof_generation)
                        .with_clause_minimization(clause_minimization)
                        .with_initial_phase(initial_phase),
                );
            }
        }
    }
    configs
}

/// Pigeonhole principle with `holes + 1` pigeons; minimally
/// unsatisfiable.
pub(crate) fn pigeon_hole(
    solver: &mut crate::solver::Solver,
    store: &crate::terms::TermStore,
    holes: usize,
) {
    let pigeons = holes + 1;
    let mut atoms = vec![vec![]; pigeons];
    for (p, row) in atoms.iter_mut().enumerate() {
        for h in 0..holes {
            let t = store.bool_const(&format!("p{p}h{h}")).unwrap();
            row.push(solver.mk_atom(store, t).unwrap());
        }
    }
    for row in &atoms {
        solver.add_clause(row);
    }
    for h in 0..holes {
        for p1 in 0..pigeons {
            for p2 in (p1 + 1)..pigeons {
                solver.add_clause(&[atoms[p1][h].negate(), atoms[p2][h].negate()]);
            }
        }
    }
}
