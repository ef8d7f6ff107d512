/// Counters collected during solving; readable at any time through
/// [`Solver::stats`](super::Solver::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Conflicts hit during search.
    pub conflicts: u64,
    /// Decisions taken.
    pub decisions: u64,
    /// Literals enqueued on the trail.
    pub propagations: u64,
    /// Restarts performed.
    pub restarts: u64,
    /// Clause-database reductions.
    pub db_reductions: u64,
    /// Clauses learned from conflicts.
    pub learned_clauses: u64,
    /// Literals propagated by theories.
    pub theory_propagations: u64,
    /// Conflicts raised by theories.
    pub theory_conflicts: u64,
}
