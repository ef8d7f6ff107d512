use std::fmt::Display;

/// Events reported to a [`ComputationHandler`](super::ComputationHandler)
/// during solving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SolverEvent {
    /// A computation has started.
    ComputationStarted(Computation),
    /// A computation has finished.
    ComputationFinished(Computation),
    /// The CDCL engine detected a conflict.
    ConflictDetected,
    /// The CDCL engine performed a restart.
    Restart,
    /// The theory layer is about to run a partial or final check.
    TheoryCheck,
}

impl Display for SolverEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Event: ")?;
        match self {
            Self::ComputationStarted(c) => f.write_fmt(format_args!("Started computation: {c}")),
            Self::ComputationFinished(c) => f.write_fmt(format_args!("Finished computation: {c}")),
            Self::ConflictDetected => f.write_str("Conflict detected"),
            Self::Restart => f.write_str("Restart"),
            Self::TheoryCheck => f.write_str("Theory check"),
        }
    }
}

/// The computations a handler can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Computation {
    /// A `solve` call.
    Solve,
    /// Proof reconstruction after an UNSAT result.
    ProofReconstruction,
}

impl Display for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Solve => "Solve",
            Self::ProofReconstruction => "Proof reconstruction",
        })
    }
}
