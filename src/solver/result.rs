use crate::proof::{Proof, UnsatCore};

use super::Model;

/// Why the solver answered unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    /// The handler aborted the computation.
    Timeout,
    /// The configured conflict budget was exhausted.
    MaxConflicts,
    /// A theory declared its reasoning incomplete for the final
    /// assignment.
    Incomplete,
}

/// The outcome of a solve call.
#[must_use]
pub enum SolveResult {
    /// The assertions are satisfiable.
    Sat(Model),
    /// The assertions are unsatisfiable. The proof and core are present
    /// when proof generation is enabled and reconstruction succeeded; an
    /// absent proof does not weaken the verdict.
    Unsat {
        proof: Option<Proof>,
        unsat_core: Option<UnsatCore>,
    },
    /// The solver could not decide.
    Unknown(UnknownReason),
}

impl SolveResult {
    /// `true` for a SAT result.
    pub const fn is_sat(&self) -> bool {
        matches!(self, Self::Sat(_))
    }

    /// `true` for an UNSAT result.
    pub const fn is_unsat(&self) -> bool {
        matches!(self, Self::Unsat { .. })
    }

    /// `true` for an unknown result.
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// The model of a SAT result.
    pub const fn model(&self) -> Option<&Model> {
        match self {
            Self::Sat(model) => Some(model),
            _ => None,
        }
    }

    /// The proof of an UNSAT result, if one was reconstructed.
    pub const fn proof(&self) -> Option<&Proof> {
        match self {
            Self::Unsat { proof: Some(proof), .. } => Some(proof),
            _ => None,
        }
    }

    /// The unsat core of an UNSAT result, if one was reconstructed.
    pub const fn unsat_core(&self) -> Option<&UnsatCore> {
        match self {
            Self::Unsat { unsat_core: Some(core), .. } => Some(core),
            _ => None,
        }
    }
}
