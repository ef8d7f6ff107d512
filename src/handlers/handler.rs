use super::SolverEvent;

/// Basic handler trait which can be used to control computations.
///
/// The solver calls [`should_resume`](ComputationHandler::should_resume) at
/// every conflict and restart round; returning `false` aborts the
/// computation, and the solver reports an unknown result with the event that
/// caused the abort.
pub trait ComputationHandler {
    /// Returns `true` if the computation may continue.
    fn should_resume(&mut self, event: SolverEvent) -> bool {
        let _ = event;
        true
    }
}

/// A handler which never aborts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NopHandler {}

impl NopHandler {
    pub const fn new() -> Self {
        Self {}
    }
}

impl ComputationHandler for NopHandler {}
