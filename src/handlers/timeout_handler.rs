use std::time::{Duration, Instant};

use super::{ComputationHandler, SolverEvent};

/// Timing regimes for a [`TimeoutHandler`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Timer {
    /// A single timeout measured from handler construction.
    SingleTimeout(Duration),
    /// A timeout which restarts whenever a new computation begins.
    RestartingTimeout(Duration),
    /// A fixed point in time after which the computation is aborted.
    FixedEnd(Instant),
}

/// A handler which aborts the computation after a timeout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TimeoutHandler {
    timer: Timer,
    checkpoint: Instant,
}

impl TimeoutHandler {
    pub fn new(timer: Timer) -> Self {
        Self { timer, checkpoint: Instant::now() }
    }
}

impl ComputationHandler for TimeoutHandler {
    fn should_resume(&mut self, event: SolverEvent) -> bool {
        match self.timer {
            Timer::SingleTimeout(timeout) => self.checkpoint.elapsed() < timeout,
            Timer::RestartingTimeout(timeout) => {
                if matches!(event, SolverEvent::ComputationStarted(_)) {
                    self.checkpoint = Instant::now();
                }
                self.checkpoint.elapsed() < timeout
            }
            Timer::FixedEnd(end) => Instant::now() < end,
        }
    }
}
