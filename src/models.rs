use std::time::Duration;

/// Which budget ended a convergent run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Rounds,
    Time,
}

/// How a convergent run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// A round's projected parameter equalled its input parameter.
    Converged,
    /// A budget ran out first; the outcome holds the last computed values.
    Exhausted(Budget),
}

/// Information about one map/reduce round.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    /// 1-based round number.
    pub round: usize,
    /// Whether the projection differed from the round's input parameter.
    pub changed: bool,
    pub elapsed: Duration,
}

/// Outcome of a convergent run including the final aggregate and round trace.
#[derive(Debug, Clone)]
pub struct ConvergenceOutcome<A, P> {
    /// Aggregate produced by the last round.
    pub aggregate: A,
    /// Projection of the last aggregate.
    pub parameter: P,
    pub status: ConvergenceStatus,
    pub rounds: Vec<RoundRecord>,
}

impl<A, P> ConvergenceOutcome<A, P> {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    /// Number of rounds executed.
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.rounds.iter().map(|r| r.elapsed).sum()
    }
}
