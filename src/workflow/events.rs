//! Structured events recorded while a run executes.

use chrono::{DateTime, Utc};

use crate::error::Stage;

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// An instrumented step began.
    StepStart {
        step_name: String,
        input_type: String,
    },
    /// An instrumented step finished successfully.
    StepEnd { step_name: String, duration_ms: u128 },
    /// An instrumented step failed.
    Error { step_name: String, message: String },
    /// A map or reduce stage finished one parallel pass.
    StageCompleted {
        stage: Stage,
        /// Partitions (map) or groups (reduce) dispatched to workers.
        units: usize,
        /// Input items (map) or partial aggregates (reduce) consumed.
        items: usize,
        duration_ms: u128,
    },
    /// A convergence round finished.
    RoundCompleted { round: usize, changed: bool },
}

/// An [`EngineEvent`] stamped with the time it was recorded.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

impl TraceEntry {
    pub fn new(event: EngineEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
