//! Metrics and context for engine execution.
//!
//! This module provides observability primitives for tracking runs,
//! including work counters, failure logging, and structured event tracing.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::events::{EngineEvent, TraceEntry};

/// Aggregated metrics for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    /// Partitions mapped across all map stages.
    pub partitions_mapped: usize,
    /// Input items passed through a mapper.
    pub items_mapped: usize,
    /// Groups folded on workers across all reduce stages.
    pub groups_reduced: usize,
    /// Convergence rounds completed.
    pub rounds_completed: usize,
    /// Number of steps completed successfully.
    pub steps_completed: usize,
    /// Collected failure messages from the run.
    pub failures: Vec<String>,
}

impl RunMetrics {
    pub fn record_map(&mut self, partitions: usize, items: usize) {
        self.partitions_mapped += partitions;
        self.items_mapped += items;
    }

    pub fn record_reduce(&mut self, groups: usize) {
        self.groups_reduced += groups;
    }

    pub fn record_round(&mut self) {
        self.rounds_completed += 1;
    }

    pub fn record_failure(&mut self, error: String) {
        self.failures.push(error);
    }

    pub fn record_step(&mut self) {
        self.steps_completed += 1;
    }
}

/// Context passed to every stage of a run.
///
/// Cloneable and thread-safe; clones share the same metrics and trace.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    /// Shared metrics accumulator.
    pub metrics: Arc<Mutex<RunMetrics>>,
    /// Shared trace log for structured events.
    pub traces: Arc<Mutex<Vec<TraceEntry>>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create a new execution context with empty metrics and traces.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            metrics: Arc::new(Mutex::new(RunMetrics::default())),
            traces: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Identifier attached to log spans for this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_map(&self, partitions: usize, items: usize) {
        self.metrics_guard().record_map(partitions, items);
    }

    pub fn record_reduce(&self, groups: usize) {
        self.metrics_guard().record_reduce(groups);
    }

    pub fn record_round(&self) {
        self.metrics_guard().record_round();
    }

    /// Increment the steps completed counter.
    pub fn record_step(&self) {
        self.metrics_guard().record_step();
    }

    /// Record a failure message.
    pub fn record_failure(&self, error: impl Into<String>) {
        self.metrics_guard().record_failure(error.into());
    }

    /// Get a snapshot of the current metrics.
    pub fn snapshot(&self) -> RunMetrics {
        self.metrics_guard().clone()
    }

    /// Append an event to the trace log, timestamped now.
    pub fn emit(&self, event: EngineEvent) {
        let entry = TraceEntry::new(event);
        self.traces_guard().push(entry);
    }

    /// Get a snapshot of the current trace log.
    pub fn trace_snapshot(&self) -> Vec<TraceEntry> {
        self.traces_guard().clone()
    }

    /// Clear all trace entries.
    ///
    /// Useful when reusing a context across several runs.
    pub fn clear_traces(&self) {
        self.traces_guard().clear();
    }

    // Poisoning is ignored: counters stay valid after a panic.
    fn metrics_guard(&self) -> MutexGuard<'_, RunMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn traces_guard(&self) -> MutexGuard<'_, Vec<TraceEntry>> {
        self.traces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_metrics() {
        let ctx = ExecutionContext::new();
        let other = ctx.clone();
        other.record_map(4, 100);
        other.record_reduce(4);
        ctx.record_round();

        let metrics = ctx.snapshot();
        assert_eq!(metrics.partitions_mapped, 4);
        assert_eq!(metrics.items_mapped, 100);
        assert_eq!(metrics.groups_reduced, 4);
        assert_eq!(metrics.rounds_completed, 1);
        assert_eq!(ctx.run_id(), other.run_id());
    }

    #[test]
    fn traces_can_be_cleared() {
        let ctx = ExecutionContext::new();
        ctx.emit(EngineEvent::RoundCompleted {
            round: 1,
            changed: true,
        });
        assert_eq!(ctx.trace_snapshot().len(), 1);
        ctx.clear_traces();
        assert!(ctx.trace_snapshot().is_empty());
    }
}
