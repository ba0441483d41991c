//! Stage orchestration for map/reduce runs.
//!
//! The engine's stages are ordinary [`Step`]s, so a round can be composed
//! fluently and wrapped with instrumentation like any other pipeline.
//!
//! # Core Concepts
//!
//! - **Step**: The fundamental trait for pipeline units
//! - **ExecutionContext**: Shared context for metrics and trace events
//! - **RunMetrics**: Partition, item, group and round counters for a run
//! - **MapStage**: Parallel map with per-partition local folding
//! - **ReduceStage**: Two-level reduction of partial aggregates
//! - **ConvergenceDriver**: Repeated rounds until a projected parameter is stable
//! - **ChainStep**: Sequential composition of steps
//! - **MapStep**: Inline transformations between steps
//! - **Workflow**: High-level container with automatic metrics collection
//!
//! # Example: One Round with Metrics
//!
//! ```rust,ignore
//! use parallel_mapreduce::workflow::{MapStage, ReduceStage, Step, Workflow};
//!
//! let round = MapStage::new(pool.clone(), mapper, combiner.clone())
//!     .named("Map")
//!     .then(ReduceStage::new(pool.clone(), combiner).named("Reduce"));
//!
//! let workflow = Workflow::new(round).with_name("WordCount");
//! let (counts, metrics) = workflow.run(documents).await?;
//!
//! println!("Mapped {} items over {} partitions", metrics.items_mapped, metrics.partitions_mapped);
//! ```

mod chain;
mod convergence;
mod events;
mod instrumented;
mod map_stage;
mod metrics;
mod reduce_stage;
mod tap;
mod traits;

pub use chain::ChainStep;
pub use convergence::{ConvergenceConfig, ConvergenceDriver};
pub use events::{EngineEvent, TraceEntry};
pub use instrumented::InstrumentedStep;
pub use map_stage::{map_stage, MapStage};
pub use metrics::{ExecutionContext, RunMetrics};
pub use reduce_stage::ReduceStage;
pub use tap::TapStep;
pub use traits::{LambdaStep, MapStep, Step};

use std::sync::Arc;

use crate::Result;

/// A high-level container for a pipeline with automatic metrics collection.
///
/// `Workflow` wraps a step (or chain of steps) and provides:
/// - Automatic `ExecutionContext` creation and management
/// - The run's metrics alongside its output
/// - Optional naming for logging
pub struct Workflow<Input, Output> {
    step: Arc<dyn Step<Input, Output>>,
    name: Option<String>,
}

impl<Input, Output> Workflow<Input, Output>
where
    Input: Send + Sync + 'static,
    Output: Send + Sync + 'static,
{
    /// Create a new workflow wrapping the given step.
    pub fn new(step: impl Step<Input, Output> + 'static) -> Self {
        Self {
            step: Arc::new(step),
            name: None,
        }
    }

    /// Set a name for this workflow (used in logging).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Run on a fresh `ExecutionContext` and return the output with its metrics.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let (outcome, metrics) = workflow.run((points, centroids)).await?;
    /// println!("{} rounds", metrics.rounds_completed);
    /// ```
    pub async fn run(&self, input: Input) -> Result<(Output, RunMetrics)> {
        let ctx = ExecutionContext::new();
        let output = self.run_with_context(input, &ctx).await?;
        Ok((output, ctx.snapshot()))
    }

    /// Run with a caller-supplied context, e.g. to accumulate metrics across runs.
    pub async fn run_with_context(&self, input: Input, ctx: &ExecutionContext) -> Result<Output> {
        if let Some(name) = &self.name {
            tracing::info!(run_id = %ctx.run_id(), "Starting workflow: {}", name);
        }

        let result = self.step.run(input, ctx).await;

        if let Some(name) = &self.name {
            match &result {
                Ok(_) => {
                    let metrics = ctx.snapshot();
                    tracing::info!(
                        "Workflow '{}' completed. Steps: {}, Partitions: {}, Items: {}, Rounds: {}",
                        name,
                        metrics.steps_completed,
                        metrics.partitions_mapped,
                        metrics.items_mapped,
                        metrics.rounds_completed
                    );
                }
                Err(e) => tracing::error!("Workflow '{}' failed: {}", name, e),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{combiner_fn, infallible};
    use crate::pool::WorkerPool;

    #[tokio::test]
    async fn round_as_a_chained_workflow() {
        let pool = Arc::new(WorkerPool::new(3).unwrap());
        let sum = || combiner_fn(|| 0u64, |a, b| Ok(a + b));

        let round = MapStage::new(pool.clone(), infallible(|x: &u64| x * x), sum())
            .named("Map")
            .then(ReduceStage::new(pool.clone(), sum()).named("Reduce"));
        let workflow = Workflow::new(round).with_name("SumOfSquares");

        let input: Arc<[u64]> = (1..=10).collect::<Vec<_>>().into();
        let (total, metrics) = workflow.run(input).await.unwrap();

        assert_eq!(total, 385);
        assert_eq!(metrics.steps_completed, 2);
        assert_eq!(metrics.partitions_mapped, 3);
        assert_eq!(metrics.items_mapped, 10);
        assert_eq!(metrics.groups_reduced, 3);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shared_context_accumulates_across_runs() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let workflow = Workflow::new(MapStage::new(
            pool.clone(),
            infallible(|x: &u64| *x),
            combiner_fn(|| 0u64, |a, b| Ok(a + b)),
        ));

        let ctx = ExecutionContext::new();
        workflow.run_with_context(vec![1u64, 2].into(), &ctx).await.unwrap();
        workflow.run_with_context(vec![3u64].into(), &ctx).await.unwrap();

        assert_eq!(ctx.snapshot().items_mapped, 3);
        assert_eq!(ctx.snapshot().partitions_mapped, 4);
        pool.shutdown().await.unwrap();
    }
}
