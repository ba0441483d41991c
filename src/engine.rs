//! One-shot and convergent entry points.
//!
//! These wrap the workflow stages with a fresh [`ExecutionContext`] for
//! callers that just want an answer. Compose [`MapStage`] and
//! [`ReduceStage`] directly for instrumentation or shared metrics.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::algebra::{Combiner, Mapper};
use crate::error::Result;
use crate::models::ConvergenceOutcome;
use crate::pool::WorkerPool;
use crate::workflow::{ConvergenceDriver, ExecutionContext, MapStage, ReduceStage};

/// Map every item and reduce the partial aggregates to one value.
///
/// The result is independent of the pool size for any lawful combiner.
/// Empty input yields the combiner's identity. If the mapper or combiner
/// fails anywhere, the whole call fails and no partial aggregate is returned.
///
/// ```rust,no_run
/// # async fn demo() -> parallel_mapreduce::Result<()> {
/// use std::sync::Arc;
/// use parallel_mapreduce::{combiner_fn, infallible, run_map_reduce, WorkerPool};
///
/// let pool = Arc::new(WorkerPool::new(4)?);
/// let total = run_map_reduce(
///     &pool,
///     infallible(|x: &u64| x * 2),
///     combiner_fn(|| 0u64, |a, b| Ok(a + b)),
///     vec![1, 2, 3],
/// )
/// .await?;
/// assert_eq!(total, 12);
/// pool.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[instrument(skip_all, fields(workers = pool.size()))]
pub async fn run_map_reduce<I, A>(
    pool: &Arc<WorkerPool>,
    mapper: impl Mapper<I, A>,
    combiner: impl Combiner<A>,
    input: impl Into<Arc<[I]>>,
) -> Result<A>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
{
    run_map_reduce_with_context(pool, mapper, combiner, input, &ExecutionContext::new()).await
}

/// [`run_map_reduce`] recording into a caller-supplied context.
pub async fn run_map_reduce_with_context<I, A>(
    pool: &Arc<WorkerPool>,
    mapper: impl Mapper<I, A>,
    combiner: impl Combiner<A>,
    input: impl Into<Arc<[I]>>,
    ctx: &ExecutionContext,
) -> Result<A>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
{
    let combiner: Arc<dyn Combiner<A>> = Arc::new(combiner);
    let partials = MapStage::from_parts(Arc::clone(pool), Arc::new(mapper), Arc::clone(&combiner))
        .execute(input.into(), ctx)
        .await?;
    let aggregate = ReduceStage::from_parts(Arc::clone(pool), combiner)
        .execute(partials, ctx)
        .await?;

    let metrics = ctx.snapshot();
    info!(
        run_id = %ctx.run_id(),
        items = metrics.items_mapped,
        partitions = metrics.partitions_mapped,
        "Map/reduce run completed"
    );
    Ok(aggregate)
}

/// Repeat map/reduce rounds until `project` returns the parameter it was given.
///
/// `factory` builds the round's mapper from the current parameter. The run
/// ends after at most `max_rounds` rounds; check
/// [`ConvergenceOutcome::converged`] to tell a fixed point from an exhausted
/// budget.
#[instrument(skip_all, fields(workers = pool.size(), max_rounds = max_rounds))]
pub async fn run_convergent<I, A, P, F, M>(
    pool: &Arc<WorkerPool>,
    factory: F,
    combiner: impl Combiner<A>,
    project: impl Fn(&A) -> P + Send + Sync + 'static,
    initial: P,
    input: impl Into<Arc<[I]>>,
    max_rounds: usize,
) -> Result<ConvergenceOutcome<A, P>>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
    P: Clone + PartialEq + 'static,
    F: Fn(P) -> M + Send + Sync + 'static,
    M: Mapper<I, A>,
{
    ConvergenceDriver::new(Arc::clone(pool), factory, combiner, project)
        .with_max_rounds(max_rounds)
        .run(input, initial, &ExecutionContext::new())
        .await
}
