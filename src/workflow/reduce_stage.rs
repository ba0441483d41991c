//! Two-level reduction of partial aggregates.
//!
//! Level one splits the partials into one group per worker and folds each
//! group on the pool. Level two folds the group results on the caller.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::algebra::{fold_all, Combiner};
use crate::error::{EngineError, Result, Stage};
use crate::partition::partition_owned;
use crate::pool::WorkerPool;

use super::events::EngineEvent;
use super::metrics::ExecutionContext;
use super::Step;

/// Reduces a list of partial aggregates to one aggregate.
///
/// An empty list reduces to the combiner's identity without touching the pool.
pub struct ReduceStage<A> {
    pool: Arc<WorkerPool>,
    combiner: Arc<dyn Combiner<A>>,
}

impl<A> ReduceStage<A>
where
    A: Send + 'static,
{
    pub fn new(pool: Arc<WorkerPool>, combiner: impl Combiner<A>) -> Self {
        Self::from_parts(pool, Arc::new(combiner))
    }

    pub fn from_parts(pool: Arc<WorkerPool>, combiner: Arc<dyn Combiner<A>>) -> Self {
        Self { pool, combiner }
    }

    #[instrument(skip_all, fields(run_id = %ctx.run_id(), partials = partials.len()))]
    pub async fn execute(&self, partials: Vec<A>, ctx: &ExecutionContext) -> Result<A> {
        if partials.is_empty() {
            return Ok(self.combiner.identity());
        }

        let started = Instant::now();
        let items = partials.len();
        let groups = self.pool.size();

        let combiner = Arc::clone(&self.combiner);
        let level_one = self
            .pool
            .try_apply(partition_owned(partials, groups)?, move |group: Vec<A>| {
                fold_all(combiner.as_ref(), group).map_err(|(_, source)| source)
            })
            .await
            .map_err(|err| err.into_engine_error(Stage::Reduce));

        let result = level_one.and_then(|group_results| {
            fold_all(self.combiner.as_ref(), group_results).map_err(|(index, source)| {
                EngineError::WorkerFailure {
                    stage: Stage::Merge,
                    index,
                    item: None,
                    source,
                }
            })
        });

        let aggregate = match result {
            Ok(aggregate) => aggregate,
            Err(err) => {
                ctx.record_failure(err.to_string());
                return Err(err);
            }
        };

        let duration = started.elapsed();
        debug!(
            partials = items,
            groups,
            duration_ms = duration.as_millis() as u64,
            "Reduce stage completed"
        );
        ctx.record_reduce(groups);
        ctx.emit(EngineEvent::StageCompleted {
            stage: Stage::Reduce,
            units: groups,
            items,
            duration_ms: duration.as_millis(),
        });

        Ok(aggregate)
    }
}

#[async_trait]
impl<A> Step<Vec<A>, A> for ReduceStage<A>
where
    A: Send + Sync + 'static,
{
    async fn run(&self, input: Vec<A>, ctx: &ExecutionContext) -> Result<A> {
        let aggregate = self.execute(input, ctx).await?;
        ctx.record_step();
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::algebra::{combiner_fn, MonoidCombiner};

    #[tokio::test]
    async fn reduces_more_partials_than_workers() {
        let pool = Arc::new(WorkerPool::new(3).unwrap());
        let stage = ReduceStage::new(pool.clone(), combiner_fn(|| 0i64, |a, b| Ok(a + b)));
        let ctx = ExecutionContext::new();

        let total = stage.execute((1..=10).collect(), &ctx).await.unwrap();
        assert_eq!(total, 55);
        assert_eq!(ctx.snapshot().groups_reduced, 3);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn empty_partials_reduce_to_identity() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let stage = ReduceStage::new(pool.clone(), MonoidCombiner::<BTreeSet<u32>>::new());
        let ctx = ExecutionContext::new();

        let merged = stage.execute(Vec::new(), &ctx).await.unwrap();
        assert!(merged.is_empty());
        assert!(ctx.trace_snapshot().is_empty());
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn set_union_across_groups() {
        let pool = Arc::new(WorkerPool::new(4).unwrap());
        let stage = ReduceStage::new(pool.clone(), MonoidCombiner::<BTreeSet<u32>>::new());
        let partials = vec![
            BTreeSet::from([1, 2]),
            BTreeSet::from([2, 3]),
            BTreeSet::new(),
        ];

        let merged = stage.run(partials, &ExecutionContext::new()).await.unwrap();
        assert_eq!(merged, BTreeSet::from([1, 2, 3]));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn combine_failure_is_a_reduce_failure() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let checked = combiner_fn(
            || 0u8,
            |a: u8, b: u8| a.checked_add(b).ok_or_else(|| "overflow".into()),
        );
        let stage = ReduceStage::new(pool.clone(), checked);
        let ctx = ExecutionContext::new();

        let err = stage.execute(vec![1, 1, 200, 100], &ctx).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Reduce));
        assert_eq!(err.failed_index(), Some(1));
        assert_eq!(ctx.snapshot().failures.len(), 1);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn merge_failure_is_reported_on_coordinator() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let checked = combiner_fn(
            || 0u8,
            |a: u8, b: u8| a.checked_add(b).ok_or_else(|| "overflow".into()),
        );
        let stage = ReduceStage::new(pool.clone(), checked);

        // groups [200] [100]: each fits, their sum does not
        let err = stage
            .execute(vec![200, 100], &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Merge));
        pool.shutdown().await.unwrap();
    }
}
