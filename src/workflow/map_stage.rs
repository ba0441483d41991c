//! Parallel map stage.
//!
//! The input is split into one contiguous partition per worker. Each worker
//! maps every element of its partition and folds the results locally with
//! the combiner, producing one partial aggregate per partition.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::algebra::{Combiner, Mapper};
use crate::error::{BoxError, EngineError, Result, Stage};
use crate::partition::{partition_shared, Partition};
use crate::pool::{DispatchError, WorkerPool};

use super::events::EngineEvent;
use super::metrics::ExecutionContext;
use super::Step;

/// A mapper or combiner error pinned to the input element that caused it.
struct ItemFailure {
    item: usize,
    source: BoxError,
}

/// Maps partitions of the input in parallel, one partial aggregate per partition.
///
/// Partial aggregates come back in partition order. A single failing element
/// fails the whole stage with a [`EngineError::WorkerFailure`] naming both the
/// partition and the element.
///
/// # Example
///
/// ```rust,ignore
/// use parallel_mapreduce::workflow::{ExecutionContext, MapStage, Step};
///
/// let stage = MapStage::new(pool.clone(), infallible(trial), MonoidCombiner::<Tally>::new());
/// let partials = stage.run(input, &ExecutionContext::new()).await?;
/// assert_eq!(partials.len(), pool.size());
/// ```
pub struct MapStage<I, A> {
    pool: Arc<WorkerPool>,
    mapper: Arc<dyn Mapper<I, A>>,
    combiner: Arc<dyn Combiner<A>>,
    partitions: Option<usize>,
}

impl<I, A> MapStage<I, A>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
{
    pub fn new(
        pool: Arc<WorkerPool>,
        mapper: impl Mapper<I, A>,
        combiner: impl Combiner<A>,
    ) -> Self {
        Self::from_parts(pool, Arc::new(mapper), Arc::new(combiner))
    }

    /// Build from already shared mapper and combiner.
    pub fn from_parts(
        pool: Arc<WorkerPool>,
        mapper: Arc<dyn Mapper<I, A>>,
        combiner: Arc<dyn Combiner<A>>,
    ) -> Self {
        Self {
            pool,
            mapper,
            combiner,
            partitions: None,
        }
    }

    /// Use fewer partitions than workers. Must be between 1 and the pool size.
    pub fn with_partition_count(mut self, count: usize) -> Self {
        self.partitions = Some(count);
        self
    }

    /// Number of partitions this stage will produce.
    pub fn partition_count(&self) -> usize {
        self.partitions.unwrap_or_else(|| self.pool.size())
    }

    /// Map `input` and return the per-partition aggregates.
    #[instrument(skip_all, fields(run_id = %ctx.run_id(), items = input.len(), partitions = self.partition_count()))]
    pub async fn execute(&self, input: Arc<[I]>, ctx: &ExecutionContext) -> Result<Vec<A>> {
        let count = self.partition_count();
        if count == 0 || count > self.pool.size() {
            return Err(EngineError::InvalidPartitionCount {
                count,
                workers: Some(self.pool.size()),
            });
        }

        let started = Instant::now();
        let items = input.len();
        let partitions = partition_shared(&input, count)?;

        let mapper = Arc::clone(&self.mapper);
        let combiner = Arc::clone(&self.combiner);
        let result = self
            .pool
            .try_apply(partitions, move |partition: Partition<I>| {
                map_partition(mapper.as_ref(), combiner.as_ref(), &partition)
            })
            .await;

        let partials = match result {
            Ok(partials) => partials,
            Err(err) => {
                let err = map_failure(err);
                ctx.record_failure(err.to_string());
                return Err(err);
            }
        };

        let duration = started.elapsed();
        debug!(
            items,
            partitions = count,
            duration_ms = duration.as_millis() as u64,
            "Map stage completed"
        );
        ctx.record_map(count, items);
        ctx.emit(EngineEvent::StageCompleted {
            stage: Stage::Map,
            units: count,
            items,
            duration_ms: duration.as_millis(),
        });

        Ok(partials)
    }
}

fn map_partition<I: 'static, A: 'static>(
    mapper: &dyn Mapper<I, A>,
    combiner: &dyn Combiner<A>,
    partition: &Partition<I>,
) -> std::result::Result<A, ItemFailure> {
    let mut acc: Option<A> = None;
    for (position, element) in partition.as_slice().iter().enumerate() {
        let item = partition.offset() + position;
        let value = mapper
            .map(element)
            .map_err(|source| ItemFailure { item, source })?;
        acc = Some(match acc {
            None => value,
            Some(prev) => combiner
                .combine(prev, value)
                .map_err(|source| ItemFailure { item, source })?,
        });
    }
    Ok(acc.unwrap_or_else(|| combiner.identity()))
}

fn map_failure(err: DispatchError<ItemFailure>) -> EngineError {
    match err {
        DispatchError::Task { index, error } => EngineError::WorkerFailure {
            stage: Stage::Map,
            index,
            item: Some(error.item),
            source: error.source,
        },
        DispatchError::Panic { index, message } => EngineError::WorkerPanicked {
            stage: Stage::Map,
            index,
            message,
        },
        DispatchError::Closed => EngineError::PoolClosed,
    }
}

#[async_trait]
impl<I, A> Step<Arc<[I]>, Vec<A>> for MapStage<I, A>
where
    I: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    async fn run(&self, input: Arc<[I]>, ctx: &ExecutionContext) -> Result<Vec<A>> {
        let partials = self.execute(input, ctx).await?;
        ctx.record_step();
        Ok(partials)
    }
}

/// Run a single map stage on a fresh context: the map-only use of the engine.
pub async fn map_stage<I, A>(
    pool: &Arc<WorkerPool>,
    mapper: impl Mapper<I, A>,
    combiner: impl Combiner<A>,
    input: impl Into<Arc<[I]>>,
) -> Result<Vec<A>>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
{
    MapStage::new(Arc::clone(pool), mapper, combiner)
        .execute(input.into(), &ExecutionContext::new())
        .await
}
