//! Iterate map/reduce rounds until a projected parameter stops changing.
//!
//! Each round builds a fresh mapper from the current parameter, runs a full
//! map stage and reduce stage over the same input, then projects the
//! aggregate into the next parameter. The run stops when the projection
//! equals the round's input parameter, or when a round or time budget
//! runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::algebra::{Combiner, Mapper};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Budget, ConvergenceOutcome, ConvergenceStatus, RoundRecord};
use crate::pool::WorkerPool;

use super::events::EngineEvent;
use super::map_stage::MapStage;
use super::metrics::ExecutionContext;
use super::reduce_stage::ReduceStage;
use super::Step;

type Factory<I, A, P> = dyn Fn(P) -> Arc<dyn Mapper<I, A>> + Send + Sync;
type Projection<A, P> = dyn Fn(&A) -> P + Send + Sync;
type Equality<P> = dyn Fn(&P, &P) -> bool + Send + Sync;

/// Budgets for a convergent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceConfig {
    /// Maximum number of rounds, at least 1.
    pub max_rounds: usize,
    /// Stop after the first round that ends past this much wall-clock time.
    pub time_budget: Option<Duration>,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ConvergenceConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            time_budget: config.time_budget,
        }
    }
}

/// Drives repeated map/reduce rounds to a fixed point.
///
/// The parameter is handed to the mapper factory by value at the start of
/// every round, so mappers only ever see an immutable snapshot.
///
/// # Example
///
/// ```rust,ignore
/// let driver = ConvergenceDriver::new(pool.clone(), assign_to_nearest, MonoidCombiner::new(), means)
///     .with_max_rounds(50);
/// let outcome = driver.run(points, initial_centroids, &ExecutionContext::new()).await?;
/// if outcome.converged() {
///     println!("{:?}", outcome.parameter);
/// }
/// ```
pub struct ConvergenceDriver<I, A, P> {
    pool: Arc<WorkerPool>,
    factory: Arc<Factory<I, A, P>>,
    combiner: Arc<dyn Combiner<A>>,
    project: Arc<Projection<A, P>>,
    equality: Arc<Equality<P>>,
    config: ConvergenceConfig,
}

impl<I, A, P> ConvergenceDriver<I, A, P>
where
    I: Send + Sync + 'static,
    A: Send + 'static,
    P: Clone + 'static,
{
    /// Create a driver that compares parameters with `PartialEq`.
    pub fn new<F, M, C, Pr>(pool: Arc<WorkerPool>, factory: F, combiner: C, project: Pr) -> Self
    where
        P: PartialEq,
        F: Fn(P) -> M + Send + Sync + 'static,
        M: Mapper<I, A>,
        C: Combiner<A>,
        Pr: Fn(&A) -> P + Send + Sync + 'static,
    {
        Self {
            pool,
            factory: Arc::new(move |parameter: P| {
                Arc::new(factory(parameter)) as Arc<dyn Mapper<I, A>>
            }),
            combiner: Arc::new(combiner),
            project: Arc::new(project),
            equality: Arc::new(|a: &P, b: &P| a == b),
            config: ConvergenceConfig::default(),
        }
    }

    /// Replace the equality test, e.g. with a tolerance for floating point parameters.
    pub fn with_equality(
        mut self,
        equality: impl Fn(&P, &P) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.equality = Arc::new(equality);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.config.max_rounds = max_rounds;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.config.time_budget = Some(budget);
        self
    }

    pub fn with_config(mut self, config: ConvergenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Run rounds until the parameter is stable or a budget is spent.
    ///
    /// Running out of budget is not an error: the outcome carries the last
    /// aggregate and parameter with an [`ConvergenceStatus::Exhausted`] status.
    /// Any map or reduce failure aborts the run.
    #[instrument(skip_all, fields(run_id = %ctx.run_id(), max_rounds = self.config.max_rounds))]
    pub async fn run(
        &self,
        input: impl Into<Arc<[I]>>,
        initial: P,
        ctx: &ExecutionContext,
    ) -> Result<ConvergenceOutcome<A, P>> {
        if self.config.max_rounds == 0 {
            return Err(EngineError::Config("max_rounds must be at least 1".into()));
        }

        let input: Arc<[I]> = input.into();
        let started = Instant::now();
        let mut parameter = initial;
        let mut rounds: Vec<RoundRecord> = Vec::new();

        loop {
            let round = rounds.len() + 1;
            let round_started = Instant::now();

            let mapper = (self.factory)(parameter.clone());
            let map = MapStage::from_parts(Arc::clone(&self.pool), mapper, Arc::clone(&self.combiner));
            let partials = map.execute(Arc::clone(&input), ctx).await?;
            let reduce = ReduceStage::from_parts(Arc::clone(&self.pool), Arc::clone(&self.combiner));
            let aggregate = reduce.execute(partials, ctx).await?;

            let next = (self.project)(&aggregate);
            let changed = !(self.equality)(&parameter, &next);
            rounds.push(RoundRecord {
                round,
                changed,
                elapsed: round_started.elapsed(),
            });
            ctx.record_round();
            ctx.emit(EngineEvent::RoundCompleted { round, changed });
            info!(round, changed, "Round completed");

            let status = if !changed {
                Some(ConvergenceStatus::Converged)
            } else if round >= self.config.max_rounds {
                Some(ConvergenceStatus::Exhausted(Budget::Rounds))
            } else if self
                .config
                .time_budget
                .is_some_and(|budget| started.elapsed() >= budget)
            {
                Some(ConvergenceStatus::Exhausted(Budget::Time))
            } else {
                None
            };

            match status {
                Some(status) => {
                    if let ConvergenceStatus::Exhausted(budget) = status {
                        warn!(rounds = round, ?budget, "Stopped before convergence");
                    }
                    return Ok(ConvergenceOutcome {
                        aggregate,
                        parameter: next,
                        status,
                        rounds,
                    });
                }
                None => parameter = next,
            }
        }
    }
}

#[async_trait]
impl<I, A, P> Step<(Arc<[I]>, P), ConvergenceOutcome<A, P>> for ConvergenceDriver<I, A, P>
where
    I: Send + Sync + 'static,
    A: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    async fn run(
        &self,
        (input, initial): (Arc<[I]>, P),
        ctx: &ExecutionContext,
    ) -> Result<ConvergenceOutcome<A, P>> {
        let outcome = ConvergenceDriver::run(self, input, initial, ctx).await?;
        ctx.record_step();
        Ok(outcome)
    }
}
