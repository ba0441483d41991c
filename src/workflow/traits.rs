//! The `Step` seam shared by stages, drivers and their adapters.

use async_trait::async_trait;

use crate::Result;

use super::chain::ChainStep;
use super::metrics::ExecutionContext;

/// A unit of asynchronous work that transforms an input into an output.
///
/// Map and reduce stages implement this trait, so a round can be assembled
/// with `.then()` and decorated with `.map()`, `.tap()` and `.named()`.
///
/// # Example
///
/// ```rust,ignore
/// use parallel_mapreduce::workflow::{ExecutionContext, Step};
///
/// let round = map_stage.named("Map").then(reduce_stage.named("Reduce"));
/// let ctx = ExecutionContext::new();
/// let aggregate = round.run(input, &ctx).await?;
/// ```
#[async_trait]
pub trait Step<Input, Output>: Send + Sync {
    async fn run(&self, input: Input, ctx: &ExecutionContext) -> Result<Output>;

    /// Feed this step's output into `next`, e.g. map partials into a reduce.
    fn then<NextOut, S>(self, next: S) -> ChainStep<Input, Output, NextOut>
    where
        Self: Sized + 'static,
        Input: Send + Sync + 'static,
        Output: Send + Sync + 'static,
        NextOut: Send + Sync + 'static,
        S: Step<Output, NextOut> + 'static,
    {
        ChainStep::new(self, next)
    }

    /// Project the output, typically a reduced aggregate, with a plain function.
    ///
    /// ```rust,ignore
    /// let estimate = round.map(|tally: Tally| 4.0 * tally.inside as f64 / tally.count as f64);
    /// ```
    fn map<NewOut, F>(self, f: F) -> MapStep<Self, F, Input, Output, NewOut>
    where
        Self: Sized + 'static,
        Input: Send + Sync + 'static,
        Output: Send + Sync + 'static,
        NewOut: Send + Sync + 'static,
        F: Fn(Output) -> NewOut + Send + Sync + 'static,
    {
        MapStep::new(self, f)
    }

    /// Observe the output without changing it. See [`TapStep`](super::TapStep).
    fn tap<F>(self, func: F) -> super::tap::TapStep<Self, F, Input, Output>
    where
        Self: Sized + 'static,
        Input: Send + Sync + 'static,
        Output: Send + Sync + 'static,
        F: Fn(&Output, &ExecutionContext) + Send + Sync + 'static,
    {
        super::tap::TapStep::new(self, func)
    }

    /// Record `StepStart`, then `StepEnd` or `Error`, under `name`.
    fn named(self, name: impl Into<String>) -> super::instrumented::InstrumentedStep<Self>
    where
        Self: Sized,
    {
        super::instrumented::InstrumentedStep::new(self, name)
    }
}

/// An async closure used as a [`Step`], e.g. to load input ahead of a map stage.
pub struct LambdaStep<F>(pub F);

#[async_trait]
impl<F, Fut, Input, Output> Step<Input, Output> for LambdaStep<F>
where
    Input: Send + 'static,
    Output: Send + 'static,
    F: Fn(Input) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Output>> + Send,
{
    async fn run(&self, input: Input, _ctx: &ExecutionContext) -> Result<Output> {
        (self.0)(input).await
    }
}

/// Output projection built by [`Step::map`].
pub struct MapStep<S, F, I, O, NewO> {
    inner: S,
    project: F,
    _io: std::marker::PhantomData<fn(I) -> (O, NewO)>,
}

impl<S, F, I, O, NewO> MapStep<S, F, I, O, NewO> {
    pub fn new(inner: S, project: F) -> Self {
        Self {
            inner,
            project,
            _io: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, I, O, NewO> Step<I, NewO> for MapStep<S, F, I, O, NewO>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    NewO: Send + Sync + 'static,
    S: Step<I, O> + Send + Sync,
    F: Fn(O) -> NewO + Send + Sync + 'static,
{
    async fn run(&self, input: I, ctx: &ExecutionContext) -> Result<NewO> {
        self.inner.run(input, ctx).await.map(&self.project)
    }
}
