//! Observe a step's output without consuming it.

use async_trait::async_trait;

use crate::Result;

use super::metrics::ExecutionContext;
use super::Step;

/// Runs `observe` on every successful output of `inner`, then returns it as is.
///
/// Typical use is logging per-partition partials between a map and a reduce:
///
/// ```rust,ignore
/// let round = MapStage::new(pool.clone(), mapper, combiner.clone())
///     .tap(|partials: &Vec<Tally>, _ctx| debug!(partitions = partials.len(), "mapped"))
///     .then(ReduceStage::new(pool.clone(), combiner));
/// ```
///
/// Failed runs skip the observer.
pub struct TapStep<S, F, I, O> {
    inner: S,
    observe: F,
    _io: std::marker::PhantomData<fn(I) -> O>,
}

impl<S, F, I, O> TapStep<S, F, I, O> {
    pub fn new(inner: S, observe: F) -> Self {
        Self {
            inner,
            observe,
            _io: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, I, O> Step<I, O> for TapStep<S, F, I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    S: Step<I, O> + Send + Sync,
    F: Fn(&O, &ExecutionContext) + Send + Sync + 'static,
{
    async fn run(&self, input: I, ctx: &ExecutionContext) -> Result<O> {
        let output = self.inner.run(input, ctx).await?;
        (self.observe)(&output, ctx);
        Ok(output)
    }
}
