//! Sequential composition of steps.
//!
//! A full map/reduce round is `map_stage.then(reduce_stage)`: the partial
//! aggregates produced by the map stage become the reduce stage's input.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

use super::metrics::ExecutionContext;
use super::Step;

/// Connects two steps linearly: output of the first becomes input of the second.
///
/// # Type Parameters
///
/// - `I`: Input type for the first step
/// - `M`: Intermediate type (output of first, input of second)
/// - `O`: Output type of the second step
///
/// # Example
///
/// ```rust,ignore
/// use parallel_mapreduce::workflow::{ChainStep, ExecutionContext, Step};
///
/// let round = ChainStep::new(map_stage, reduce_stage);
/// let ctx = ExecutionContext::new();
/// let aggregate = round.run(input, &ctx).await?;
/// ```
pub struct ChainStep<I, M, O> {
    first: Arc<dyn Step<I, M>>,
    second: Arc<dyn Step<M, O>>,
}

impl<I, M, O> ChainStep<I, M, O>
where
    I: Send + Sync + 'static,
    M: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Create a new chain from two steps.
    pub fn new(first: impl Step<I, M> + 'static, second: impl Step<M, O> + 'static) -> Self {
        Self {
            first: Arc::new(first),
            second: Arc::new(second),
        }
    }
}

#[async_trait]
impl<I, M, O> Step<I, O> for ChainStep<I, M, O>
where
    I: Send + Sync + 'static,
    M: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    async fn run(&self, input: I, ctx: &ExecutionContext) -> Result<O> {
        let intermediate = self.first.run(input, ctx).await?;
        self.second.run(intermediate, ctx).await
    }
}
