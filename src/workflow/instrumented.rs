//! Named steps: trace events plus a tracing span around each run.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info_span, Instrument};

use crate::Result;

use super::events::EngineEvent;
use super::metrics::ExecutionContext;
use super::Step;

/// A step run under a name, built by [`Step::named`].
///
/// Each run records `StepStart` and then either `StepEnd` with its duration or
/// `Error` with the failure message, and executes inside a `step` span so
/// stage logs carry the name.
pub struct InstrumentedStep<S> {
    pub inner: S,
    pub name: String,
}

impl<S> InstrumentedStep<S> {
    pub fn new(inner: S, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S, I, O> Step<I, O> for InstrumentedStep<S>
where
    S: Step<I, O>,
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    async fn run(&self, input: I, ctx: &ExecutionContext) -> Result<O> {
        ctx.emit(EngineEvent::StepStart {
            step_name: self.name.clone(),
            input_type: std::any::type_name::<I>().to_string(),
        });

        let started = Instant::now();
        let span = info_span!("step", name = %self.name, run_id = %ctx.run_id());
        let result = self.inner.run(input, ctx).instrument(span).await;
        let duration_ms = started.elapsed().as_millis();

        let event = match &result {
            Ok(_) => {
                debug!(step = %self.name, duration_ms = duration_ms as u64, "Step completed");
                EngineEvent::StepEnd {
                    step_name: self.name.clone(),
                    duration_ms,
                }
            }
            Err(e) => EngineEvent::Error {
                step_name: self.name.clone(),
                message: e.to_string(),
            },
        };
        ctx.emit(event);

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::algebra::{combiner_fn, infallible};
    use crate::error::{EngineError, Stage, TaskResult};
    use crate::pool::WorkerPool;
    use crate::workflow::{LambdaStep, MapStage};

    #[tokio::test]
    async fn named_map_stage_records_start_and_end() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let stage = MapStage::new(
            pool.clone(),
            infallible(|x: &u32| *x),
            combiner_fn(|| 0u32, |a, b| Ok(a + b)),
        )
        .named("Sum");

        let ctx = ExecutionContext::new();
        let partials = stage.run(vec![1u32, 2, 3].into(), &ctx).await.unwrap();
        assert_eq!(partials, vec![3, 3]);

        let steps: Vec<_> = ctx
            .trace_snapshot()
            .into_iter()
            .filter(|t| matches!(t.event, EngineEvent::StepStart { .. } | EngineEvent::StepEnd { .. }))
            .collect();
        assert_eq!(steps.len(), 2);
        assert!(matches!(
            &steps[0].event,
            EngineEvent::StepStart { step_name, input_type } if step_name == "Sum" && input_type.contains("u32")
        ));
        assert!(matches!(
            &steps[1].event,
            EngineEvent::StepEnd { step_name, .. } if step_name == "Sum"
        ));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_stage_records_error_event() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let stage = MapStage::new(
            pool.clone(),
            |x: &u32| -> TaskResult<u32> { Err(format!("cannot map {x}").into()) },
            combiner_fn(|| 0u32, |a, b| Ok(a + b)),
        )
        .named("Reject");

        let ctx = ExecutionContext::new();
        let err = stage.run(vec![7u32].into(), &ctx).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Map));

        let last = ctx.trace_snapshot().pop().unwrap();
        assert!(matches!(
            &last.event,
            EngineEvent::Error { step_name, message }
            if step_name == "Reject" && message.contains("cannot map 7")
        ));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn inner_step_is_recoverable() {
        let step = LambdaStep(|_: u8| async move { Err::<u8, _>(EngineError::PoolClosed) }).named("Closed");
        assert_eq!(step.name(), "Closed");
        let inner = step.into_inner();
        let err = inner.run(1, &ExecutionContext::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::PoolClosed));
    }
}
