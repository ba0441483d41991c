//! Generic parallel map/reduce over a fixed pool of worker threads.
//!
//! Work is split into one contiguous partition per worker. Each worker maps
//! its items and folds them locally, the partial aggregates are reduced in a
//! two-level tree, and the result is the same for any pool size as long as
//! the combiner is associative and commutative with an identity.
//!
//! Iterative algorithms such as k-means run through [`ConvergenceDriver`],
//! which repeats rounds until a projected parameter stops changing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use parallel_mapreduce::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> parallel_mapreduce::Result<()> {
//!     let config = EngineConfig::default().with_workers(4);
//!
//!     let words = with_pool(&config, |pool| async move {
//!         run_map_reduce(
//!             &pool,
//!             infallible(|line: &String| line.split_whitespace().count()),
//!             combiner_fn(|| 0usize, |a, b| Ok(a + b)),
//!             vec!["a b c".to_string(), "d e".to_string()],
//!         )
//!         .await
//!     })
//!     .await?;
//!
//!     println!("{words} words");
//!     Ok(())
//! }
//! ```

pub mod algebra;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod partition;
pub mod pool;
pub mod workflow;

pub use algebra::{
    combiner_fn, fold_all, infallible, Combiner, FnCombiner, Infallible, Mapper, Monoid,
    MonoidCombiner,
};
pub use config::EngineConfig;
pub use engine::{run_convergent, run_map_reduce, run_map_reduce_with_context};
pub use error::{BoxError, EngineError, Result, ResultExt, Stage, TaskResult};
pub use models::{Budget, ConvergenceOutcome, ConvergenceStatus, RoundRecord};
pub use partition::{partition, partition_bounds, partition_owned, partition_shared, Partition};
pub use pool::{with_pool, DispatchError, WorkerPool};
pub use workflow::{
    map_stage, ChainStep, ConvergenceConfig, ConvergenceDriver, EngineEvent, ExecutionContext,
    InstrumentedStep, LambdaStep, MapStage, MapStep, ReduceStage, RunMetrics, Step, TapStep,
    TraceEntry, Workflow,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use parallel_mapreduce::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algebra::{combiner_fn, infallible, Combiner, Mapper, Monoid, MonoidCombiner};
    pub use crate::config::EngineConfig;
    pub use crate::engine::{run_convergent, run_map_reduce};
    pub use crate::error::{EngineError, Result, ResultExt, TaskResult};
    pub use crate::models::{ConvergenceOutcome, ConvergenceStatus};
    pub use crate::pool::{with_pool, WorkerPool};
    pub use crate::workflow::{
        ConvergenceDriver, ExecutionContext, MapStage, ReduceStage, RunMetrics, Step, Workflow,
    };

    // Re-export commonly used external types
    pub use serde::{Deserialize, Serialize};
}
