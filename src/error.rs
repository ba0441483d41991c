use std::fmt;

use thiserror::Error;

/// Error type returned by user-supplied mappers and combiners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a single mapper or combiner invocation.
pub type TaskResult<T> = std::result::Result<T, BoxError>;

/// The part of a round in which a worker failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// A raw `parallel_apply` call outside of any stage.
    Apply,
    /// Mapping and locally folding one partition.
    Map,
    /// Folding one group of partial aggregates on a worker.
    Reduce,
    /// Merging group results on the coordinating side.
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Apply => "apply",
            Stage::Map => "map",
            Stage::Reduce => "reduce",
            Stage::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Detailed error types for map-reduce execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Partition or worker count was zero, or more partitions than workers were requested.
    #[error("Invalid partition count {count}{}", .workers.map(|w| format!(" for a pool of {w} workers")).unwrap_or_default())]
    InvalidPartitionCount {
        count: usize,
        workers: Option<usize>,
    },

    /// A mapper or combiner returned an error for a specific partition or group.
    #[error("Worker failure in {stage} stage at index {index}{}: {source}", .item.map(|i| format!(" (item {i})")).unwrap_or_default())]
    WorkerFailure {
        stage: Stage,
        /// Partition index (map), group index (reduce/merge) or item index (apply).
        index: usize,
        /// Index of the failing element in the caller's input, when known.
        item: Option<usize>,
        #[source]
        source: BoxError,
    },

    /// A mapper or combiner panicked while running on a worker.
    #[error("Worker panicked in {stage} stage at index {index}: {message}")]
    WorkerPanicked {
        stage: Stage,
        index: usize,
        message: String,
    },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Worker pool shutdown incomplete: {failed} worker(s) failed to terminate")]
    PoolShutdown { failed: usize },

    #[error("Failed to spawn worker threads: {0}")]
    Spawn(#[source] rayon::ThreadPoolBuildError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Context error: {0}")]
    Context(String),
}

impl EngineError {
    /// Create a worker failure for the given stage and index.
    pub fn worker_failure(stage: Stage, index: usize, source: impl Into<BoxError>) -> Self {
        Self::WorkerFailure {
            stage,
            index,
            item: None,
            source: source.into(),
        }
    }

    /// Check if this error came from a failed or panicking worker invocation.
    pub fn is_worker_failure(&self) -> bool {
        matches!(self, Self::WorkerFailure { .. } | Self::WorkerPanicked { .. })
    }

    /// The partition/group/item index a worker failure refers to.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            Self::WorkerFailure { index, .. } | Self::WorkerPanicked { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The input element that made a mapper fail, when the stage could tell.
    pub fn failed_item(&self) -> Option<usize> {
        match self {
            Self::WorkerFailure { item, .. } => *item,
            _ => None,
        }
    }

    /// The stage a worker failure happened in.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::WorkerFailure { stage, .. } | Self::WorkerPanicked { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn with_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_err = e.into();
            EngineError::Context(format!("{}: {}", context.into(), base_err))
        })
    }
}
