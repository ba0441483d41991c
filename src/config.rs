use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const ENV_WORKERS: &str = "MAPREDUCE_WORKERS";
const ENV_MAX_ROUNDS: &str = "MAPREDUCE_MAX_ROUNDS";
const ENV_TIME_BUDGET_MS: &str = "MAPREDUCE_TIME_BUDGET_MS";
const ENV_THREAD_NAME: &str = "MAPREDUCE_THREAD_NAME";

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of pool workers, which is also the partition count (default: available parallelism)
    pub workers: usize,
    /// Round cap for convergent runs (default: 100)
    pub max_rounds: usize,
    /// Optional wall-clock budget for convergent runs (default: none)
    pub time_budget: Option<Duration>,
    /// Prefix for worker thread names (default: "mapreduce-worker")
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_rounds: 100,
            time_budget: None,
            thread_name: "mapreduce-worker".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }
        if self.max_rounds == 0 {
            return Err(EngineError::Config("max_rounds must be at least 1".into()));
        }
        if self.thread_name.is_empty() {
            return Err(EngineError::Config("thread_name must not be empty".into()));
        }
        Ok(())
    }

    /// Defaults overridden by `MAPREDUCE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_WORKERS) {
            config.workers = parse_number(ENV_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ROUNDS) {
            config.max_rounds = parse_number(ENV_MAX_ROUNDS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIME_BUDGET_MS) {
            let millis: u64 = parse_number(ENV_TIME_BUDGET_MS, &raw)?;
            config.time_budget = Some(Duration::from_millis(millis));
        }
        if let Some(raw) = lookup(ENV_THREAD_NAME) {
            config.thread_name = raw;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}
