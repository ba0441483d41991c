//! Example: Monte Carlo estimate of pi.
//!
//! Each of 1,000,000 trials throws a random point into the square
//! [-1, 1] x [-1, 1]; the fraction landing in the unit circle approaches pi/4.
//!
//! Run with: `cargo run --release --example pi -- 4`

use std::time::Instant;

use parallel_mapreduce::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const TRIALS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    inside: u64,
    count: u64,
}

impl Monoid for Tally {
    fn empty() -> Self {
        Self::default()
    }

    fn combine(self, other: Self) -> Self {
        Self {
            inside: self.inside + other.inside,
            count: self.count + other.count,
        }
    }
}

fn trial(_: &u32) -> Tally {
    let x = 2.0 * rand::random::<f64>() - 1.0;
    let y = 2.0 * rand::random::<f64>() - 1.0;
    Tally {
        inside: u64::from(x * x + y * y <= 1.0),
        count: 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let workers = workers_from_args()?;
    let config = EngineConfig::from_env()?.with_workers(workers);
    let trials: Vec<u32> = (0..TRIALS).collect();

    println!("Starting.");
    let start = Instant::now();
    let tally = with_pool(&config, |pool| async move {
        run_map_reduce(&pool, infallible(trial), MonoidCombiner::<Tally>::new(), trials).await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    println!("{}", 4.0 * tally.inside as f64 / tally.count as f64);
    Ok(())
}

fn workers_from_args() -> Result<usize> {
    match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .map_err(|_| EngineError::Config(format!("worker count must be a number, got {arg:?}"))),
        None => Ok(1),
    }
}
