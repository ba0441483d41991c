//! Example: pi from the Leibniz series, summed in parallel.
//!
//! pi / 4 = 1 - 1/3 + 1/5 - 1/7 + ...
//!
//! Run with: `cargo run --release --example leibniz -- 4`

use std::time::Instant;

use parallel_mapreduce::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const TERMS: u64 = 1_000_000;

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let workers = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .map_err(|_| EngineError::Config(format!("worker count must be a number, got {arg:?}")))?,
        None => 1,
    };
    let config = EngineConfig::from_env()?.with_workers(workers);
    let terms: Vec<u64> = (0..TERMS).collect();

    println!("Starting.");
    let start = Instant::now();
    let sum = with_pool(&config, |pool| async move {
        run_map_reduce(
            &pool,
            infallible(|n: &u64| {
                let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
                sign / (2 * n + 1) as f64
            }),
            combiner_fn(|| 0.0f64, |a, b| Ok(a + b)),
            terms,
        )
        .await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    println!("Pi is {:.6}", 4.0 * sum);
    Ok(())
}
