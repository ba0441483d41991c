//! Example: one-dimensional k-means as a convergent map/reduce.
//!
//! Every round assigns each point to its nearest centroid, sums the points
//! per centroid, and takes the means as the next centroids. The run stops
//! when the centroids no longer move.
//!
//! Run with: `cargo run --release --example kmeans -- 4`

use std::collections::BTreeMap;
use std::time::Instant;

use parallel_mapreduce::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const POINTS: [f64; 14] = [
    1.0, 0.0, 4.0, 5.0, 7.0, 3.0, 5.0, 2.0, 1.0, 27.0, 34.0, 37.0, 29.0, 25.0,
];
const REPEAT: usize = 10_000;

/// Running sum and member count for one centroid.
#[derive(Debug, Clone, Copy, Default)]
struct Cluster {
    sum: f64,
    count: u64,
}

impl Monoid for Cluster {
    fn empty() -> Self {
        Self::default()
    }

    fn combine(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }
}

/// Clusters keyed by the index of the centroid they were assigned to.
type Assignment = BTreeMap<usize, Cluster>;

/// Index of the closest centroid; ties go to the lowest index.
fn nearest(centroids: &[f64], point: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = (centroid - point).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

fn assign(centroids: Vec<f64>) -> impl Fn(&f64) -> Assignment + Send + Sync + 'static {
    move |point: &f64| {
        nearest(&centroids, *point)
            .map(|index| Assignment::from([(index, Cluster { sum: *point, count: 1 })]))
            .unwrap_or_default()
    }
}

fn means(assignment: &Assignment) -> Vec<f64> {
    assignment
        .values()
        .map(|cluster| cluster.sum / cluster.count as f64)
        .collect()
}

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
    let max_rounds = config.max_rounds;
    let points: Vec<f64> = POINTS.iter().copied().cycle().take(POINTS.len() * REPEAT).collect();

    println!("Starting.");
    let start = Instant::now();
    let outcome = with_pool(&config, |pool| async move {
        run_convergent(
            &pool,
            |centroids: Vec<f64>| infallible(assign(centroids)),
            MonoidCombiner::<Assignment>::new(),
            means,
            vec![13.0, 14.0],
            points,
            max_rounds,
        )
        .await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    if !outcome.converged() {
        println!("Stopped after {} rounds without converging.", outcome.round_count());
    }
    println!("{:?}", outcome.parameter);
    Ok(())
}
