//! Example: two-dimensional k-means with Euclidean distance.
//!
//! Run with: `cargo run --release --example kmeans_2d -- 4`

use std::collections::BTreeMap;
use std::time::Instant;

use parallel_mapreduce::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

type Point = (f64, f64);

const POINTS: [Point; 8] = [
    (1.0, 0.0),
    (4.0, 5.0),
    (7.0, 3.0),
    (5.0, 2.0),
    (1.0, 3.0),
    (27.0, 34.0),
    (37.0, 29.0),
    (25.0, 27.0),
];
const REPEAT: usize = 10_000;

#[derive(Debug, Clone, Copy, Default)]
struct Cluster {
    sum: Point,
    count: u64,
}

impl Monoid for Cluster {
    fn empty() -> Self {
        Self::default()
    }

    fn combine(self, other: Self) -> Self {
        Self {
            sum: (self.sum.0 + other.sum.0, self.sum.1 + other.sum.1),
            count: self.count + other.count,
        }
    }
}

type Assignment = BTreeMap<usize, Cluster>;

fn distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

fn assign(means: Vec<Point>) -> impl Fn(&Point) -> Assignment + Send + Sync + 'static {
    move |point: &Point| {
        let mut best: Option<(usize, f64)> = None;
        for (index, mean) in means.iter().enumerate() {
            let d = distance(*mean, *point);
            if best.map_or(true, |(_, closest)| d < closest) {
                best = Some((index, d));
            }
        }
        best.map(|(index, _)| Assignment::from([(index, Cluster { sum: *point, count: 1 })]))
            .unwrap_or_default()
    }
}

fn centroids(assignment: &Assignment) -> Vec<Point> {
    assignment
        .values()
        .map(|c| (c.sum.0 / c.count as f64, c.sum.1 / c.count as f64))
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
    let points: Vec<Point> = POINTS.iter().copied().cycle().take(POINTS.len() * REPEAT).collect();

    println!("Starting.");
    let start = Instant::now();
    let outcome = with_pool(&config, |pool| async move {
        ConvergenceDriver::new(
            pool,
            |means: Vec<Point>| infallible(assign(means)),
            MonoidCombiner::<Assignment>::new(),
            centroids,
        )
        .run(points, vec![(13.0, 13.0), (14.0, 14.0)], &ExecutionContext::new())
        .await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    println!(
        "{} after {} rounds: {:?}",
        if outcome.converged() { "Converged" } else { "Stopped" },
        outcome.round_count(),
        outcome.parameter
    );
    Ok(())
}
