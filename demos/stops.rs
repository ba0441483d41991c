//! Example: assign every student to the nearest bus stop.
//!
//! A map-only run: each partition produces its own `student -> stop` table.
//! A tap on the map stage reports the table sizes; no reduce stage runs.
//!
//! Stops are read from the `Point` features of a street grid GeoJSON file and
//! students from the first coordinate of each student feature. Without file
//! arguments a synthetic grid and random students are generated.
//!
//! Run with: `cargo run --release --example stops -- 4 streetgrid.geojson students.geojson`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parallel_mapreduce::prelude::*;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

type Coordinate = (f64, f64);

/// Student index -> stop index.
type Assignment = BTreeMap<usize, usize>;

#[derive(Debug, Clone, Copy)]
struct Student {
    id: usize,
    position: Coordinate,
}

fn coordinate(value: &Value) -> Option<Coordinate> {
    Some((value.get(0)?.as_f64()?, value.get(1)?.as_f64()?))
}

fn load(path: &str) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Context(format!("reading {path}: {e}")))?;
    serde_json::from_str(&raw).with_context(format!("parsing {path}"))
}

fn features(collection: &Value) -> impl Iterator<Item = &Value> {
    collection
        .get("features")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn load_stops(path: &str) -> Result<Vec<Coordinate>> {
    let grid = load(path)?;
    Ok(features(&grid)
        .filter(|f| f.get("type").and_then(Value::as_str) == Some("Point"))
        .filter_map(|f| f.get("coordinates").and_then(coordinate))
        .collect())
}

fn load_students(path: &str) -> Result<Vec<Student>> {
    let students = load(path)?;
    Ok(features(&students)
        .filter_map(|f| f.pointer("/geometry/coordinates/0").and_then(coordinate))
        .enumerate()
        .map(|(id, position)| Student { id, position })
        .collect())
}

fn synthetic() -> (Vec<Coordinate>, Vec<Student>) {
    let stops = (0..40)
        .flat_map(|x| (0..40).map(move |y| (x as f64 * 0.01, y as f64 * 0.01)))
        .collect();
    let students = (0..20_000)
        .map(|id| Student {
            id,
            position: (rand::random::<f64>() * 0.4, rand::random::<f64>() * 0.4),
        })
        .collect();
    (stops, students)
}

fn nearest(stops: &[Coordinate], (lon, lat): Coordinate) -> Option<usize> {
    stops
        .iter()
        .enumerate()
        .map(|(index, (x, y))| (index, (x - lon).powi(2) + (y - lat).powi(2)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let workers = match args.next() {
        Some(arg) => arg
            .parse()
            .map_err(|_| EngineError::Config(format!("worker count must be a number, got {arg:?}")))?,
        None => 1,
    };
    let (stops, students) = match (args.next(), args.next()) {
        (Some(grid), Some(students)) => (load_stops(&grid)?, load_students(&students)?),
        _ => synthetic(),
    };
    if stops.is_empty() {
        return Err(EngineError::Config("no stops to assign students to".into()));
    }
    let stops_len = stops.len();
    let stops: Arc<[Coordinate]> = stops.into();

    let config = EngineConfig::from_env()?.with_workers(workers);
    println!("Starting.");
    let start = Instant::now();
    let tables = with_pool(&config, |pool| async move {
        let stage = MapStage::new(
            pool,
            move |student: &Student| -> TaskResult<Assignment> {
                let stop = nearest(&stops, student.position)
                    .ok_or_else(|| format!("no stop for student {}", student.id))?;
                Ok(Assignment::from([(student.id, stop)]))
            },
            combiner_fn(Assignment::new, |mut left: Assignment, right: Assignment| {
                left.extend(right);
                Ok(left)
            }),
        )
        .tap(|tables: &Vec<Assignment>, _ctx: &ExecutionContext| {
            for (partition, table) in tables.iter().enumerate() {
                println!("partition {partition}: {} students", table.len());
            }
        });
        stage.run(students.into(), &ExecutionContext::new()).await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    let assigned: usize = tables.iter().map(Assignment::len).sum();
    println!("Assigned {assigned} students to {stops_len} stops");
    Ok(())
}
