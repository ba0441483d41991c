//! Example: inverted index over a JSON corpus.
//!
//! Reads an array of `{"id": .., "text": ..}` articles, maps every article
//! to `word -> {id}`, and merges the partial indexes by key-wise set union.
//!
//! Run with: `cargo run --release --example text_index -- 4 nyt.json index.json`

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use parallel_mapreduce::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Deserialize)]
struct Article {
    id: u64,
    text: String,
}

type Index = BTreeMap<String, BTreeSet<u64>>;

fn index(article: &Article) -> Index {
    article
        .text
        .split(' ')
        .map(|word| (word.to_string(), BTreeSet::from([article.id])))
        .collect()
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
    let corpus = args.next().unwrap_or_else(|| "nyt.json".to_string());
    let output = args.next().unwrap_or_else(|| "index.json".to_string());

    let raw = std::fs::read_to_string(&corpus)
        .map_err(|e| EngineError::Context(format!("reading {corpus}: {e}")))?;
    let articles: Vec<Article> = serde_json::from_str(&raw).with_context(format!("parsing {corpus}"))?;

    let config = EngineConfig::from_env()?.with_workers(workers);
    println!("Starting.");
    let start = Instant::now();
    let inverted = with_pool(&config, |pool| async move {
        run_map_reduce(&pool, infallible(index), MonoidCombiner::<Index>::new(), articles).await
    })
    .await?;
    println!("Finished in {} seconds.", start.elapsed().as_secs_f64());

    std::fs::write(&output, serde_json::to_string_pretty(&inverted)?)
        .map_err(|e| EngineError::Context(format!("writing {output}: {e}")))?;
    println!("Indexed {} words into {output}", inverted.len());
    Ok(())
}
