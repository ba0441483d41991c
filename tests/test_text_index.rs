use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parallel_mapreduce::prelude::*;
use serde_json::json;

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

async fn build(workers: usize, articles: Vec<Article>) -> Index {
    let pool = Arc::new(WorkerPool::new(workers).unwrap());
    let built = run_map_reduce(&pool, infallible(index), MonoidCombiner::<Index>::new(), articles)
        .await
        .unwrap();
    pool.shutdown().await.unwrap();
    built
}

#[tokio::test]
async fn set_union_index_over_two_documents() {
    let articles = vec![
        Article { id: 1, text: "a".into() },
        Article { id: 2, text: "a b".into() },
    ];

    let built = build(2, articles).await;

    assert_eq!(built.len(), 2);
    assert_eq!(built["a"], BTreeSet::from([1, 2]));
    assert_eq!(built["b"], BTreeSet::from([2]));
}

#[tokio::test]
async fn index_from_json_corpus_serializes_back_to_json() {
    let corpus = json!([
        { "id": 7, "text": "the quick fox" },
        { "id": 8, "text": "the lazy dog" },
        { "id": 9, "text": "quick quick dog" },
    ]);
    let articles: Vec<Article> = serde_json::from_value(corpus).unwrap();

    let built = build(3, articles).await;
    let rendered = serde_json::to_value(&built).unwrap();

    assert_eq!(rendered["the"], json!([7, 8]));
    assert_eq!(rendered["quick"], json!([7, 9]));
    assert_eq!(rendered["dog"], json!([8, 9]));
    assert_eq!(rendered["fox"], json!([7]));
}

#[tokio::test]
async fn hash_based_index_matches_ordered_one() {
    let texts = ["x y", "y z", "z x w", "w"];
    let articles: Vec<Article> = texts
        .iter()
        .enumerate()
        .map(|(id, text)| Article { id: id as u64, text: text.to_string() })
        .collect();

    let pool = Arc::new(WorkerPool::new(3).unwrap());
    let hashed = run_map_reduce(
        &pool,
        infallible(|a: &Article| {
            a.text
                .split(' ')
                .map(|w| (w.to_string(), HashSet::from([a.id])))
                .collect::<HashMap<_, _>>()
        }),
        MonoidCombiner::<HashMap<String, HashSet<u64>>>::new(),
        articles,
    )
    .await
    .unwrap();
    pool.shutdown().await.unwrap();

    assert_eq!(hashed.len(), 4);
    assert_eq!(hashed["x"], HashSet::from([0, 2]));
    assert_eq!(hashed["w"], HashSet::from([2, 3]));
}
