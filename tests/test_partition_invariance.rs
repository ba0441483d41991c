use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parallel_mapreduce::prelude::*;
use proptest::prelude::*;

async fn sum_of_squares(workers: usize, input: Vec<i64>) -> i64 {
    let pool = Arc::new(WorkerPool::new(workers).unwrap());
    let total = run_map_reduce(
        &pool,
        infallible(|x: &i64| x * x),
        combiner_fn(|| 0i64, |a, b| Ok(a + b)),
        input,
    )
    .await
    .unwrap();
    pool.shutdown().await.unwrap();
    total
}

#[tokio::test]
async fn same_aggregate_for_one_two_and_five_workers() {
    let input: Vec<i64> = (-50..=73).collect();
    let expected: i64 = input.iter().map(|x| x * x).sum();

    for workers in [1, 2, 5] {
        assert_eq!(sum_of_squares(workers, input.clone()).await, expected, "workers = {workers}");
    }
}

#[tokio::test]
async fn fewer_items_than_workers() {
    assert_eq!(sum_of_squares(5, vec![3, 4]).await, 25);
}

#[tokio::test]
async fn empty_input_yields_identity_for_every_pool_size() {
    for workers in [1, 2, 5] {
        let pool = Arc::new(WorkerPool::new(workers).unwrap());
        let counts = run_map_reduce(
            &pool,
            infallible(|word: &String| BTreeMap::from([(word.clone(), BTreeSet::from([0u8]))])),
            MonoidCombiner::<BTreeMap<String, BTreeSet<u8>>>::new(),
            Vec::<String>::new(),
        )
        .await
        .unwrap();
        assert!(counts.is_empty());
        pool.shutdown().await.unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn word_sets_do_not_depend_on_partitioning(
        words in proptest::collection::vec("[a-d]{1,3}", 0..60),
        workers in 1usize..6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (single, many) = runtime.block_on(async {
            let run = |n: usize, words: Vec<String>| async move {
                let pool = Arc::new(WorkerPool::new(n).unwrap());
                let set = run_map_reduce(
                    &pool,
                    infallible(|w: &String| BTreeSet::from([w.clone()])),
                    MonoidCombiner::<BTreeSet<String>>::new(),
                    words,
                )
                .await
                .unwrap();
                pool.shutdown().await.unwrap();
                set
            };
            (run(1, words.clone()).await, run(workers, words.clone()).await)
        });

        let expected: BTreeSet<String> = words.into_iter().collect();
        prop_assert_eq!(&single, &expected);
        prop_assert_eq!(&many, &expected);
    }
}
