use std::sync::Arc;

use parallel_mapreduce::prelude::*;
use parallel_mapreduce::Stage;

fn failing_at(k: u32) -> impl Fn(&u32) -> TaskResult<u64> + Send + Sync + 'static {
    move |x: &u32| {
        if *x == k {
            Err(format!("item {k} is poisoned").into())
        } else {
            Ok(u64::from(*x))
        }
    }
}

#[tokio::test]
async fn mapper_failure_references_failing_item() {
    for workers in [1, 2, 5] {
        let pool = Arc::new(WorkerPool::new(workers).unwrap());
        let input: Vec<u32> = (0..40).collect();

        let err = run_map_reduce(
            &pool,
            failing_at(17),
            combiner_fn(|| 0u64, |a, b| Ok(a + b)),
            input,
        )
        .await
        .unwrap_err();

        assert!(err.is_worker_failure());
        assert_eq!(err.stage(), Some(Stage::Map));
        assert_eq!(err.failed_item(), Some(17), "workers = {workers}");
        assert!(err.to_string().contains("poisoned"));
        pool.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn lowest_failing_partition_is_reported() {
    let pool = Arc::new(WorkerPool::new(4).unwrap());
    let mapper = |x: &u32| -> TaskResult<u64> {
        if x % 10 == 9 {
            Err("nine".into())
        } else {
            Ok(1)
        }
    };

    let input: Vec<u32> = (0..40).collect();
    let err = run_map_reduce(&pool, mapper, combiner_fn(|| 0u64, |a, b| Ok(a + b)), input)
        .await
        .unwrap_err();

    // partitions of ten: every one fails, partition 0 at item 9
    assert_eq!(err.failed_index(), Some(0));
    assert_eq!(err.failed_item(), Some(9));
    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn panicking_mapper_is_a_worker_failure_and_pool_survives() {
    let pool = Arc::new(WorkerPool::new(2).unwrap());

    let err = run_map_reduce(
        &pool,
        infallible(|x: &u32| {
            if *x == 3 {
                panic!("mapper exploded");
            }
            u64::from(*x)
        }),
        combiner_fn(|| 0u64, |a, b| Ok(a + b)),
        vec![1u32, 2, 3, 4],
    )
    .await
    .unwrap_err();
    assert!(err.is_worker_failure());
    assert!(err.to_string().contains("mapper exploded"));

    let total = run_map_reduce(
        &pool,
        infallible(|x: &u32| u64::from(*x)),
        combiner_fn(|| 0u64, |a, b| Ok(a + b)),
        vec![1u32, 2, 3, 4],
    )
    .await
    .unwrap();
    assert_eq!(total, 10);
    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn scoped_pool_returns_the_body_error() {
    let config = EngineConfig::default().with_workers(3);

    let result: Result<u64> = with_pool(&config, |pool| async move {
        run_map_reduce(
            &pool,
            failing_at(2),
            combiner_fn(|| 0u64, |a, b| Ok(a + b)),
            vec![0u32, 1, 2, 3],
        )
        .await
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.is_worker_failure());
    assert_eq!(err.failed_item(), Some(2));
}

#[tokio::test]
async fn run_after_shutdown_fails_with_pool_closed() {
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    pool.shutdown().await.unwrap();
    pool.shutdown().await.unwrap();

    let err = run_map_reduce(
        &pool,
        infallible(|x: &u32| u64::from(*x)),
        combiner_fn(|| 0u64, |a, b| Ok(a + b)),
        vec![1u32],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::PoolClosed));
}

#[test]
fn zero_workers_is_a_partition_error() {
    assert!(matches!(
        WorkerPool::new(0),
        Err(EngineError::InvalidPartitionCount { count: 0, .. })
    ));
}
