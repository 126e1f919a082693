use crate::*;
use core::time::Duration;
use keyforge::{KeyPool, PoolConfig, RangeCounter, decode};
use std::collections::HashSet;
use tempfile::TempDir;

async fn counter_in(dir: &TempDir, range_size: u32) -> SqliteRangeCounter {
    SqliteRangeCounter::open(
        dir.path().join("keys.db"),
        SqliteOptions::default().with_range_size(range_size),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn fresh_database_starts_at_zero() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;

    assert_eq!(counter.last_used().await.unwrap(), 0);
    assert_eq!(counter.range_size(), 100);
}

#[tokio::test]
async fn sequential_reservations_advance_by_range_size() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;

    let starts: Vec<u64> = [
        counter.reserve_range().await.unwrap(),
        counter.reserve_range().await.unwrap(),
        counter.reserve_range().await.unwrap(),
    ]
    .iter()
    .map(|range| {
        assert_eq!(range.size, 100);
        range.start
    })
    .collect();

    assert_eq!(starts, [0, 100, 200]);
    assert_eq!(counter.last_used().await.unwrap(), 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_are_disjoint() {
    const TASKS: usize = 16;
    const PER_TASK: usize = 5;

    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 10).await;

    let tasks: Vec<_> = (0..TASKS)
        .map(|_| {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut starts = Vec::with_capacity(PER_TASK);
                for _ in 0..PER_TASK {
                    starts.push(counter.reserve_range().await.unwrap().start);
                }
                starts
            })
        })
        .collect();

    let mut starts: Vec<u64> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .flat_map(|task| task.unwrap())
        .collect();
    starts.sort_unstable();

    let expected: Vec<u64> = (0..(TASKS * PER_TASK) as u64).map(|i| i * 10).collect();
    assert_eq!(starts, expected);
    assert_eq!(counter.last_used().await.unwrap(), (TASKS * PER_TASK * 10) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counters_sharing_a_file_never_overlap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.db");
    let options = SqliteOptions::default()
        .with_range_size(25)
        .with_busy_timeout(Duration::from_secs(10));
    let first = SqliteRangeCounter::open(&path, options.clone()).await.unwrap();
    let second = SqliteRangeCounter::open(&path, options).await.unwrap();

    let tasks: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .cycle()
        .take(8)
        .map(|counter| {
            tokio::spawn(async move {
                let mut ranges = Vec::new();
                for _ in 0..10 {
                    ranges.push(counter.reserve_range().await.unwrap());
                }
                ranges
            })
        })
        .collect();

    let mut ranges: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .flat_map(|task| task.unwrap())
        .collect();
    ranges.sort_unstable_by_key(|range| range.start);

    assert_eq!(ranges.len(), 80);
    for pair in ranges.windows(2) {
        assert!(pair[0].end() <= pair[1].start, "{pair:?} overlap");
    }
    assert_eq!(first.last_used().await.unwrap(), 80 * 25);
    assert_eq!(second.last_used().await.unwrap(), 80 * 25);
}

#[tokio::test]
async fn counter_survives_reopening() {
    let dir = TempDir::new().unwrap();

    let counter = counter_in(&dir, 100).await;
    counter.reserve_range().await.unwrap();
    counter.reserve_range().await.unwrap();
    counter.close().await;

    let reopened = counter_in(&dir, 100).await;
    assert_eq!(reopened.last_used().await.unwrap(), 200);
    assert_eq!(reopened.reserve_range().await.unwrap().start, 200);
}

#[tokio::test]
async fn range_size_can_change_between_runs() {
    let dir = TempDir::new().unwrap();

    let counter = counter_in(&dir, 100).await;
    counter.reserve_range().await.unwrap();
    counter.close().await;

    let wider = counter_in(&dir, 1_000).await;
    let range = wider.reserve_range().await.unwrap();
    assert_eq!((range.start, range.size), (100, 1_000));
    assert_eq!(wider.last_used().await.unwrap(), 1_100);
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;
    counter.reserve_range().await.unwrap();

    counter.migrate().await.unwrap();
    counter.migrate().await.unwrap();

    assert_eq!(counter.last_used().await.unwrap(), 100);
}

#[tokio::test]
async fn from_pool_shares_an_existing_pool() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;

    let narrow = SqliteRangeCounter::from_pool(counter.pool().clone(), 10).unwrap();
    assert_eq!(counter.reserve_range().await.unwrap().start, 0);
    assert_eq!(narrow.reserve_range().await.unwrap().start, 100);
    assert_eq!(counter.last_used().await.unwrap(), 110);

    assert!(matches!(
        SqliteRangeCounter::from_pool(counter.pool().clone(), 0),
        Err(Error::InvalidConfig { .. })
    ));
}

#[tokio::test]
async fn connect_rejects_invalid_options() {
    let dir = TempDir::new().unwrap();
    let result = SqliteRangeCounter::open(
        dir.path().join("keys.db"),
        SqliteOptions::default().with_range_size(0),
    )
    .await;

    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[tokio::test]
async fn connect_accepts_a_url() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("url.db").display());

    let counter = SqliteRangeCounter::connect(&url, SqliteOptions::default())
        .await
        .unwrap();

    assert_eq!(counter.reserve_range().await.unwrap().start, 0);
}

#[tokio::test]
async fn overflowing_reservation_leaves_the_row_untouched() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;
    let near_max = i64::MAX - 10;
    sqlx::query("UPDATE range_counters SET last_used = ?1 WHERE id = ?2")
        .bind(near_max)
        .bind(COUNTER_ID)
        .execute(counter.pool())
        .await
        .unwrap();

    let err = counter.reserve().await.unwrap_err();
    assert!(
        matches!(err, Error::CounterOverflow { last_used, range_size: 100 } if last_used == near_max as u64),
        "{err:?}"
    );
    assert_eq!(counter.last_used().await.unwrap(), near_max as u64);

    // Surfaces to the pool as a retryable reservation failure.
    let err = counter.reserve_range().await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
}

#[tokio::test]
async fn lock_timeout_rolls_back_and_consumes_nothing() {
    let dir = TempDir::new().unwrap();
    let holder = counter_in(&dir, 100).await;
    let waiter = SqliteRangeCounter::open(
        dir.path().join("keys.db"),
        SqliteOptions::default()
            .with_range_size(100)
            .with_busy_timeout(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    let mut tx = holder.pool().begin().await.unwrap();
    sqlx::query("UPDATE range_counters SET last_used = last_used WHERE id = ?1")
        .bind(COUNTER_ID)
        .execute(&mut *tx)
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let err = waiter.reserve_range().await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
    assert!(started.elapsed() < DEFAULT_BUSY_TIMEOUT, "{:?}", started.elapsed());

    tx.rollback().await.unwrap();

    assert_eq!(waiter.last_used().await.unwrap(), 0);
    assert_eq!(waiter.reserve_range().await.unwrap().start, 0);
    assert_eq!(holder.reserve_range().await.unwrap().start, 100);
}

#[tokio::test]
async fn missing_row_is_reported() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;
    sqlx::query("DELETE FROM range_counters")
        .execute(counter.pool())
        .await
        .unwrap();

    assert!(matches!(
        counter.reserve().await,
        Err(Error::MissingCounter { id: COUNTER_ID })
    ));
    assert!(matches!(
        counter.last_used().await,
        Err(Error::MissingCounter { .. })
    ));

    counter.migrate().await.unwrap();
    assert_eq!(counter.reserve().await.unwrap().start, 0);
}

#[tokio::test]
async fn negative_values_are_refused_by_the_schema() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;

    let result = sqlx::query("UPDATE range_counters SET last_used = -1 WHERE id = ?1")
        .bind(COUNTER_ID)
        .execute(counter.pool())
        .await;

    assert!(result.is_err());
    assert_eq!(counter.last_used().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_over_sqlite_issues_150_keys_from_two_ranges() {
    let dir = TempDir::new().unwrap();
    let counter = counter_in(&dir, 100).await;
    let config = PoolConfig::default().with_refill_interval(Duration::from_millis(10));
    let pool = KeyPool::new(counter, config).unwrap();
    let refiller = pool.start();

    let tasks: Vec<_> = (0..150)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get_timeout(Duration::from_secs(10)).await })
        })
        .collect();

    let mut keys = HashSet::new();
    for task in futures::future::join_all(tasks).await {
        let key = task.unwrap().unwrap();
        assert!(keys.insert(key));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    refiller.shutdown().await.unwrap();

    let counters: HashSet<u64> = keys.iter().map(|key| decode(key).unwrap()).collect();
    assert_eq!(counters, (0..150).collect::<HashSet<_>>());
    assert_eq!(pool.stats().reservations, 2);
    assert_eq!(pool.counter().last_used().await.unwrap(), 200);
}
