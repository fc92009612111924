use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Utc};

mod common;
use common::{seed, BrokenSource, MemoryCache, MemorySource, MemoryTable, StuckSource};

use sweepflow::sweep::{
    CrossStoreDeleter, RetentionPolicy, StopReason, StoreStatus, SweepLimits, SweepLoop,
};
use sweepflow::SweepError;

struct Fixture {
    primary: Arc<MemoryTable>,
    history: Arc<MemoryTable>,
    cache: Arc<MemoryCache>,
    source: Arc<MemorySource>,
}

impl Fixture {
    fn new() -> Self {
        let primary = MemoryTable::new("AuditEvent");
        let history = MemoryTable::new("AuditEvent_History");
        let cache = MemoryCache::new();
        let cutoff = RetentionPolicy::days(30).cutoff_at(Utc::now());
        let source = MemorySource::new(primary.clone(), cutoff);
        Self {
            primary,
            history,
            cache,
            source,
        }
    }

    fn seed_old(&self, prefix: &str, n: usize) -> Vec<String> {
        seed(
            &self.primary,
            &self.history,
            &self.cache,
            "AuditEvent",
            prefix,
            n,
            Duration::days(45),
        )
    }

    fn sweep(&self, batch_size: usize, iteration_cap: u32) -> SweepLoop {
        self.sweep_with_delay(batch_size, iteration_cap, StdDuration::ZERO)
    }

    fn sweep_with_delay(
        &self,
        batch_size: usize,
        iteration_cap: u32,
        delay: StdDuration,
    ) -> SweepLoop {
        let deleter = CrossStoreDeleter::new(self.primary.clone())
            .with_secondary(self.history.clone())
            .with_cache(self.cache.clone(), "AuditEvent");
        SweepLoop::new(
            self.source.clone(),
            deleter,
            SweepLimits {
                batch_size,
                iteration_cap,
                delay,
            },
        )
    }
}

#[tokio::test]
async fn deletes_250_records_in_three_batches_then_stops_on_empty() {
    let fx = Fixture::new();
    fx.seed_old("ae", 250);

    let stats = fx.sweep(100, 10).run().await.unwrap();

    assert_eq!(stats.total_deleted, 250);
    assert_eq!(stats.iterations, 4, "3 delete iterations + 1 empty fetch");
    assert_eq!(stats.stop, StopReason::SourceExhausted);
    assert_eq!(fx.primary.delete_batches(), vec![100, 100, 50]);
    assert_eq!(fx.history.delete_batches(), vec![100, 100, 50]);
    assert_eq!(fx.primary.len(), 0);
    assert_eq!(fx.history.len(), 0);
    assert_eq!(fx.cache.len(), 0);
    assert_eq!(fx.source.fetches(), 4);
}

#[tokio::test]
async fn single_batch_drains_small_origin() {
    let fx = Fixture::new();
    fx.seed_old("ae", 7);

    let stats = fx.sweep(100, 1).run().await.unwrap();

    assert_eq!(stats.total_deleted, 7);
    assert_eq!(fx.primary.len(), 0);

    // The next run sees nothing.
    let again = fx.sweep(100, 1).run().await.unwrap();
    assert_eq!(again.total_deleted, 0);
    assert_eq!(again.stop, StopReason::SourceExhausted);
}

#[tokio::test]
async fn stops_at_iteration_cap_with_records_left() {
    let fx = Fixture::new();
    fx.seed_old("ae", 500);

    let stats = fx.sweep(100, 3).run().await.unwrap();

    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.total_deleted, 300);
    assert_eq!(stats.stop, StopReason::IterationCap);
    assert_eq!(fx.primary.len(), 200);
    assert_eq!(fx.source.fetches(), 3, "no fetch after the cap");
}

#[tokio::test]
async fn deletes_each_record_once_oldest_first() {
    let fx = Fixture::new();
    let ids = fx.seed_old("ae", 95);

    let stats = fx.sweep(10, 20).run().await.unwrap();
    assert_eq!(stats.total_deleted, 95);
    assert_eq!(stats.iterations, 11);

    let deleted = fx.primary.deleted_ids();
    let unique: HashSet<&String> = deleted.iter().collect();
    assert_eq!(deleted.len(), 95);
    assert_eq!(unique.len(), 95);

    // Seeded ids get older as the index grows.
    let mut oldest_first = ids.clone();
    oldest_first.reverse();
    assert_eq!(deleted, oldest_first);
}

#[tokio::test]
async fn leaves_records_inside_retention_window() {
    let fx = Fixture::new();
    fx.seed_old("old", 30);
    for i in 0..5 {
        fx.primary
            .insert(&format!("fresh-{i}"), Utc::now() - Duration::days(2));
    }

    let stats = fx.sweep(100, 10).run().await.unwrap();

    assert_eq!(stats.total_deleted, 30);
    assert_eq!(fx.primary.len(), 5);
    assert!(fx.primary.contains("fresh-0"));
}

#[tokio::test]
async fn revisited_identifier_aborts_run() {
    let primary = MemoryTable::new("AuditEvent");
    let source = Arc::new(StuckSource {
        ids: vec!["a".to_string(), "b".to_string()],
    });
    let sweep = SweepLoop::new(
        source,
        CrossStoreDeleter::new(primary),
        SweepLimits {
            batch_size: 10,
            iteration_cap: 10,
            delay: StdDuration::ZERO,
        },
    );

    let err = sweep.run().await.unwrap_err();
    assert!(matches!(err, SweepError::RevisitedIdentifier(ref id) if id == "a"));
}

#[tokio::test]
async fn fetch_error_propagates() {
    let sweep = SweepLoop::new(
        Arc::new(BrokenSource),
        CrossStoreDeleter::new(MemoryTable::new("AuditEvent")),
        SweepLimits::default(),
    );

    let err = sweep.run().await.unwrap_err();
    assert!(matches!(err, SweepError::Store(_)));
}

#[tokio::test]
async fn history_failure_is_fatal_but_cache_is_still_cleared() {
    let fx = Fixture::new();
    fx.seed_old("ae", 30);
    fx.history.set_fail_deletes(true);

    let err = fx.sweep(10, 10).run().await.unwrap_err();

    let SweepError::PartialDeletion(outcome) = err else {
        panic!("expected partial deletion, got {err:?}");
    };
    assert_eq!(outcome.primary, StoreStatus::Deleted(10));
    assert!(outcome.secondary.is_failed());
    assert_eq!(outcome.cache, StoreStatus::Deleted(10));

    // Aborted after the first batch.
    assert_eq!(fx.primary.len(), 20);
    assert_eq!(fx.cache.len(), 20);
}

#[tokio::test]
async fn primary_failure_touches_nothing_else() {
    let fx = Fixture::new();
    fx.seed_old("ae", 5);
    fx.primary.set_fail_deletes(true);

    let err = fx.sweep(10, 10).run().await.unwrap_err();

    assert!(matches!(err, SweepError::Store(_)));
    assert_eq!(fx.history.len(), 5);
    assert_eq!(fx.cache.delete_calls(), 0);
}

#[tokio::test]
async fn sleeps_between_batches_but_not_after_the_last() {
    let fx = Fixture::new();
    fx.seed_old("ae", 30);

    let started = Instant::now();
    let stats = fx
        .sweep_with_delay(10, 3, StdDuration::from_millis(20))
        .run()
        .await
        .unwrap();

    assert_eq!(stats.total_deleted, 30);
    assert_eq!(stats.stop, StopReason::IterationCap);
    // Two pauses: after batch 1 and batch 2.
    assert!(started.elapsed() >= StdDuration::from_millis(40));
}

#[tokio::test]
async fn zero_cap_runs_nothing() {
    let fx = Fixture::new();
    fx.seed_old("ae", 3);

    let stats = fx.sweep(10, 0).run().await.unwrap();

    assert_eq!(stats.iterations, 0);
    assert_eq!(stats.stop, StopReason::IterationCap);
    assert_eq!(fx.source.fetches(), 0);
    assert_eq!(fx.primary.len(), 3);
}
