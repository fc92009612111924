//! The three sweeps as run by the binaries: open the stores a variant needs,
//! run it, and close the stores on every exit path.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::error::{SweepError, SweepResult};
use crate::stores::{BullQueue, Needs, PgRetentionSource, RetentionTable, Stores};
use crate::sweep::categories::RESOURCE_TYPES;
use crate::sweep::{
    CountsMapping, InventoryScanner, QueueSweep, QueueSweepLimits, QueueSweepReport,
    RetentionPolicy, SweepLimits, SweepLoop, SweepStats,
};

/// Purges `AuditEvent` rows older than the retention window, their history
/// rows and their `AuditEvent/<id>` cache entries.
pub async fn purge_audit_events(settings: &Settings) -> SweepResult<SweepStats> {
    let stores = Stores::open(settings, Needs::DATABASE_AND_CACHE).await?;
    let result = purge_with(&stores, settings, &RetentionTable::audit_events()).await;
    stores.close().await;
    result
}

async fn purge_with(
    stores: &Stores,
    settings: &Settings,
    table: &RetentionTable,
) -> SweepResult<SweepStats> {
    let (Some(pool), Some(cache)) = (&stores.pool, &stores.cache) else {
        return Err(SweepError::Store("purge needs both database and cache".to_string()));
    };
    let tuning = &settings.sweep;

    // Frozen for the whole run.
    let cutoff = RetentionPolicy::days(tuning.retention_days).cutoff_at(Utc::now());
    let source = PgRetentionSource::new(pool.clone(), table, cutoff)?;
    let deleter = source
        .deleter()
        .with_cache(Arc::new(cache.clone()), source.category());

    info!(
        table = %table.table,
        cutoff = %source.cutoff(),
        batch_size = tuning.batch_size,
        iterations = tuning.iterations,
        delay_ms = tuning.delay_ms,
        "starting purge"
    );

    let sweep = SweepLoop::new(
        Arc::new(source),
        deleter,
        SweepLimits {
            batch_size: tuning.batch_size,
            iteration_cap: tuning.iterations,
            delay: tuning.delay(),
        },
    );
    sweep.run().await
}

/// Reports per-status job counts, then cleans completed jobs a fixed number of times.
pub async fn clean_queue(settings: &Settings) -> SweepResult<QueueSweepReport> {
    let stores = Stores::open(settings, Needs::CACHE_ONLY).await?;
    let result = clean_with(&stores, settings).await;
    stores.close().await;
    result
}

async fn clean_with(stores: &Stores, settings: &Settings) -> SweepResult<QueueSweepReport> {
    let Some(cache) = &stores.cache else {
        return Err(SweepError::Store("queue clean needs the cache".to_string()));
    };
    let tuning = &settings.sweep;

    let queue = BullQueue::new(cache.clone(), &tuning.queue_prefix, &tuning.queue_name);
    let sweep = QueueSweep::new(
        Arc::new(queue),
        RetentionPolicy::millis(tuning.queue_max_age_ms),
        QueueSweepLimits {
            iterations: tuning.iterations,
            max_count: tuning.queue_batch_size,
        },
    );
    sweep.run().await
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    pub keyspace_size: u64,
    pub counts: CountsMapping,
}

/// Total keyspace size plus per-resource-type key counts.
pub async fn count_cache(settings: &Settings) -> SweepResult<InventoryReport> {
    let stores = Stores::open(settings, Needs::CACHE_ONLY).await?;
    let result = count_with(&stores, settings).await;
    stores.close().await;
    result
}

async fn count_with(stores: &Stores, settings: &Settings) -> SweepResult<InventoryReport> {
    let Some(cache) = &stores.cache else {
        return Err(SweepError::Store("inventory needs the cache".to_string()));
    };

    let scanner = InventoryScanner::new(Arc::new(cache.clone()), settings.sweep.scan_page_size);
    let keyspace_size = scanner.keyspace_size().await?;
    info!(keyspace_size, "cache size");

    let counts = scanner.scan(RESOURCE_TYPES).await?;
    Ok(InventoryReport {
        keyspace_size,
        counts,
    })
}
