//! Capability interfaces the sweep engine drives. Each store adapter implements
//! the subset that makes sense for it; the engine never talks to a wire client
//! directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Batch, Identifier, JobStatus, ScanCursor, ScanPage};
use crate::error::SweepResult;

/// Paginated origin ordered by retention key.
///
/// Implementations must reflect deletions made between two calls, or skip
/// identifiers already returned, so that a run never sees the same id twice.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Human readable origin name for logs.
    fn name(&self) -> &str;

    /// Up to `limit` eligible identifiers, oldest first. Empty means exhausted.
    async fn fetch_batch(&self, limit: usize) -> SweepResult<Batch>;
}

/// A store holding records addressed by identifier (a table, a shadow table).
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn name(&self) -> &str;

    /// Hard-deletes `ids`. Absent ids are not an error. Returns the number removed.
    async fn delete_ids(&self, ids: &[Identifier]) -> SweepResult<u64>;
}

/// Key-value cache mirroring records under `<category>/<id>` keys.
#[async_trait]
pub trait CacheMirror: Send + Sync {
    /// Deletes all `keys` in a single multi-key call. Returns the number removed.
    async fn delete_keys(&self, keys: &[String]) -> SweepResult<u64>;
}

/// Read-only enumeration of a cache keyspace.
#[async_trait]
pub trait Keyspace: Send + Sync {
    /// One page of keys matching `prefix*`. A returned cursor equal to the
    /// sentinel means the iteration is complete.
    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        page_size: usize,
    ) -> SweepResult<ScanPage>;

    /// Total number of keys in the keyspace.
    async fn key_count(&self) -> SweepResult<u64>;
}

/// A job queue that can report per-status counts and drop finished jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn count_by_status(&self, status: JobStatus) -> SweepResult<u64>;

    /// Removes up to `max_count` completed jobs finished strictly before `cutoff`.
    /// The queue gives no exhaustion signal beyond an empty result.
    async fn clean(&self, cutoff: DateTime<Utc>, max_count: u64) -> SweepResult<Vec<Identifier>>;
}

/// Cache key of a record: `<category>/<id>`.
pub fn cache_key(category: &str, id: &str) -> String {
    format!("{category}/{id}")
}

/// Scan prefix of a category: `<category>/`.
pub fn category_prefix(category: &str) -> String {
    format!("{category}/")
}
