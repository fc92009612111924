#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use sweepflow::sweep::{
    Batch, BatchSource, CacheMirror, Identifier, JobQueue, JobStatus, Keyspace, RecordStore,
    RetentionPolicy, ScanCursor, ScanPage,
};
use sweepflow::{SweepError, SweepResult};

// ----------------------------
// Tables
// ----------------------------

/// Table of id -> retention key, ordered the way a `ORDER BY key` query would be.
pub struct MemoryTable {
    name: String,
    rows: Mutex<BTreeMap<String, DateTime<Utc>>>,
    fail_deletes: AtomicBool,
    delete_batches: Mutex<Vec<usize>>,
    deleted_ids: Mutex<Vec<String>>,
}

impl MemoryTable {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rows: Mutex::new(BTreeMap::new()),
            fail_deletes: AtomicBool::new(false),
            delete_batches: Mutex::new(Vec::new()),
            deleted_ids: Mutex::new(Vec::new()),
        })
    }

    pub fn insert(&self, id: &str, at: DateTime<Utc>) {
        self.rows.lock().unwrap().insert(id.to_string(), at);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.lock().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Sizes of the id lists passed to each delete call.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }

    /// Every id actually removed, in removal order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted_ids.lock().unwrap().clone()
    }

    fn eligible(&self, cutoff: DateTime<Utc>, limit: usize) -> Vec<String> {
        let policy = RetentionPolicy::days(0);
        let rows = self.rows.lock().unwrap();
        let mut eligible: Vec<(&DateTime<Utc>, &String)> = rows
            .iter()
            .filter(|(_, at)| policy.is_eligible(**at, cutoff))
            .map(|(id, at)| (at, id))
            .collect();
        eligible.sort();
        eligible
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_ids(&self, ids: &[Identifier]) -> SweepResult<u64> {
        if ids.is_empty() {
            return Err(SweepError::EmptyBatch);
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SweepError::Store(format!("{}: connection reset", self.name)));
        }
        self.delete_batches.lock().unwrap().push(ids.len());

        let mut rows = self.rows.lock().unwrap();
        let mut removed = 0;
        for id in ids {
            if rows.remove(id).is_some() {
                removed += 1;
                self.deleted_ids.lock().unwrap().push(id.clone());
            }
        }
        Ok(removed)
    }
}

/// Origin reading eligible ids from a [`MemoryTable`] with a frozen cutoff.
pub struct MemorySource {
    table: Arc<MemoryTable>,
    cutoff: DateTime<Utc>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(table: Arc<MemoryTable>, cutoff: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            table,
            cutoff,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_batch(&self, limit: usize) -> SweepResult<Batch> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Batch::new(self.table.eligible(self.cutoff, limit)))
    }
}

/// Origin that keeps returning the same ids, as a replica lagging behind deletes would.
pub struct StuckSource {
    pub ids: Vec<String>,
}

#[async_trait]
impl BatchSource for StuckSource {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn fetch_batch(&self, _limit: usize) -> SweepResult<Batch> {
        Ok(Batch::new(self.ids.clone()))
    }
}

/// Origin that errors on every fetch.
pub struct BrokenSource;

#[async_trait]
impl BatchSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch_batch(&self, _limit: usize) -> SweepResult<Batch> {
        Err(SweepError::Store("timeout".to_string()))
    }
}

// ----------------------------
// Cache
// ----------------------------

/// Sorted key set. Scan cursors are offsets into the full key list, and a
/// page examines `page_size` keys, so pages can come back empty while the
/// cursor is still non-zero, like a real server-side scan.
pub struct MemoryCache {
    keys: Mutex<BTreeSet<String>>,
    fail_deletes: AtomicBool,
    delete_calls: AtomicUsize,
    scan_calls: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            keys: Mutex::new(BTreeSet::new()),
            fail_deletes: AtomicBool::new(false),
            delete_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheMirror for MemoryCache {
    async fn delete_keys(&self, keys: &[String]) -> SweepResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SweepError::Store("cache: broken pipe".to_string()));
        }
        let mut set = self.keys.lock().unwrap();
        Ok(keys.iter().filter(|k| set.remove(k.as_str())).count() as u64)
    }
}

#[async_trait]
impl Keyspace for MemoryCache {
    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        page_size: usize,
    ) -> SweepResult<ScanPage> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let offset: usize = cursor
            .as_str()
            .parse()
            .map_err(|_| SweepError::Store(format!("bad cursor {}", cursor.as_str())))?;

        let all: Vec<String> = self.keys.lock().unwrap().iter().cloned().collect();
        let end = (offset + page_size).min(all.len());
        let keys = all[offset.min(end)..end]
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let next = if end >= all.len() {
            ScanCursor::start()
        } else {
            ScanCursor::new(end.to_string())
        };
        Ok(ScanPage { keys, next })
    }

    async fn key_count(&self) -> SweepResult<u64> {
        Ok(self.len() as u64)
    }
}

// ----------------------------
// Queue
// ----------------------------

pub struct MemoryQueue {
    completed: Mutex<Vec<(String, DateTime<Utc>)>>,
    others: Mutex<BTreeMap<&'static str, u64>>,
    clean_calls: AtomicUsize,
    clean_pause: Mutex<std::time::Duration>,
    cutoffs: Mutex<Vec<DateTime<Utc>>>,
}

impl MemoryQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            completed: Mutex::new(Vec::new()),
            others: Mutex::new(BTreeMap::new()),
            clean_calls: AtomicUsize::new(0),
            clean_pause: Mutex::new(std::time::Duration::ZERO),
            cutoffs: Mutex::new(Vec::new()),
        })
    }

    /// Makes every `clean` call take at least `pause`, like a slow queue.
    pub fn set_clean_pause(&self, pause: std::time::Duration) {
        *self.clean_pause.lock().unwrap() = pause;
    }

    pub fn cutoffs(&self) -> Vec<DateTime<Utc>> {
        self.cutoffs.lock().unwrap().clone()
    }

    pub fn complete(&self, id: &str, finished_at: DateTime<Utc>) {
        self.completed
            .lock()
            .unwrap()
            .push((id.to_string(), finished_at));
    }

    pub fn set_count(&self, status: JobStatus, count: u64) {
        self.others.lock().unwrap().insert(status.as_str(), count);
    }

    pub fn completed_len(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn clean_calls(&self) -> usize {
        self.clean_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    fn name(&self) -> &str {
        "memory-queue"
    }

    async fn count_by_status(&self, status: JobStatus) -> SweepResult<u64> {
        if status == JobStatus::Completed {
            return Ok(self.completed_len() as u64);
        }
        Ok(*self
            .others
            .lock()
            .unwrap()
            .get(status.as_str())
            .unwrap_or(&0))
    }

    async fn clean(&self, cutoff: DateTime<Utc>, max_count: u64) -> SweepResult<Vec<Identifier>> {
        self.clean_calls.fetch_add(1, Ordering::SeqCst);
        self.cutoffs.lock().unwrap().push(cutoff);
        let pause = *self.clean_pause.lock().unwrap();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let mut completed = self.completed.lock().unwrap();
        completed.sort_by_key(|(_, at)| *at);

        let mut removed = Vec::new();
        completed.retain(|(id, at)| {
            if *at < cutoff && (removed.len() as u64) < max_count {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

// ----------------------------
// Seeding
// ----------------------------

/// Inserts `n` rows aged `age`, staggered by one second so ordering is total.
/// Each row also gets a history row and a cache entry under `category`.
pub fn seed(
    primary: &MemoryTable,
    history: &MemoryTable,
    cache: &MemoryCache,
    category: &str,
    prefix: &str,
    n: usize,
    age: Duration,
) -> Vec<String> {
    let base = Utc::now() - age;
    (0..n)
        .map(|i| {
            let id = format!("{prefix}-{i:05}");
            let at = base - Duration::seconds(i as i64);
            primary.insert(&id, at);
            history.insert(&id, at);
            cache.insert(&format!("{category}/{id}"));
            id
        })
        .collect()
}
