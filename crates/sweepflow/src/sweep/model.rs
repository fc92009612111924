use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Opaque key of a record in an origin (a row id, a job id).
pub type Identifier = String;

/// One bounded page of identifiers, oldest retention key first.
/// An empty batch means the origin is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub ids: Vec<Identifier>,
}

impl Batch {
    pub fn new(ids: Vec<Identifier>) -> Self {
        Self { ids }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The origin returned an empty batch.
    SourceExhausted,
    /// The configured iteration cap was reached before the origin emptied.
    IterationCap,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::SourceExhausted => "source_exhausted",
            StopReason::IterationCap => "iteration_cap",
        }
    }
}

/// Counters for a single sweep run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub iterations: u32,
    pub total_scanned: u64,
    pub total_deleted: u64,
    pub stop: StopReason,
}

impl SweepStats {
    pub(crate) fn new() -> Self {
        Self {
            iterations: 0,
            total_scanned: 0,
            total_deleted: 0,
            stop: StopReason::IterationCap,
        }
    }
}

// ----------------------------
// Cross-store deletion
// ----------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Delete call succeeded; the store reported this many removals.
    Deleted(u64),
    /// No store of this kind is configured, or the call was not needed.
    Skipped,
    Failed(String),
}

impl StoreStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StoreStatus::Failed(_))
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreStatus::Deleted(n) => write!(f, "deleted={n}"),
            StoreStatus::Skipped => f.write_str("skipped"),
            StoreStatus::Failed(e) => write!(f, "failed({e})"),
        }
    }
}

/// Per-store result of one `CrossStoreDeleter::delete_all` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub requested: usize,
    pub primary: StoreStatus,
    pub secondary: StoreStatus,
    pub cache: StoreStatus,
}

impl DeletionOutcome {
    /// True when no configured store failed.
    pub fn is_complete(&self) -> bool {
        !(self.primary.is_failed() || self.secondary.is_failed() || self.cache.is_failed())
    }

    /// Rows removed from the primary store.
    pub fn primary_deleted(&self) -> u64 {
        match self.primary {
            StoreStatus::Deleted(n) => n,
            _ => 0,
        }
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requested={} primary={} secondary={} cache={}",
            self.requested, self.primary, self.secondary, self.cache
        )
    }
}

// ----------------------------
// Keyspace scan
// ----------------------------

/// Server-issued iteration token for a keyspace scan. `"0"` both starts and ends an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor(String);

impl ScanCursor {
    pub const SENTINEL: &'static str = "0";

    pub fn start() -> Self {
        Self(Self::SENTINEL.to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_done(&self) -> bool {
        self.0 == Self::SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub next: ScanCursor,
}

/// Category name to key count, in category enumeration order.
/// Categories with no keys are never recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountsMapping {
    entries: Vec<(String, u64)>,
}

impl CountsMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` for `category` unless it is zero.
    pub fn record(&mut self, category: &str, count: u64) {
        if count > 0 {
            self.entries.push((category.to_string(), count));
        }
    }

    pub fn get(&self, category: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, n)| *n)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(c, n)| (c.as_str(), *n))
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }
}

impl Serialize for CountsMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, count) in &self.entries {
            map.serialize_entry(category, count)?;
        }
        map.end()
    }
}

// ----------------------------
// Queue
// ----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed,
    Delayed,
    Active,
    Waiting,
}

impl JobStatus {
    /// Reporting order of the queue census.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Delayed,
        JobStatus::Active,
        JobStatus::Waiting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Delayed => "delayed",
            JobStatus::Active => "active",
            JobStatus::Waiting => "waiting",
        }
    }
}
