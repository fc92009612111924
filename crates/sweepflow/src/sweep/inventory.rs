use std::sync::Arc;

use tracing::{debug, info};

use super::model::{CountsMapping, ScanCursor};
use super::source::{category_prefix, Keyspace};
use crate::error::SweepResult;

/// Counts cache keys per category by paging a keyspace scan.
///
/// Counts are approximate: keys written or evicted while the scan runs may or
/// may not be seen. Fine for inventory reports, not for deletion accounting.
#[derive(Clone)]
pub struct InventoryScanner {
    keyspace: Arc<dyn Keyspace>,
    page_size: usize,
}

impl InventoryScanner {
    pub fn new(keyspace: Arc<dyn Keyspace>, page_size: usize) -> Self {
        Self {
            keyspace,
            page_size,
        }
    }

    /// Keys under `<category>/`, summed across all scan pages.
    pub async fn count(&self, category: &str) -> SweepResult<u64> {
        let prefix = category_prefix(category);
        let mut cursor = ScanCursor::start();
        let mut count = 0u64;
        let mut pages = 0u32;

        loop {
            let page = self
                .keyspace
                .scan_prefix(&prefix, &cursor, self.page_size)
                .await?;
            count += page.keys.len() as u64;
            pages += 1;
            cursor = page.next;
            if cursor.is_done() {
                break;
            }
        }

        debug!(category, pages, count, "counted category");
        Ok(count)
    }

    /// Counts every category in order. Categories with no keys are left out.
    pub async fn scan<S: AsRef<str>>(&self, categories: &[S]) -> SweepResult<CountsMapping> {
        let mut counts = CountsMapping::new();
        for category in categories {
            let category = category.as_ref();
            debug!(category, "counting");
            let count = self.count(category).await?;
            info!(category, count, "count");
            counts.record(category, count);
        }
        Ok(counts)
    }

    pub async fn keyspace_size(&self) -> SweepResult<u64> {
        self.keyspace.key_count().await
    }
}
