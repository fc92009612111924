use std::sync::Arc;

use tracing::{error, warn};

use super::model::{DeletionOutcome, Identifier, StoreStatus};
use super::source::{cache_key, CacheMirror, RecordStore};
use crate::error::{SweepError, SweepResult};

/// Cache half of a cross-store deletion: the mirror plus the category its keys live under.
#[derive(Clone)]
pub struct CacheTarget {
    pub cache: Arc<dyn CacheMirror>,
    pub category: String,
}

/// Removes the same identifiers from the primary store, an optional
/// secondary (history) store and an optional cache mirror, in that order.
///
/// The primary goes first: a crash after it leaves at worst a stale cache
/// entry for a record that no longer exists, never a cache miss for a record
/// that still does.
#[derive(Clone)]
pub struct CrossStoreDeleter {
    primary: Arc<dyn RecordStore>,
    secondary: Option<Arc<dyn RecordStore>>,
    cache: Option<CacheTarget>,
}

impl CrossStoreDeleter {
    pub fn new(primary: Arc<dyn RecordStore>) -> Self {
        Self {
            primary,
            secondary: None,
            cache: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn RecordStore>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheMirror>, category: impl Into<String>) -> Self {
        self.cache = Some(CacheTarget {
            cache,
            category: category.into(),
        });
        self
    }

    /// Deletes `ids` everywhere.
    ///
    /// A primary failure is returned as an error (nothing was removed anywhere).
    /// Once the primary succeeded, the secondary and the cache are both
    /// attempted even if one of them fails; their failures are recorded in the
    /// returned outcome rather than returned as errors. Callers decide whether
    /// an incomplete outcome is fatal.
    pub async fn delete_all(&self, ids: &[Identifier]) -> SweepResult<DeletionOutcome> {
        if ids.is_empty() {
            return Ok(DeletionOutcome {
                requested: 0,
                primary: StoreStatus::Skipped,
                secondary: StoreStatus::Skipped,
                cache: StoreStatus::Skipped,
            });
        }

        let primary = self.primary.delete_ids(ids).await.map_err(|e| {
            error!(store = self.primary.name(), error = %e, "primary delete failed");
            e
        })?;

        let secondary = match &self.secondary {
            Some(store) => match store.delete_ids(ids).await {
                Ok(n) => StoreStatus::Deleted(n),
                Err(e) => {
                    warn!(store = store.name(), error = %e, "secondary delete failed");
                    StoreStatus::Failed(e.to_string())
                }
            },
            None => StoreStatus::Skipped,
        };

        // Always attempted, even when the keys were never cached.
        let cache = match &self.cache {
            Some(target) => {
                let keys: Vec<String> = ids
                    .iter()
                    .map(|id| cache_key(&target.category, id))
                    .collect();
                match target.cache.delete_keys(&keys).await {
                    Ok(n) => StoreStatus::Deleted(n),
                    Err(e) => {
                        warn!(category = %target.category, error = %e, "cache delete failed");
                        StoreStatus::Failed(e.to_string())
                    }
                }
            }
            None => StoreStatus::Skipped,
        };

        Ok(DeletionOutcome {
            requested: ids.len(),
            primary: StoreStatus::Deleted(primary),
            secondary,
            cache,
        })
    }

    /// Like [`delete_all`](Self::delete_all) but turns an incomplete outcome
    /// into [`SweepError::PartialDeletion`].
    pub async fn delete_all_or_fail(&self, ids: &[Identifier]) -> SweepResult<DeletionOutcome> {
        let outcome = self.delete_all(ids).await?;
        if !outcome.is_complete() {
            error!(%outcome, "partial cross-store deletion; aborting run");
            return Err(SweepError::PartialDeletion(outcome));
        }
        Ok(outcome)
    }
}
