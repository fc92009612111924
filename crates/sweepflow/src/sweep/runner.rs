use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::deleter::CrossStoreDeleter;
use super::model::{Batch, Identifier, StopReason, SweepStats};
use super::source::BatchSource;
use crate::error::{SweepError, SweepResult};

/// Bounds of a single sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepLimits {
    pub batch_size: usize,
    pub iteration_cap: u32,
    /// Pause between a delete and the next fetch.
    pub delay: Duration,
}

impl Default for SweepLimits {
    fn default() -> Self {
        Self {
            batch_size: 100,
            iteration_cap: 10,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
enum SweepState {
    Fetching,
    Deleting(Batch),
    Sleeping,
    Exhausted,
}

/// Drives fetch -> delete -> sleep until the origin is empty or the
/// iteration cap is hit. Any store error aborts the run.
#[derive(Clone)]
pub struct SweepLoop {
    source: Arc<dyn BatchSource>,
    deleter: CrossStoreDeleter,
    limits: SweepLimits,
}

impl SweepLoop {
    pub fn new(source: Arc<dyn BatchSource>, deleter: CrossStoreDeleter, limits: SweepLimits) -> Self {
        Self {
            source,
            deleter,
            limits,
        }
    }

    pub async fn run(&self) -> SweepResult<SweepStats> {
        let mut stats = SweepStats::new();
        match self.drive(&mut stats).await {
            Ok(()) => {
                info!(
                    origin = self.source.name(),
                    iterations = stats.iterations,
                    total_deleted = stats.total_deleted,
                    stop = stats.stop.as_str(),
                    "sweep finished"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(
                    origin = self.source.name(),
                    iterations = stats.iterations,
                    total_deleted = stats.total_deleted,
                    error = %e,
                    "sweep failed"
                );
                Err(e)
            }
        }
    }

    async fn drive(&self, stats: &mut SweepStats) -> SweepResult<()> {
        let mut deleted: HashSet<Identifier> = HashSet::new();
        let mut state = SweepState::Fetching;

        loop {
            debug!(?state, iteration = stats.iterations, "sweep state");
            state = match state {
                SweepState::Fetching => {
                    if stats.iterations >= self.limits.iteration_cap {
                        stats.stop = StopReason::IterationCap;
                        SweepState::Exhausted
                    } else {
                        stats.iterations += 1;
                        let batch = self.source.fetch_batch(self.limits.batch_size).await?;
                        stats.total_scanned += batch.len() as u64;
                        if batch.is_empty() {
                            info!(iteration = stats.iterations, "no eligible records left");
                            stats.stop = StopReason::SourceExhausted;
                            SweepState::Exhausted
                        } else {
                            SweepState::Deleting(batch)
                        }
                    }
                }
                SweepState::Deleting(batch) => {
                    if let Some(id) = batch.ids.iter().find(|id| deleted.contains(*id)) {
                        return Err(SweepError::RevisitedIdentifier(id.clone()));
                    }

                    let outcome = self.deleter.delete_all_or_fail(&batch.ids).await?;
                    stats.total_deleted += outcome.primary_deleted();
                    info!(
                        iteration = stats.iterations,
                        batch = batch.len(),
                        %outcome,
                        total_deleted = stats.total_deleted,
                        "deleted batch"
                    );
                    deleted.extend(batch.ids);
                    SweepState::Sleeping
                }
                SweepState::Sleeping => {
                    if stats.iterations >= self.limits.iteration_cap {
                        stats.stop = StopReason::IterationCap;
                        SweepState::Exhausted
                    } else {
                        if !self.limits.delay.is_zero() {
                            tokio::time::sleep(self.limits.delay).await;
                        }
                        SweepState::Fetching
                    }
                }
                SweepState::Exhausted => return Ok(()),
            };
        }
    }
}
