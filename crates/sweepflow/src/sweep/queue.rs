use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::model::{JobStatus, StopReason, SweepStats};
use super::policy::RetentionPolicy;
use super::source::JobQueue;
use crate::error::SweepResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSweepLimits {
    /// Number of `clean` calls per run. The queue never signals exhaustion,
    /// so this is the only stop condition.
    pub iterations: u32,
    pub max_count: u64,
}

impl Default for QueueSweepLimits {
    fn default() -> Self {
        Self {
            iterations: 10,
            max_count: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSweepReport {
    /// Job counts per status, taken before cleaning.
    pub census: Vec<(JobStatus, u64)>,
    /// Removed ids per `clean` call, in call order.
    pub removed_per_call: Vec<usize>,
    pub stats: SweepStats,
}

/// Fixed-iteration cleanup of completed queue jobs.
///
/// A run can leave eligible jobs behind when more than
/// `iterations * max_count` qualify; re-running the sweep picks them up.
#[derive(Clone)]
pub struct QueueSweep {
    queue: Arc<dyn JobQueue>,
    policy: RetentionPolicy,
    limits: QueueSweepLimits,
}

impl QueueSweep {
    pub fn new(queue: Arc<dyn JobQueue>, policy: RetentionPolicy, limits: QueueSweepLimits) -> Self {
        Self {
            queue,
            policy,
            limits,
        }
    }

    pub async fn census(&self) -> SweepResult<Vec<(JobStatus, u64)>> {
        let mut out = Vec::with_capacity(JobStatus::ALL.len());
        for status in JobStatus::ALL {
            let count = self.queue.count_by_status(status).await?;
            info!(queue = self.queue.name(), status = status.as_str(), count, "job count");
            out.push((status, count));
        }
        Ok(out)
    }

    pub async fn run(&self) -> SweepResult<QueueSweepReport> {
        let census = self.census().await?;

        // Frozen for the whole run.
        let cutoff = self.policy.cutoff_at(Utc::now());
        info!(queue = self.queue.name(), %cutoff, "cleaning completed jobs");

        let mut stats = SweepStats::new();
        let mut removed_per_call = Vec::with_capacity(self.limits.iterations as usize);

        // No early stop on an empty result.
        for _ in 0..self.limits.iterations {
            stats.iterations += 1;
            let removed = self
                .queue
                .clean(cutoff, self.limits.max_count)
                .await?;
            stats.total_scanned += removed.len() as u64;
            stats.total_deleted += removed.len() as u64;
            info!(
                queue = self.queue.name(),
                iteration = stats.iterations,
                deleted = removed.len(),
                "cleaned completed jobs"
            );
            removed_per_call.push(removed.len());
        }
        stats.stop = StopReason::IterationCap;

        info!(
            queue = self.queue.name(),
            total_deleted = stats.total_deleted,
            "queue sweep finished"
        );

        Ok(QueueSweepReport {
            census,
            removed_per_call,
            stats,
        })
    }
}
