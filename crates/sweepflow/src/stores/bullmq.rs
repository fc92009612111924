use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::redis::RedisCache;
use crate::error::SweepResult;
use crate::sweep::model::{Identifier, JobStatus};
use crate::sweep::source::JobQueue;

/// Lua script removing finished jobs from a state set.
/// Returns the removed job ids.
///
/// KEYS[1] = state sorted set (score = finish timestamp in ms)
/// ARGV[1] = job key prefix ("bull:<queue>:")
/// ARGV[2] = max score (exclusive bound, e.g. "(1700000000000")
/// ARGV[3] = max jobs to remove (<= 0 means no limit)
const CLEAN_SCRIPT: &str = r#"
local set_key = KEYS[1]
local prefix = ARGV[1]
local max_score = ARGV[2]
local limit = tonumber(ARGV[3])

local ids
if limit > 0 then
    ids = redis.call('ZRANGEBYSCORE', set_key, '-inf', max_score, 'LIMIT', 0, limit)
else
    ids = redis.call('ZRANGEBYSCORE', set_key, '-inf', max_score)
end

for _, id in ipairs(ids) do
    local job_key = prefix .. id
    redis.call('DEL', job_key, job_key .. ':logs', job_key .. ':dependencies', job_key .. ':processed')
    redis.call('ZREM', set_key, id)
end

return ids
"#;

/// Queue stored with the BullMQ key layout: `<prefix>:<queue>:<state>` for
/// state collections and `<prefix>:<queue>:<id>` for job hashes.
pub struct BullQueue {
    cache: RedisCache,
    name: String,
    key_prefix: String,
    clean_script: redis::Script,
}

impl BullQueue {
    pub fn new(cache: RedisCache, prefix: &str, name: &str) -> Self {
        Self {
            cache,
            name: name.to_string(),
            key_prefix: format!("{prefix}:{name}:"),
            clean_script: redis::Script::new(CLEAN_SCRIPT),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.key_prefix, suffix)
    }
}

/// Where a status lives: lists for in-flight states, sorted sets for the rest.
/// Waiting jobs of a paused queue sit in `paused` and still count as waiting.
fn status_keys(status: JobStatus) -> &'static [&'static str] {
    match status {
        JobStatus::Completed => &["completed"],
        JobStatus::Failed => &["failed"],
        JobStatus::Delayed => &["delayed"],
        JobStatus::Active => &["active"],
        JobStatus::Waiting => &["wait", "paused"],
    }
}

fn is_list(status: JobStatus) -> bool {
    matches!(status, JobStatus::Active | JobStatus::Waiting)
}

#[async_trait]
impl JobQueue for BullQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count_by_status(&self, status: JobStatus) -> SweepResult<u64> {
        let mut conn = self.cache.connection();
        let cmd = if is_list(status) { "LLEN" } else { "ZCARD" };
        let mut total = 0;
        for suffix in status_keys(status) {
            let count: u64 = redis::cmd(cmd)
                .arg(self.key(suffix))
                .query_async(&mut conn)
                .await?;
            total += count;
        }
        Ok(total)
    }

    async fn clean(&self, cutoff: DateTime<Utc>, max_count: u64) -> SweepResult<Vec<Identifier>> {
        let max_score = cutoff.timestamp_millis();
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);

        let mut conn = self.cache.connection();
        let removed: Vec<String> = self
            .clean_script
            .key(self.key("completed"))
            .arg(&self.key_prefix)
            .arg(format!("({max_score}"))
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        Ok(removed)
    }
}
