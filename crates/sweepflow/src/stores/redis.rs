use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::config::RedisSettings;
use crate::error::SweepResult;
use crate::sweep::model::{ScanCursor, ScanPage};
use crate::sweep::source::{CacheMirror, Keyspace};

/// Single multiplexed connection to the cache, opened once per run.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(settings: &RedisSettings) -> SweepResult<Self> {
        Self::connect_url(&settings.connection_url()).await
    }

    pub async fn connect_url(url: &str) -> SweepResult<Self> {
        if url.starts_with("rediss://") {
            // rustls needs a process-wide provider; a second install is a no-op error.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;

        // Test connectivity
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self { conn })
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheMirror for RedisCache {
    async fn delete_keys(&self, keys: &[String]) -> SweepResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection();
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(removed)
    }
}

#[async_trait]
impl Keyspace for RedisCache {
    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        page_size: usize,
    ) -> SweepResult<ScanPage> {
        let mut conn = self.connection();
        let (next, keys): (String, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor.as_str())
            .arg("MATCH")
            .arg(format!("{prefix}*"))
            .arg("COUNT")
            .arg(page_size)
            .query_async(&mut conn)
            .await?;

        Ok(ScanPage {
            keys,
            next: ScanCursor::new(next),
        })
    }

    async fn key_count(&self) -> SweepResult<u64> {
        let mut conn = self.connection();
        let size: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }
}
