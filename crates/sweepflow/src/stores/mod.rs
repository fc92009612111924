pub mod bullmq;
pub mod postgres;
pub mod redis;

pub use bullmq::BullQueue;
pub use postgres::{quote_ident, IdKind, PgRetentionSource, PgTable, RetentionTable};
pub use self::redis::RedisCache;

use sqlx::PgPool;
use tracing::info;

use crate::config::Settings;
use crate::db;
use crate::error::SweepResult;

/// Which stores a run connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Needs {
    pub database: bool,
    pub cache: bool,
}

impl Needs {
    pub const DATABASE_AND_CACHE: Needs = Needs {
        database: true,
        cache: true,
    };
    pub const CACHE_ONLY: Needs = Needs {
        database: false,
        cache: true,
    };
}

/// Connections of one run. Opened once at start, released by [`Stores::close`].
pub struct Stores {
    pub pool: Option<PgPool>,
    pub cache: Option<RedisCache>,
}

impl Stores {
    pub async fn open(settings: &Settings, needs: Needs) -> SweepResult<Self> {
        let mut stores = Stores {
            pool: None,
            cache: None,
        };

        // Resolve everything before the first connection is made.
        let database = if needs.database {
            Some(settings.require_database()?.connect_options()?)
        } else {
            None
        };
        let cache = if needs.cache {
            Some(settings.require_redis()?)
        } else {
            None
        };

        if let Some(options) = database {
            stores.pool = Some(db::make_pool(options).await?);
            info!("connected to database");
        }

        if let Some(redis) = cache {
            match RedisCache::connect(redis).await {
                Ok(c) => stores.cache = Some(c),
                Err(e) => {
                    stores.close().await;
                    return Err(e);
                }
            }
            info!("connected to cache");
        }

        Ok(stores)
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
        // Dropping the multiplexed connection closes the socket.
        drop(self.cache);
    }
}
