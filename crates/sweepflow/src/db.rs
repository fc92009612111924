use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::time::Duration;

use crate::error::SweepResult;

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_num<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

/// Small pool: a sweep issues one statement at a time.
pub async fn make_pool(options: PgConnectOptions) -> SweepResult<PgPool> {
    let max_connections = env_num::<u32>("SWEEP_DB_MAX_CONNECTIONS")
        .unwrap_or(2)
        .clamp(1, 8);

    let acquire_timeout_secs = env_num::<u64>("SWEEP_DB_ACQUIRE_TIMEOUT_SECS")
        .unwrap_or(10)
        .clamp(1, 60);

    // 0 disables the per-statement timeout.
    let statement_timeout_ms = env_num::<u64>("SWEEP_DB_STATEMENT_TIMEOUT_MS").unwrap_or(60_000);
    let disable_jit = env_bool("SWEEP_DISABLE_JIT", true);

    let mut opts = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs));

    opts = opts.after_connect(move |conn, _meta| {
        Box::pin(async move {
            if statement_timeout_ms > 0 {
                sqlx::query(&format!("SET statement_timeout = {statement_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
            }
            if disable_jit {
                sqlx::query("SET jit = OFF").execute(&mut *conn).await?;
            }
            Ok(())
        })
    });

    let pool = opts
        .connect_with(options.application_name("sweepflow"))
        .await?;

    Ok(pool)
}
