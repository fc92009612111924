//! Counts cache keys per resource type and prints the non-empty counts as JSON.

use clap::Parser;
use sweepflow::cli::SweepArgs;
use sweepflow::config::Settings;
use sweepflow::{telemetry, variants};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SweepArgs::parse();
    telemetry::init_tracing();

    let settings = Settings::load(&args.config).await?;
    let report = variants::count_cache(&settings).await?;

    println!("Redis cache size: {}", report.keyspace_size);
    println!("{}", serde_json::to_string_pretty(&report.counts)?);
    Ok(())
}
