//! Purges aged audit events from the database, their history rows and their
//! cache mirror, in bounded batches.
//!
//! ```bash
//! purge-audit-events                       # file:medplum.config.json
//! purge-audit-events aws:us-east-1:/medplum/prod/
//! ```

use clap::Parser;
use sweepflow::cli::SweepArgs;
use sweepflow::config::Settings;
use sweepflow::{telemetry, variants};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SweepArgs::parse();
    telemetry::init_tracing();

    let settings = Settings::load(&args.config).await?;
    let stats = variants::purge_audit_events(&settings).await?;

    println!(
        "Done: iterations={} deleted={} stop={}",
        stats.iterations,
        stats.total_deleted,
        stats.stop.as_str()
    );
    Ok(())
}
