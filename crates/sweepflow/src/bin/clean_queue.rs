//! Prints job counts per status for the subscription queue, then removes
//! completed jobs in a fixed number of `clean` calls.

use clap::Parser;
use sweepflow::cli::SweepArgs;
use sweepflow::config::Settings;
use sweepflow::{telemetry, variants};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SweepArgs::parse();
    telemetry::init_tracing();

    let settings = Settings::load(&args.config).await?;
    let report = variants::clean_queue(&settings).await?;

    for (status, count) in &report.census {
        println!("{} {}", status.as_str(), count);
    }
    for removed in &report.removed_per_call {
        println!("Deleted count {removed}");
    }
    Ok(())
}
