//! One-shot variant: run exactly one reconciliation cycle and exit 0
//! regardless of delivery outcomes (failures are logged only). Meant for
//! cron-style setups where the scheduler lives outside the process.

use anyhow::Result;

use campus_announce_relay::config::{self, RelayCfg};
use campus_announce_relay::init_tracing;
use campus_announce_relay::relay::CycleOutcome;

async fn run() -> Result<CycleOutcome> {
    let cfg = RelayCfg::from_env()?;
    let mut relay = config::build_relay(&cfg)?;
    relay.run_cycle().await
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(outcome) => {
            tracing::info!(
                fetched = outcome.fetched,
                posted = outcome.posted,
                failed = outcome.failed,
                synced = outcome.synced,
                "cycle complete"
            );
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "cycle failed");
        }
    }
}
