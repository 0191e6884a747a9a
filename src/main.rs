//! Campus announcement relay — long-running binary.
//! Polls the feed on a fixed interval, posts new announcements to the
//! configured chat webhooks, and serves a small status/metrics page.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};

use campus_announce_relay::api::{self, AppState};
use campus_announce_relay::config::{self, RelayCfg};
use campus_announce_relay::init_tracing;
use campus_announce_relay::metrics::Metrics;
use campus_announce_relay::scheduler::{self, RelaySchedulerCfg, RelayStatus};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Recorder must be installed before the first series is touched.
    let metrics = Metrics::init();

    let cfg = RelayCfg::from_env()?;
    let relay = config::build_relay(&cfg)?;

    let status = Arc::new(RwLock::new(RelayStatus::default()));
    let _worker = scheduler::spawn_relay_loop(
        RelaySchedulerCfg {
            interval_secs: cfg.interval_secs,
        },
        relay,
        Arc::clone(&status),
    );

    let router = api::create_router(AppState { status }).merge(metrics.router());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, interval_secs = cfg.interval_secs, "relay up, status server listening");

    axum::serve(listener, router)
        .await
        .context("serving status api")?;
    Ok(())
}
