// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod backup;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod notify;
pub mod relay;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::backup::{BackupSink, SyncGate};
pub use crate::feed::{Announcement, FeedSource};
pub use crate::notify::{DeliveryOutcome, Dispatcher, Target};
pub use crate::relay::{CycleOutcome, Relay};
pub use crate::store::{AnnouncementStore, PostedRecord};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the tracing subscriber for the binaries. RUST_LOG overrides
/// the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campus_announce_relay=info,relay=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
