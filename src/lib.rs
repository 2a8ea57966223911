pub mod app;
pub mod chain;
pub mod cli;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod poller;
pub mod storage;
pub mod wallet;

pub use app::Blocknotes;
pub use config::{Config, Network};
pub use error::{BlocknotesError, Result};
pub use poller::{ConfirmationPoller, PassReport, PollerConfig, PollerHandle};
pub use storage::{NoteStore, SharedStore};

/// Install the stderr `tracing` subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
