use cdc_telemetry::tracing::init_tracing;

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;

mod config;
mod core;

/// Entry point of the replicator service.
///
/// Loads the configuration, initializes tracing and runs the capture workers until they stop or
/// a shutdown signal arrives.
fn main() -> anyhow::Result<()> {
    let replicator_config = load_replicator_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_replicator_with_config(replicator_config))?;

    Ok(())
}
