use std::sync::Arc;

use anyhow::Context;
use cdc::builder::PostgresChangeBuilder;
use cdc::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use cdc::decoding::NoTableMetadata;
use cdc::destination::json_lines::JsonLinesSink;
use cdc::partition::partition_source_config;
use cdc::replication::{
    LogicalSlotClient, LogicalSlotSource, SlotAdvancer, TEST_DECODING_PLUGIN, validate_slot_name,
};
use cdc::types::SourcePosition;
use cdc::workers::capture::CaptureWorker;
use cdc::workers::pool::CaptureWorkerPool;
use cdc_config::shared::{
    DecodingDialect, ReplicatorConfig, ReplicatorConfigWithoutSecrets, SourceConfig,
};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

/// Starts one capture worker per table partition and waits for all of them.
///
/// Changes are written to stdout as JSON lines. A SIGINT or SIGTERM, or the failure of any worker,
/// stops every worker after its in-flight record.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
) -> anyhow::Result<()> {
    info!(
        config = ?ReplicatorConfigWithoutSecrets::from(replicator_config.clone()),
        "starting replicator"
    );

    let worker_configs = partition_source_config(&replicator_config.source)?;
    let sink = Arc::new(JsonLinesSink::stdout());
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let shutdown_tx = Arc::new(shutdown_tx);

    let mut pool = CaptureWorkerPool::new();
    for (worker_id, worker_config) in worker_configs.iter().enumerate() {
        validate_slot_name(&worker_config.slot_name)?;

        let client = LogicalSlotClient::connect(&worker_config.connection).await?;
        let start_after = slot_start(&client, worker_config).await?;

        let source = LogicalSlotSource::from_config(client.clone(), worker_config)?
            .with_start_after(start_after);
        let builder = PostgresChangeBuilder::from_config(worker_config, NoTableMetadata)?;
        let committer = SlotAdvancer::new(client, worker_config.slot_name.clone())?;

        info!(
            worker_id,
            slot_name = %worker_config.slot_name,
            tables = ?worker_config.tables,
            %start_after,
            "starting capture worker"
        );

        let worker = CaptureWorker::new(
            worker_id,
            source,
            builder,
            sink.clone(),
            committer,
            shutdown_rx.clone(),
        )
        .with_last_committed(SourcePosition::Lsn(start_after));

        let shutdown_tx = shutdown_tx.clone();
        pool.spawn(worker_id, async move {
            let result = worker.run().await;
            if result.is_err() {
                shutdown(&shutdown_tx);
            }
            result
        });
    }

    let signal_handle = tokio::spawn(wait_for_shutdown_signal(shutdown_tx.clone()));

    let result = pool.wait_all().await;

    signal_handle.abort();
    let _ = signal_handle.await;

    let stats = result?;
    for (worker_id, worker_stats) in stats {
        info!(
            worker_id,
            records_read = worker_stats.records_read,
            changes_written = worker_stats.changes_written,
            records_skipped = worker_stats.records_skipped,
            "capture worker finished"
        );
    }

    Ok(())
}

/// Returns the position the worker resumes after, creating the slot when the dialect allows.
async fn slot_start(
    client: &LogicalSlotClient,
    config: &SourceConfig,
) -> anyhow::Result<cdc::types::PgLsn> {
    let start = match config.dialect {
        DecodingDialect::TestDecoding => {
            client
                .get_or_create_slot(&config.slot_name, TEST_DECODING_PLUGIN)
                .await?
        }
        DecodingDialect::Compact => client
            .confirmed_flush_lsn(&config.slot_name)
            .await?
            .with_context(|| {
                format!(
                    "replication slot '{}' does not exist, compact dialect slots must be created upfront",
                    config.slot_name
                )
            })?,
    };

    Ok(start)
}

async fn wait_for_shutdown_signal(shutdown_tx: Arc<ShutdownTx>) -> anyhow::Result<()> {
    // SIGTERM is sent by orchestrators before killing the process.
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down capture workers");
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down capture workers");
        }
    }

    shutdown(&shutdown_tx);

    Ok(())
}

fn shutdown(shutdown_tx: &ShutdownTx) {
    if let Err(err) = shutdown_tx.send(()) {
        warn!(error = ?err, "failed to send shutdown signal");
    }
}
