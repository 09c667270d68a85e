use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use cdc_config::shared::PgConnectionConfig;
use tokio_postgres::types::PgLsn;
use tokio_postgres::{Client, Connection, NoTls, Row, Socket};
use tracing::{Instrument, debug, error, info};

use crate::error::{CdcResult, ErrorKind};
use crate::types::LogicalDecodingRecord;
use crate::{bail, cdc_error};

/// Output plugin used when a slot is created for the `test_decoding` dialect.
pub const TEST_DECODING_PLUGIN: &str = "test_decoding";

const PEEK_CHANGES_QUERY: &str =
    "select lsn, xid::text as xid, data from pg_logical_slot_peek_changes($1, NULL, $2)";
const ADVANCE_SLOT_QUERY: &str = "select end_lsn from pg_replication_slot_advance($1, $2)";
const GET_SLOT_QUERY: &str =
    "select confirmed_flush_lsn from pg_replication_slots where slot_name = $1 and database = current_database()";
const CREATE_SLOT_QUERY: &str = "select lsn from pg_create_logical_replication_slot($1, $2)";

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection(connection: Connection<Socket, tokio_postgres::tls::NoTlsStream>) {
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends when the last clone of the `Client` is dropped.
    tokio::spawn(task);
}

/// Peek and advance operations of a logical replication slot.
pub trait SlotClient {
    /// Reads up to `batch_size` pending records of `slot_name` without consuming them.
    ///
    /// Postgres only stops at transaction boundaries, so more records may be returned.
    fn peek_changes(
        &self,
        slot_name: &str,
        batch_size: u32,
    ) -> impl Future<Output = CdcResult<Vec<LogicalDecodingRecord>>> + Send;

    /// Moves the confirmed position of `slot_name` to `location` and returns the new position.
    ///
    /// Advancing to a position the slot already passed leaves it unchanged.
    fn advance_slot(
        &self,
        slot_name: &str,
        location: PgLsn,
    ) -> impl Future<Output = CdcResult<PgLsn>> + Send;
}

/// Client for the SQL interface of logical replication slots.
///
/// Changes are peeked instead of consumed, the slot only moves forward through
/// [`SlotClient::advance_slot`].
#[derive(Debug, Clone)]
pub struct LogicalSlotClient {
    client: Arc<Client>,
}

impl LogicalSlotClient {
    /// Connects to the database described by `config` without TLS.
    pub async fn connect(config: &PgConnectionConfig) -> CdcResult<Self> {
        let (client, connection) = config.to_connect_options().connect(NoTls).await?;
        spawn_postgres_connection(connection);

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "connected to postgres"
        );

        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Returns the confirmed flush position of `slot_name`, or [`None`] if the slot does not exist.
    pub async fn confirmed_flush_lsn(&self, slot_name: &str) -> CdcResult<Option<PgLsn>> {
        let rows = self.client.query(GET_SLOT_QUERY, &[&slot_name]).await?;

        match rows.first() {
            Some(row) => Ok(row.try_get::<_, Option<PgLsn>>("confirmed_flush_lsn")?),
            None => Ok(None),
        }
    }

    /// Creates a logical replication slot using `plugin` and returns its consistent point.
    pub async fn create_slot(&self, slot_name: &str, plugin: &str) -> CdcResult<PgLsn> {
        info!("creating replication slot '{}' with plugin '{}'", slot_name, plugin);

        let row = self
            .client
            .query_one(CREATE_SLOT_QUERY, &[&slot_name, &plugin])
            .await?;

        Ok(row.try_get::<_, PgLsn>("lsn")?)
    }

    /// Returns the confirmed flush position of `slot_name`, creating the slot with `plugin` if it
    /// does not exist yet.
    pub async fn get_or_create_slot(&self, slot_name: &str, plugin: &str) -> CdcResult<PgLsn> {
        match self.confirmed_flush_lsn(slot_name).await? {
            Some(lsn) => {
                info!("using existing replication slot '{}' at {}", slot_name, lsn);
                Ok(lsn)
            }
            None => self.create_slot(slot_name, plugin).await,
        }
    }
}

impl SlotClient for LogicalSlotClient {
    async fn peek_changes(
        &self,
        slot_name: &str,
        batch_size: u32,
    ) -> CdcResult<Vec<LogicalDecodingRecord>> {
        let Ok(batch_size) = i32::try_from(batch_size) else {
            bail!(
                ErrorKind::InvalidConfiguration,
                "Invalid batch size",
                format!("The batch size {batch_size} does not fit in a Postgres integer")
            );
        };

        let rows = self
            .client
            .query(PEEK_CHANGES_QUERY, &[&slot_name, &batch_size])
            .await?;
        debug!(slot_name, records = rows.len(), "peeked slot changes");

        rows.iter().map(decoding_record).collect()
    }

    async fn advance_slot(&self, slot_name: &str, location: PgLsn) -> CdcResult<PgLsn> {
        let row = self
            .client
            .query_one(ADVANCE_SLOT_QUERY, &[&slot_name, &location])
            .await?;

        Ok(row.try_get::<_, PgLsn>("end_lsn")?)
    }
}

fn decoding_record(row: &Row) -> CdcResult<LogicalDecodingRecord> {
    let location = row.try_get::<_, PgLsn>("lsn")?;
    let xid = row.try_get::<_, String>("xid")?;
    let data = row.try_get::<_, String>("data")?;

    let xid = u32::from_str(&xid).map_err(|err| {
        cdc_error!(
            ErrorKind::ConversionError,
            "Invalid transaction id",
            format!("The transaction id '{xid}' of the record at {location} is not a valid xid"),
            source: err
        )
    })?;

    Ok(LogicalDecodingRecord::new(location, xid, data))
}
