//! Tracing subscriber setup for the capture binaries and their tests.

use std::io;
use std::sync::Once;

use cdc_config::{Environment, UnknownEnvironment};
use thiserror::Error;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_log::log_tracer::SetLoggerError;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Environment variable enabling log output in tests.
const ENABLE_TEST_TRACING: &str = "ENABLE_TRACING";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to redirect log records to tracing: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error(transparent)]
    Environment(#[from] UnknownEnvironment),
}

/// Flushes buffered log lines when dropped; keep it alive until the process exits.
#[must_use]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Stream the logs are written to. Stdout is reserved for the captured changes.
fn log_output() -> io::Stderr {
    io::stderr()
}

fn log_subscriber<W>(
    environment: Environment,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match environment {
        Environment::Prod => Box::new(
            Registry::default().with(filter).with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(writer),
            ),
        ),
        Environment::Dev => Box::new(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_writer(writer)),
        ),
    }
}

/// Installs the global subscriber of `app_name`.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Lines are written to stderr from a
/// background thread, as JSON in the `prod` environment and human readable otherwise.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let environment = Environment::load()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (writer, guard) = tracing_appender::non_blocking(log_output());

    tracing::subscriber::set_global_default(log_subscriber(environment, filter, writer))?;

    tracing::info!(app_name, %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing to the test output, once per process.
///
/// Logs are only emitted when `ENABLE_TRACING` is set, so test runs stay quiet by default.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        if std::env::var_os(ENABLE_TEST_TRACING).is_none() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_test_writer());

        // Another test harness may already have installed a subscriber.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
